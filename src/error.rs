//! Error types used by lifecycles, task handles and the supervisor.
//!
//! This module defines three types:
//!
//! - [`TaskError`]: errors returned by the user callbacks (`setup`, `step`, `teardown`).
//! - [`LifecycleError`]: terminal results and misuse errors of [`TaskHandle`](crate::TaskHandle)
//!   and [`Supervisor`](crate::Supervisor).
//! - [`FailureRecord`]: everything observed during one step-failure episode,
//!   handed to the [`RestartPolicy`](crate::RestartPolicy).
//!
//! The enums provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::any::Any;
use std::fmt;

use thiserror::Error;

/// # Errors produced by lifecycle callbacks.
///
/// Some errors are retryable (`Fail`), others are considered fatal and the
/// built-in [`RestartPolicy::OnStepFailure`](crate::RestartPolicy::OnStepFailure)
/// never restarts after them.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Callback failed but may succeed if the lifecycle is set up again.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Non-recoverable fatal error (should not be restarted).
    #[error("fatal error (no restart): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Shorthand for [`TaskError::Fatal`].
    pub fn fatal(error: impl fmt::Display) -> Self {
        TaskError::Fatal {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use restartable::TaskError;
    ///
    /// assert_eq!(TaskError::fail("boom").as_label(), "task_failed");
    /// assert_eq!(TaskError::fatal("boom").as_label(), "task_fatal");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Fatal { .. } => "task_fatal",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Fatal { error } => format!("fatal: {error}"),
        }
    }

    /// Indicates whether a lifecycle that failed with this error may be set up again.
    ///
    /// # Example
    /// ```
    /// use restartable::TaskError;
    ///
    /// assert!(TaskError::fail("flaky").is_retryable());
    /// assert!(!TaskError::fatal("nope").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Fail { .. })
    }
}

/// # Errors produced by task handles and supervisors.
///
/// Two groups:
/// - **Misuse** (`AlreadyStarted`, `AlreadyStopped`, `AlreadyClosed`): detected
///   locally, never retried.
/// - **Callback failures** (`Setup`, `Step`, `Teardown`, `StepAndTeardown`):
///   the callback's [`TaskError`] propagated verbatim.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// `start` was called while a run is already owned.
    #[error("already started")]
    AlreadyStarted,

    /// `stop` was called while no run is owned.
    #[error("already stopped")]
    AlreadyStopped,

    /// `close` was called on a handle that was already closed.
    #[error("already closed")]
    AlreadyClosed,

    /// `setup` failed; nothing else ran.
    #[error("setup failed: {0}")]
    Setup(TaskError),

    /// `step` failed and `teardown` succeeded.
    #[error("step failed: {0}")]
    Step(TaskError),

    /// The run was cancelled and `teardown` failed.
    #[error("teardown failed: {0}")]
    Teardown(TaskError),

    /// Both `step` and `teardown` failed; step error first.
    #[error("step failed: {step}; teardown failed: {teardown}")]
    StepAndTeardown {
        /// Error that ended the step loop.
        step: TaskError,
        /// Error returned by the teardown that followed.
        teardown: TaskError,
    },

    /// `teardown` panicked and did not complete.
    ///
    /// A panic inside `step` is reported as a fatal [`LifecycleError::Step`] instead.
    #[error("worker panicked: {reason}")]
    Panicked {
        /// Panic payload, if it was a string.
        reason: String,
    },

    /// The worker was dropped before producing a result, e.g. by a runtime shutdown.
    #[error("worker aborted before the run finished")]
    Aborted,
}

impl LifecycleError {
    /// Builds the terminal result of a run from why its step loop ended and how teardown went.
    ///
    /// | step        | teardown | result                   |
    /// |-------------|----------|--------------------------|
    /// | cancelled   | ok       | `Ok(())`                 |
    /// | cancelled   | err      | `Teardown`               |
    /// | err         | ok       | `Step`                   |
    /// | err         | err      | `StepAndTeardown`        |
    pub(crate) fn from_exit(
        step: Option<TaskError>,
        teardown: Result<(), TaskError>,
    ) -> Result<(), LifecycleError> {
        match (step, teardown) {
            (None, Ok(())) => Ok(()),
            (None, Err(teardown)) => Err(LifecycleError::Teardown(teardown)),
            (Some(step), Ok(())) => Err(LifecycleError::Step(step)),
            (Some(step), Err(teardown)) => {
                Err(LifecycleError::StepAndTeardown { step, teardown })
            }
        }
    }

    /// Returns the teardown error carried by this result, if any.
    pub fn teardown_error(&self) -> Option<&TaskError> {
        match self {
            LifecycleError::Teardown(e) => Some(e),
            LifecycleError::StepAndTeardown { teardown, .. } => Some(teardown),
            _ => None,
        }
    }

    /// Returns `true` for the misuse kinds (`AlreadyStarted`, `AlreadyStopped`, `AlreadyClosed`).
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            LifecycleError::AlreadyStarted
                | LifecycleError::AlreadyStopped
                | LifecycleError::AlreadyClosed
        )
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use restartable::{LifecycleError, TaskError};
    ///
    /// assert_eq!(LifecycleError::AlreadyClosed.as_label(), "lifecycle_already_closed");
    /// assert_eq!(LifecycleError::Step(TaskError::fail("x")).as_label(), "lifecycle_step_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LifecycleError::AlreadyStarted => "lifecycle_already_started",
            LifecycleError::AlreadyStopped => "lifecycle_already_stopped",
            LifecycleError::AlreadyClosed => "lifecycle_already_closed",
            LifecycleError::Setup(_) => "lifecycle_setup_failed",
            LifecycleError::Step(_) => "lifecycle_step_failed",
            LifecycleError::Teardown(_) => "lifecycle_teardown_failed",
            LifecycleError::StepAndTeardown { .. } => "lifecycle_step_and_teardown_failed",
            LifecycleError::Panicked { .. } => "lifecycle_panicked",
            LifecycleError::Aborted => "lifecycle_aborted",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            LifecycleError::Setup(e) => format!("setup: {}", e.as_message()),
            LifecycleError::Step(e) => format!("step: {}", e.as_message()),
            LifecycleError::Teardown(e) => format!("teardown: {}", e.as_message()),
            LifecycleError::StepAndTeardown { step, teardown } => format!(
                "step: {}; teardown: {}",
                step.as_message(),
                teardown.as_message()
            ),
            other => other.to_string(),
        }
    }
}

/// Errors observed during one step-failure episode of a [`Supervisor`](crate::Supervisor).
///
/// - `step`: always present; the error that ended the step loop.
/// - `teardown`: teardown failed with an error different from `step`.
/// - `setup`: the automatic restart was attempted and its setup failed.
///
/// `Display` renders the whole chain in order, e.g.
/// `step failed: A and teardown failed: B and setup failed: C`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    /// Error returned by `step`.
    pub step: TaskError,
    /// Error returned by the teardown that followed, if it differs from `step`.
    pub teardown: Option<TaskError>,
    /// Error returned by the restart's `setup`, if a restart was attempted and failed.
    pub setup: Option<TaskError>,
}

impl FailureRecord {
    pub(crate) fn new(step: TaskError) -> Self {
        Self {
            step,
            teardown: None,
            setup: None,
        }
    }

    /// Returns `true` when only the step failed (teardown clean, no failed restart).
    pub fn is_step_only(&self) -> bool {
        self.teardown.is_none() && self.setup.is_none()
    }
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step failed: {}", self.step)?;
        if let Some(teardown) = &self.teardown {
            write!(f, " and teardown failed: {teardown}")?;
        }
        if let Some(setup) = &self.setup {
            write!(f, " and setup failed: {setup}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FailureRecord {}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
