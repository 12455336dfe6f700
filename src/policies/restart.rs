//! # Restart policies for supervisors.
//!
//! [`RestartPolicy`] decides, given the [`FailureRecord`] of a step failure,
//! whether the [`Supervisor`](crate::Supervisor) runs `setup` again.
//!
//! - [`RestartPolicy::Never`] never restarts (default).
//! - [`RestartPolicy::OnStepFailure`] restarts only when the step alone failed with a retryable error.
//! - [`RestartPolicy::Always`] restarts after every step failure.
//! - [`RestartPolicy::Custom`] delegates to a caller-supplied predicate.
//!
//! ## When is the policy consulted?
//! ```text
//! step fails ──► teardown ──► policy(record{step, teardown})
//!                               ├─ false ──► Stopped
//!                               └─ true  ──► setup again
//!                                              ├─ Ok  ──► Running
//!                                              └─ Err ──► policy(record{step, teardown, setup})
//!                                                         (notification only) ──► Stopped
//! ```
//!
//! There is no delay, backoff or attempt limit: a policy that always accepts
//! restarts as fast as the lifecycle fails. Count attempts inside a
//! [`RestartPolicy::Custom`] predicate when a limit is needed.
//!
//! The policy runs on the supervisor's monitor while the supervisor lock is held:
//! calling `start`/`stop` on the same supervisor from inside it deadlocks.
//! A predicate that panics is treated as declining: the supervisor ends up `Stopped`.

use std::fmt;
use std::sync::Arc;

use crate::error::FailureRecord;

/// Predicate type used by [`RestartPolicy::Custom`].
pub type RestartFn = dyn Fn(&FailureRecord) -> bool + Send + Sync;

/// Policy controlling whether a supervisor restarts its lifecycle after a step failure.
#[derive(Clone, Default)]
pub enum RestartPolicy {
    /// Never restart: the supervisor stops after the first step failure (default).
    #[default]
    Never,
    /// Restart when only the step failed (teardown clean) and its error is retryable.
    OnStepFailure,
    /// Restart after every step failure, whatever teardown reported.
    Always,
    /// Restart when the predicate returns `true`.
    Custom(Arc<RestartFn>),
}

impl RestartPolicy {
    /// Wraps a predicate into [`RestartPolicy::Custom`].
    ///
    /// # Example
    /// ```
    /// use restartable::RestartPolicy;
    ///
    /// let policy = RestartPolicy::custom(|record| record.step.is_retryable());
    /// # let _ = policy;
    /// ```
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&FailureRecord) -> bool + Send + Sync + 'static,
    {
        RestartPolicy::Custom(Arc::new(f))
    }

    /// Evaluates the policy for `record`.
    pub fn should_restart(&self, record: &FailureRecord) -> bool {
        match self {
            RestartPolicy::Never => false,
            RestartPolicy::OnStepFailure => record.is_step_only() && record.step.is_retryable(),
            RestartPolicy::Always => true,
            RestartPolicy::Custom(f) => f(record),
        }
    }
}

impl fmt::Debug for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartPolicy::Never => f.write_str("Never"),
            RestartPolicy::OnStepFailure => f.write_str("OnStepFailure"),
            RestartPolicy::Always => f.write_str("Always"),
            RestartPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
