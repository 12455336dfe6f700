//! # Runtime events emitted by task handles and supervisors.
//!
//! [`EventKind`] falls into three groups:
//! - **Run events**: one run's flow (starting, started, setup/step/teardown failures, stopped)
//! - **Supervision events**: the monitor resolving a step failure (restart requested/declined/failed)
//! - **Subscriber events**: problems delivering events to subscribers
//!
//! An [`Event`] also names the lifecycle and run it concerns.
//!
//! Subscribers each drain their own queue, so two subscribers can see events
//! at different times. Sort by `seq` to rebuild publication order.
//!
//! ## Example
//! ```rust
//! use restartable::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::StepFailed)
//!     .with_task("pinger")
//!     .with_reason("connection refused")
//!     .with_run(3);
//!
//! assert_eq!(ev.kind, EventKind::StepFailed);
//! assert_eq!(ev.task.as_deref(), Some("pinger"));
//! assert_eq!(ev.run, Some(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Run events ===
    /// Setup is about to run.
    ///
    /// Sets:
    /// - `task`: lifecycle name
    /// - `run`: run id
    TaskStarting,

    /// Setup succeeded and the step loop was spawned.
    ///
    /// Sets:
    /// - `task`: lifecycle name
    /// - `run`: run id
    TaskStarted,

    /// Setup failed; nothing else runs.
    ///
    /// Sets:
    /// - `task`, `run`
    /// - `reason`: setup error
    SetupFailed,

    /// A step failed and ended the step loop.
    ///
    /// Sets:
    /// - `task`, `run`
    /// - `reason`: step error
    StepFailed,

    /// Teardown failed.
    ///
    /// Sets:
    /// - `task`, `run`
    /// - `reason`: teardown error
    TeardownFailed,

    /// Teardown finished and the terminal result is available.
    ///
    /// Sets:
    /// - `task`, `run`
    /// - `reason`: terminal error, if the run did not end cleanly
    TaskStopped,

    // === Supervision events ===
    /// The restart policy accepted a failure; setup runs again.
    ///
    /// Sets:
    /// - `task`: lifecycle name
    /// - `run`: id of the failed run
    /// - `reason`: failure record text
    RestartRequested,

    /// The restart policy declined; the supervisor is stopped.
    ///
    /// Sets:
    /// - `task`, `run`
    /// - `reason`: failure record text
    RestartDeclined,

    /// The restart's setup failed; the supervisor is stopped.
    ///
    /// Sets:
    /// - `task`, `run`
    /// - `reason`: failure record text (including the setup error)
    RestartFailed,
}

/// One thing that happened to a run, a restart decision, or a subscriber.
///
/// Which optional fields are set depends on [`kind`](Event::kind):
/// subscriber events put the subscriber's name in `task` and carry no `run`.
#[derive(Clone, Debug)]
pub struct Event {
    /// Process-wide publication order.
    pub seq: u64,
    /// Wall-clock time of publication, for logs only; order by `seq`.
    pub at: SystemTime,
    /// What happened.
    pub kind: EventKind,
    /// Name of the lifecycle (or subscriber), if applicable.
    pub task: Option<Arc<str>>,
    /// Run id (starting from 1, per supervisor or standalone handle).
    pub run: Option<u64>,
    /// Error text for failure events, the combined record for restart events.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Stamps a bare event of `kind` with the next `seq` and the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            run: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a run id.
    #[inline]
    pub fn with_run(mut self, run: u64) -> Self {
        self.run = Some(run);
        self
    }

    /// `subscriber` dropped an event; `reason` is `"full"` or `"closed"`.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(reason)
    }

    /// `subscriber` panicked in `on_event`; `info` is the panic message.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }
}
