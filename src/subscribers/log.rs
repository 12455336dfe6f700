//! # LogWriter: simple event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stdout.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! [starting] task="pinger" run=1
//! [started] task="pinger" run=1
//! [step-failed] task="pinger" run=1 err="execution failed: timeout"
//! [stopped] task="pinger" run=1 err="step failed: execution failed: timeout"
//! [restart] task="pinger" after_run=1 record="step failed: execution failed: timeout"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("unknown");
        let run = e.run.unwrap_or_default();
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::TaskStarting => {
                println!("[starting] task={task:?} run={run}");
            }
            EventKind::TaskStarted => {
                println!("[started] task={task:?} run={run}");
            }
            EventKind::SetupFailed => {
                println!("[setup-failed] task={task:?} run={run} err={reason:?}");
            }
            EventKind::StepFailed => {
                println!("[step-failed] task={task:?} run={run} err={reason:?}");
            }
            EventKind::TeardownFailed => {
                println!("[teardown-failed] task={task:?} run={run} err={reason:?}");
            }
            EventKind::TaskStopped if e.reason.is_some() => {
                println!("[stopped] task={task:?} run={run} err={reason:?}");
            }
            EventKind::TaskStopped => {
                println!("[stopped] task={task:?} run={run}");
            }
            EventKind::RestartRequested => {
                println!("[restart] task={task:?} after_run={run} record={reason:?}");
            }
            EventKind::RestartDeclined => {
                println!("[restart-declined] task={task:?} after_run={run} record={reason:?}");
            }
            EventKind::RestartFailed => {
                println!("[restart-failed] task={task:?} after_run={run} record={reason:?}");
            }
            EventKind::SubscriberOverflow => {
                println!("[subscriber-overflow] subscriber={task} reason={reason}");
            }
            EventKind::SubscriberPanicked => {
                println!("[subscriber-panicked] subscriber={task} info={reason}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
