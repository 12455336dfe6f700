//! # Run one lifecycle on a dedicated tokio task.
//!
//! [`TaskHandle::spawn`] executes one `setup → step* → teardown` run of a
//! [`Lifecycle`] and returns a handle used to stop it and collect its result.
//!
//! ## Flow
//!
//! ```text
//! spawn(lifecycle)
//!   ├─► setup()                  (in the caller's task)
//!   │     └─ Err ──► return Setup(e)      (no worker, no teardown)
//!   └─► tokio::spawn(worker)
//!          loop {
//!            ├─ step() ── Err(e) | panic ──► break with e
//!            ├─ token cancelled? ──► break
//!            └─ yield_now()
//!          }
//!          teardown()            (exactly once)
//!          └─► terminal result ──► JoinHandle
//!
//! close()
//!   ├─ already closed? ──► AlreadyClosed   (no signal, no wait)
//!   ├─► token.cancel()
//!   └─► await JoinHandle ──► terminal result
//! ```
//!
//! ## Rules
//! - Cancellation is **cooperative**: it is checked between steps, never inside one.
//!   A step that never returns blocks `close` forever.
//! - Every run steps at least once, even when closed before the worker is first polled.
//! - A panic inside `step` ends the loop like an error (`Fatal`, "step panicked: ..."),
//!   so teardown still runs. A panic inside `teardown` surfaces as `Panicked`.
//! - The worker yields between steps so a step that never suspends cannot starve the runtime.
//! - `close` tolerates a run that already ended on its own: the result is kept in the
//!   `JoinHandle` until someone collects it.
//! - Dropping an unclosed handle cancels the run; teardown still runs on the worker.

use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{LifecycleError, TaskError, panic_message},
    events::{Bus, Event, EventKind},
    tasks::{Lifecycle, LifecycleRef},
};

/// Handle to one in-flight run of a lifecycle.
///
/// Created by [`TaskHandle::spawn`]; released once [`TaskHandle::close`] has
/// delivered the terminal result.
pub struct TaskHandle {
    name: Arc<str>,
    run: u64,
    /// Cancellation signal observed by the worker between steps.
    token: CancellationToken,
    /// Cancelled by the worker once its terminal result is available.
    done: CancellationToken,
    /// Completion slot; `None` once the handle has been closed.
    worker: Mutex<Option<JoinHandle<Result<(), LifecycleError>>>>,
}

impl TaskHandle {
    /// Runs `setup`, then spawns the step loop on a dedicated tokio task.
    ///
    /// Returns [`LifecycleError::Setup`] without spawning anything if `setup` fails.
    ///
    /// # Example
    /// ```
    /// use restartable::{LifecycleFn, TaskError, TaskHandle};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let lc = LifecycleFn::new("idle", || async { Ok::<_, TaskError>(()) }).arc();
    ///
    /// let handle = TaskHandle::spawn(lc).await.expect("setup succeeds");
    /// assert!(handle.close().await.is_ok());
    /// # }
    /// ```
    pub async fn spawn(lifecycle: LifecycleRef) -> Result<Self, LifecycleError> {
        Self::spawn_run(lifecycle, None, 1).await
    }

    /// Same as [`TaskHandle::spawn`], publishing run events to `bus`.
    pub async fn spawn_with_bus(lifecycle: LifecycleRef, bus: Bus) -> Result<Self, LifecycleError> {
        Self::spawn_run(lifecycle, Some(bus), 1).await
    }

    pub(crate) async fn spawn_run(
        lifecycle: LifecycleRef,
        bus: Option<Bus>,
        run: u64,
    ) -> Result<Self, LifecycleError> {
        let events = RunEvents {
            bus,
            name: Arc::from(lifecycle.name()),
            run,
        };

        events.publish(EventKind::TaskStarting, None);
        if let Err(e) = lifecycle.setup().await {
            events.publish(EventKind::SetupFailed, Some(&e));
            return Err(LifecycleError::Setup(e));
        }

        let token = CancellationToken::new();
        let done = CancellationToken::new();
        let name = Arc::clone(&events.name);
        events.publish(EventKind::TaskStarted, None);

        let worker = tokio::spawn(drive(lifecycle, token.clone(), done.clone(), events));

        Ok(Self {
            name,
            run,
            token,
            done,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Signals cancellation and waits for the terminal result of the run.
    ///
    /// ### Results
    /// - `Ok(())`: cancelled and teardown succeeded.
    /// - `Err(Step | Teardown | StepAndTeardown)`: see [`LifecycleError`].
    /// - `Err(AlreadyClosed)`: the handle was closed before; nothing is signalled or awaited.
    /// - `Err(Panicked)`: teardown panicked.
    /// - `Err(Aborted)`: the worker was dropped by a runtime shutdown before it finished.
    ///
    /// A concurrent second call waits for the first one and then gets `AlreadyClosed`.
    pub async fn close(&self) -> Result<(), LifecycleError> {
        let mut slot = self.worker.lock().await;
        let Some(worker) = slot.take() else {
            return Err(LifecycleError::AlreadyClosed);
        };

        self.token.cancel();
        match worker.await {
            Ok(res) => res,
            Err(join_err) if join_err.is_panic() => Err(LifecycleError::Panicked {
                reason: panic_message(join_err.into_panic().as_ref()),
            }),
            Err(_) => Err(LifecycleError::Aborted),
        }
    }

    /// Returns `true` once the run has ended (step failure or cancellation) and its result is ready.
    pub fn is_finished(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Waits until the run has ended, without closing the handle.
    pub async fn finished(&self) {
        self.done.cancelled().await
    }

    /// Name of the lifecycle driven by this handle.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run id (1 for standalone handles, increasing per supervisor start).
    pub fn run(&self) -> u64 {
        self.run
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("run", &self.run)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Step loop followed by teardown; returns the terminal result.
async fn drive(
    lifecycle: LifecycleRef,
    token: CancellationToken,
    done: CancellationToken,
    events: RunEvents,
) -> Result<(), LifecycleError> {
    // Marks the run finished even if a callback panics.
    let _done = done.drop_guard();

    let mut failed: Option<TaskError> = None;
    loop {
        if let Err(e) = step_once(lifecycle.as_ref()).await {
            events.publish(EventKind::StepFailed, Some(&e));
            failed = Some(e);
            break;
        }
        if token.is_cancelled() {
            break;
        }
        tokio::task::yield_now().await;
    }

    let teardown = lifecycle.teardown().await;
    if let Err(e) = &teardown {
        events.publish(EventKind::TeardownFailed, Some(e));
    }

    let res = LifecycleError::from_exit(failed, teardown);
    events.stopped(&res);
    res
}

/// Runs one `step`, turning a panic inside it into a fatal step error.
pub(crate) async fn step_once(lifecycle: &dyn Lifecycle) -> Result<(), TaskError> {
    match AssertUnwindSafe(lifecycle.step()).catch_unwind().await {
        Ok(res) => res,
        Err(panic) => Err(TaskError::fatal(format!(
            "step panicked: {}",
            panic_message(panic.as_ref())
        ))),
    }
}

/// Publishes events for one run when a bus is attached.
struct RunEvents {
    bus: Option<Bus>,
    name: Arc<str>,
    run: u64,
}

impl RunEvents {
    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind)
            .with_task(Arc::clone(&self.name))
            .with_run(self.run)
    }

    fn publish(&self, kind: EventKind, err: Option<&TaskError>) {
        let Some(bus) = &self.bus else { return };
        let ev = self.event(kind);
        bus.publish(match err {
            Some(e) => ev.with_reason(e.to_string()),
            None => ev,
        });
    }

    fn stopped(&self, res: &Result<(), LifecycleError>) {
        let Some(bus) = &self.bus else { return };
        let ev = self.event(EventKind::TaskStopped);
        bus.publish(match res {
            Ok(()) => ev,
            Err(e) => ev.with_reason(e.to_string()),
        });
    }
}
