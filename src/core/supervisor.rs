//! # Supervisor: owns at most one run and restarts it per policy.
//!
//! The [`Supervisor`] wraps a [`Lifecycle`](crate::Lifecycle) and a
//! [`RestartPolicy`]. Each `start` runs the lifecycle through a [`TaskHandle`]
//! and spawns a **monitor** bound to that run's step-failure channel.
//!
//! ## Architecture
//! ```text
//! start() ──► lock ──► Watched{lifecycle, FailureTx} ──► TaskHandle::spawn_run()
//!                 └──► spawn monitor(run id, FailureRx)
//!
//! monitor:
//!   recv() ── None ──► exit (run was stopped, no step failure)
//!     │
//!     └─ Some(step error)
//!          ├─► lock (start/stop callers wait from here on)
//!          ├─► run still owned? no ──► exit (a caller stopped/replaced it first)
//!          ├─► state = Restarting
//!          ├─► close handle ──► record.teardown (if distinct from the step error)
//!          ├─► policy(record) ── false ──► RestartDeclined, state = Stopped
//!          └─► start again
//!                ├─ Ok  ──► new monitor, state = Running
//!                └─ Err ──► record.setup, policy(record) (notification), RestartFailed,
//!                           state = Stopped
//! ```
//!
//! ## Rules
//! - At most one run is owned: `start` fails with `AlreadyStarted` while one exists,
//!   `stop` fails with `AlreadyStopped` when none does.
//! - One mutex serializes `start`, `stop`, `restart` and the monitor's resolution.
//! - A monitor only ever acts on the run it was spawned for.
//! - Setup failures are never retried; only step failures consult the policy.
//! - A step that panics is handled like a step that failed. A policy that panics
//!   declines, so the supervisor never stays in `Restarting`.
//! - Dropping the last `Arc<Supervisor>` cancels the owned run (teardown still runs).

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Weak},
};

use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        builder::SupervisorBuilder,
        failure::{self, FailureRx, Watched},
        runner::TaskHandle,
        state::SupervisorState,
    },
    error::{FailureRecord, LifecycleError, TaskError},
    events::{Bus, Event, EventKind},
    policies::RestartPolicy,
    tasks::LifecycleRef,
};

/// Owned run plus the run-id counter, guarded by the supervisor mutex.
#[derive(Default)]
struct Slot {
    current: Option<TaskHandle>,
    runs: u64,
}

/// Restartable runner for one lifecycle.
pub struct Supervisor {
    lifecycle: LifecycleRef,
    policy: RestartPolicy,
    bus: Bus,
    slot: Mutex<Slot>,
    state: watch::Sender<SupervisorState>,
    /// Stops the event listener spawned by the builder.
    shutdown: CancellationToken,
}

impl Supervisor {
    /// Creates a supervisor with default configuration and the given policy.
    ///
    /// # Example
    /// ```
    /// use restartable::{LifecycleFn, RestartPolicy, Supervisor, SupervisorState, TaskError};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let lc = LifecycleFn::new("idle", || async { Ok::<_, TaskError>(()) }).arc();
    /// let sup = Supervisor::new(lc, RestartPolicy::OnStepFailure);
    ///
    /// sup.start().await.expect("setup succeeds");
    /// assert_eq!(sup.state(), SupervisorState::Running);
    /// sup.stop().await.expect("clean stop");
    /// assert_eq!(sup.state(), SupervisorState::Stopped);
    /// # }
    /// ```
    pub fn new(lifecycle: LifecycleRef, policy: RestartPolicy) -> Arc<Self> {
        Self::builder(lifecycle).with_policy(policy).build()
    }

    /// Returns a builder for configuring policy, bus capacity and subscribers.
    pub fn builder(lifecycle: LifecycleRef) -> SupervisorBuilder {
        SupervisorBuilder::new(lifecycle)
    }

    pub(crate) fn new_internal(
        lifecycle: LifecycleRef,
        policy: RestartPolicy,
        bus: Bus,
        shutdown: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(SupervisorState::Stopped);
        Self {
            lifecycle,
            policy,
            bus,
            slot: Mutex::new(Slot::default()),
            state,
            shutdown,
        }
    }

    /// Runs `setup` and starts the step loop under a fresh monitor.
    ///
    /// Returns `AlreadyStarted` if a run is owned, or the setup error unchanged.
    pub async fn start(self: &Arc<Self>) -> Result<(), LifecycleError> {
        let mut slot = self.slot.lock().await;
        self.start_locked(&mut slot).await?;
        self.state.send_replace(SupervisorState::Running);
        Ok(())
    }

    /// Cancels the owned run and returns its terminal result.
    ///
    /// Returns `AlreadyStopped` if no run is owned, including after a step failure
    /// the policy declined to restart.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        let mut slot = self.slot.lock().await;
        let Some(handle) = slot.current.take() else {
            return Err(LifecycleError::AlreadyStopped);
        };
        let res = handle.close().await;
        self.state.send_replace(SupervisorState::Stopped);
        res
    }

    /// Stops the owned run (if any) and starts a new one, atomically.
    ///
    /// The new run is started even if stopping the old one reported an error.
    /// Returns the setup error if the new run failed to start, otherwise the
    /// old run's terminal error, if any.
    pub async fn restart(self: &Arc<Self>) -> Result<(), LifecycleError> {
        let mut slot = self.slot.lock().await;
        let stopped = match slot.current.take() {
            Some(handle) => handle.close().await,
            None => Ok(()),
        };

        let started = self.start_locked(&mut slot).await;
        self.state.send_replace(match started {
            Ok(()) => SupervisorState::Running,
            Err(_) => SupervisorState::Stopped,
        });
        started.and(stopped)
    }

    /// Returns the current state.
    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    /// Returns a receiver notified on every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    /// Returns the event bus runs and the monitor publish to.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Name of the supervised lifecycle.
    pub fn name(&self) -> &str {
        self.lifecycle.name()
    }

    async fn start_locked(self: &Arc<Self>, slot: &mut Slot) -> Result<(), LifecycleError> {
        if slot.current.is_some() {
            return Err(LifecycleError::AlreadyStarted);
        }
        slot.runs += 1;
        let run = slot.runs;

        let (failures_tx, failures_rx) = failure::channel();
        let watched: LifecycleRef =
            Arc::new(Watched::new(Arc::clone(&self.lifecycle), failures_tx));

        let handle = TaskHandle::spawn_run(watched, Some(self.bus.clone()), run).await?;
        slot.current = Some(handle);
        self.spawn_monitor(run, failures_rx);
        Ok(())
    }

    fn spawn_monitor(self: &Arc<Self>, run: u64, failures: FailureRx) {
        let sup: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let Some(step) = failures.recv().await else {
                return;
            };
            let Some(sup) = sup.upgrade() else {
                return;
            };
            sup.resolve_failure(run, step).await;
        });
    }

    /// Tears down the failed run and applies the restart policy.
    async fn resolve_failure(self: &Arc<Self>, run: u64, step: TaskError) {
        let mut slot = self.slot.lock().await;
        let owned = slot.current.as_ref().is_some_and(|h| h.run() == run);
        if !owned {
            return;
        }
        self.state.send_replace(SupervisorState::Restarting);

        let mut record = FailureRecord::new(step);
        let closed = match slot.current.take() {
            Some(handle) => handle.close().await,
            None => Ok(()),
        };
        if let Err(e) = closed {
            let teardown = match &e {
                LifecycleError::Panicked { .. } | LifecycleError::Aborted => {
                    Some(TaskError::fail(&e))
                }
                other => other.teardown_error().cloned(),
            };
            record.teardown = teardown.filter(|t| *t != record.step);
        }

        if !self.consult(&record) {
            self.publish(EventKind::RestartDeclined, run, &record);
            self.state.send_replace(SupervisorState::Stopped);
            return;
        }

        self.publish(EventKind::RestartRequested, run, &record);
        match self.start_locked(&mut slot).await {
            Ok(()) => {
                self.state.send_replace(SupervisorState::Running);
            }
            Err(e) => {
                record.setup = Some(match e {
                    LifecycleError::Setup(setup) => setup,
                    other => TaskError::fail(other),
                });
                // Notification only: a failed restart is never re-driven.
                let _ = self.consult(&record);
                self.publish(EventKind::RestartFailed, run, &record);
                self.state.send_replace(SupervisorState::Stopped);
            }
        }
    }

    /// Asks the policy; a panicking predicate counts as a decline.
    fn consult(&self, record: &FailureRecord) -> bool {
        panic::catch_unwind(AssertUnwindSafe(|| self.policy.should_restart(record)))
            .unwrap_or(false)
    }

    fn publish(&self, kind: EventKind, run: u64, record: &FailureRecord) {
        self.bus.publish(
            Event::new(kind)
                .with_task(self.lifecycle.name())
                .with_run(run)
                .with_reason(record.to_string()),
        );
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("name", &self.lifecycle.name())
            .field("policy", &self.policy)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::tasks::LifecycleFn;

    async fn bounded<T>(fut: impl std::future::Future<Output = T>) -> T {
        tokio::time::timeout(Duration::from_secs(5), fut)
            .await
            .expect("operation did not complete in time")
    }

    async fn wait_for(sup: &Supervisor, want: SupervisorState) {
        let mut rx = sup.subscribe_state();
        bounded(rx.wait_for(|s| *s == want))
            .await
            .expect("state channel open");
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let lc = LifecycleFn::new("idle", || async { Ok::<_, TaskError>(()) }).arc();
        let sup = Supervisor::new(lc, RestartPolicy::Never);

        sup.start().await.unwrap();
        assert_eq!(sup.start().await, Err(LifecycleError::AlreadyStarted));
        assert_eq!(bounded(sup.stop()).await, Ok(()));
        assert_eq!(sup.stop().await, Err(LifecycleError::AlreadyStopped));
    }

    #[tokio::test]
    async fn test_setup_failure_is_returned_unchanged_and_not_retried() {
        let setups = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&setups);
        let lc = LifecycleFn::new("broken", || async { Ok::<_, TaskError>(()) })
            .with_setup(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(TaskError::fail("no config")) }
            })
            .arc();
        let sup = Supervisor::new(lc, RestartPolicy::Always);

        let want = Err(LifecycleError::Setup(TaskError::fail("no config")));
        assert_eq!(sup.start().await, want);
        assert_eq!(sup.start().await, want);
        assert_eq!(setups.load(Ordering::SeqCst), 2);
        assert_eq!(sup.state(), SupervisorState::Stopped);
        assert_eq!(sup.stop().await, Err(LifecycleError::AlreadyStopped));
    }

    #[tokio::test]
    async fn test_default_policy_stops_after_step_failure() {
        let lc = LifecycleFn::new("failing", || async {
            Err::<(), _>(TaskError::fail("boom"))
        })
        .arc();
        let sup = Supervisor::builder(lc).build();
        let mut events = sup.bus().subscribe();

        sup.start().await.unwrap();
        loop {
            let ev = bounded(events.recv()).await.unwrap();
            if ev.kind == EventKind::RestartDeclined {
                assert_eq!(
                    ev.reason.as_deref(),
                    Some("step failed: execution failed: boom")
                );
                break;
            }
        }
        wait_for(&sup, SupervisorState::Stopped).await;
        assert_eq!(sup.stop().await, Err(LifecycleError::AlreadyStopped));
    }

    #[tokio::test]
    async fn test_panicking_policy_declines_and_stops() {
        let lc = LifecycleFn::new("failing", || async {
            Err::<(), _>(TaskError::fail("boom"))
        })
        .arc();
        let policy = RestartPolicy::custom(|_: &FailureRecord| -> bool { panic!("policy bug") });
        let sup = Supervisor::new(lc, policy);
        let mut events = sup.bus().subscribe();

        sup.start().await.unwrap();
        loop {
            let ev = bounded(events.recv()).await.unwrap();
            assert_ne!(ev.kind, EventKind::RestartRequested);
            if ev.kind == EventKind::RestartDeclined {
                break;
            }
        }
        wait_for(&sup, SupervisorState::Stopped).await;
        assert_eq!(sup.stop().await, Err(LifecycleError::AlreadyStopped));
    }

    #[tokio::test]
    async fn test_restart_replaces_running_run() {
        let setups = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&setups);
        let lc = LifecycleFn::new("idle", || async { Ok::<_, TaskError>(()) })
            .with_setup(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, TaskError>(()) }
            })
            .arc();
        let sup = Supervisor::new(lc, RestartPolicy::Never);

        assert_eq!(bounded(sup.restart()).await, Ok(()));
        assert_eq!(bounded(sup.restart()).await, Ok(()));
        assert_eq!(setups.load(Ordering::SeqCst), 2);
        assert_eq!(sup.state(), SupervisorState::Running);
        assert_eq!(bounded(sup.stop()).await, Ok(()));
    }

    #[tokio::test]
    async fn test_dropping_supervisor_cancels_run() {
        let teardowns = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&teardowns);
        let lc = LifecycleFn::new("idle", || async { Ok::<_, TaskError>(()) })
            .with_teardown(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, TaskError>(()) }
            })
            .arc();
        let sup = Supervisor::new(lc, RestartPolicy::Always);
        sup.start().await.unwrap();
        drop(sup);

        bounded(async {
            while teardowns.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await;
    }
}
