//! # restartable
//!
//! **Restartable** runs a long-lived unit of work (repeated `step` calls
//! bracketed by one-time `setup` and `teardown`) on a dedicated tokio task.
//! The run is stopped cooperatively and can be restarted when a step fails.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌─────────────────────────────────────────────┐
//!     │ Lifecycle (user code)                       │
//!     │   setup() · step() · teardown()             │
//!     └──────────────────────┬──────────────────────┘
//!                            ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                       │
//! │  - one mutex over {owned TaskHandle, state}                       │
//! │  - RestartPolicy (Never by default)                               │
//! │  - monitor per run (step-failure side channel)                    │
//! └──────┬───────────────────────────────────────────────────┬────────┘
//!        ▼                                                   │
//!     ┌──────────────────────────┐                           │
//!     │ TaskHandle               │                           │
//!     │ setup → step* → teardown │                           │
//!     └┬─────────────────────────┘                           │
//!      │ Publishes: TaskStarting, TaskStarted, StepFailed,   │ Publishes: RestartRequested,
//!      │ TeardownFailed, TaskStopped, ...                    │ RestartDeclined, RestartFailed
//!      ▼                                                     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                         listener ──► SubscriberSet ──► Subscribe::on_event()
//! ```
//!
//! ### Lifecycle
//! ```text
//! Supervisor::start()
//!   ├─► setup()                     Err ──► returned to the caller, Stopped
//!   ├─► worker: loop { step() }     until cancelled or Err
//!   └─► monitor: wait for a step error
//!         └─► teardown → RestartPolicy(FailureRecord)
//!               ├─ false ──► Stopped
//!               └─ true  ──► setup() again ──► Running / Stopped
//!
//! Supervisor::stop() ──► cancel ──► (current step finishes) ──► teardown ──► result
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Lifecycles**    | Define setup/step/teardown as a trait or closures.            | [`Lifecycle`], [`LifecycleFn`]              |
//! | **Runs**          | Run one lifecycle and close it exactly once.                  | [`TaskHandle`]                              |
//! | **Supervision**   | Own one run, restart it after step failures.                  | [`Supervisor`], [`SupervisorState`]         |
//! | **Policies**      | Decide whether to restart from the failure record.            | [`RestartPolicy`], [`FailureRecord`]        |
//! | **Errors**        | Typed callback and lifecycle errors.                          | [`TaskError`], [`LifecycleError`]           |
//! | **Subscriber API**| Hook into run and restart events.                             | [`Subscribe`], [`Event`]                    |
//! | **Configuration** | Bus capacity and default policy.                              | [`SupervisorConfig`]                        |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use restartable::{LifecycleFn, RestartPolicy, Supervisor, SupervisorState, TaskError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let calls = Arc::new(AtomicU32::new(0));
//!     let counter = Arc::clone(&calls);
//!
//!     // Fails on the third step, then works again after a restart.
//!     let worker = LifecycleFn::new("worker", move || {
//!         let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
//!         async move {
//!             if n == 3 {
//!                 return Err(TaskError::fail("flaky"));
//!             }
//!             tokio::task::yield_now().await;
//!             Ok(())
//!         }
//!     })
//!     .arc();
//!
//!     let sup = Supervisor::new(worker, RestartPolicy::OnStepFailure);
//!     sup.start().await?;
//!
//!     let mut state = sup.subscribe_state();
//!     state.wait_for(|s| *s == SupervisorState::Running).await?;
//!
//!     sup.stop().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod policies;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{Supervisor, SupervisorBuilder, SupervisorConfig, SupervisorState, TaskHandle};
pub use error::{FailureRecord, LifecycleError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use policies::{RestartFn, RestartPolicy};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{BoxTaskFuture, Lifecycle, LifecycleFn, LifecycleRef, noop};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
