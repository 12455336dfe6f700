//! # Step-failure side channel between a run and its monitor.
//!
//! The supervisor does not run the user's lifecycle directly: it runs a
//! [`Watched`] wrapper that reports the step error to the monitor **before**
//! the runner's own error path continues.
//!
//! ```text
//!  step worker                           monitor
//!  ───────────                           ───────
//!  inner.step() ── Err(e) | panic
//!  publish(e) ───────── Published{e} ──► recv()
//!     (waits)  ◄──────── ack ─────────── acknowledges, then locks the supervisor
//!  return Err(e) to the step loop
//!  inner.teardown()
//!  close() ─────────── sender dropped    (a monitor still waiting sees `None`)
//! ```
//!
//! ## Rules
//! - The channel is **one-shot**: at most one error is ever delivered.
//! - Publishing is a rendezvous: the worker resumes only once the monitor has received
//!   the error (or the monitor is gone), so the monitor sees the error before teardown starts.
//! - `close()` after teardown always releases a monitor that is still waiting.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::runner::step_once;
use crate::error::TaskError;
use crate::tasks::{Lifecycle, LifecycleRef};

/// Step error plus the acknowledgement the worker waits on.
struct Published {
    error: TaskError,
    ack: oneshot::Sender<()>,
}

/// Creates a connected failure sender/receiver pair.
pub(crate) fn channel() -> (FailureTx, FailureRx) {
    let (tx, rx) = oneshot::channel();
    (
        FailureTx {
            tx: Mutex::new(Some(tx)),
        },
        FailureRx { rx },
    )
}

/// Sending half, shared by the wrapped `step` and `teardown`.
pub(crate) struct FailureTx {
    tx: Mutex<Option<oneshot::Sender<Published>>>,
}

impl FailureTx {
    /// Delivers `error` to the monitor and waits until it has been received.
    ///
    /// No-op after the first publish or after [`close`](Self::close).
    pub(crate) async fn publish(&self, error: TaskError) {
        let Some(tx) = self.take() else { return };

        let (ack, acked) = oneshot::channel();
        if tx.send(Published { error, ack }).is_ok() {
            // Err: the monitor was dropped without receiving.
            let _ = acked.await;
        }
    }

    /// Closes the channel without a value.
    pub(crate) fn close(&self) {
        drop(self.take());
    }

    fn take(&self) -> Option<oneshot::Sender<Published>> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Receiving half, owned by the monitor.
pub(crate) struct FailureRx {
    rx: oneshot::Receiver<Published>,
}

impl FailureRx {
    /// Waits for the step error of the run.
    ///
    /// Returns `None` when the run ended without a step failure.
    pub(crate) async fn recv(self) -> Option<TaskError> {
        let Published { error, ack } = self.rx.await.ok()?;
        let _ = ack.send(());
        Some(error)
    }
}

/// Lifecycle wrapper that reports step failures on a [`FailureTx`].
pub(crate) struct Watched {
    inner: LifecycleRef,
    failures: FailureTx,
}

impl Watched {
    pub(crate) fn new(inner: LifecycleRef, failures: FailureTx) -> Self {
        Self { inner, failures }
    }
}

#[async_trait]
impl Lifecycle for Watched {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn setup(&self) -> Result<(), TaskError> {
        self.inner.setup().await
    }

    async fn step(&self) -> Result<(), TaskError> {
        let res = step_once(self.inner.as_ref()).await;
        if let Err(e) = &res {
            self.failures.publish(e.clone()).await;
        }
        res
    }

    async fn teardown(&self) -> Result<(), TaskError> {
        let res = self.inner.teardown().await;
        self.failures.close();
        res
    }
}
