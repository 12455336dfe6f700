//! # Lifecycle abstraction.
//!
//! A [`Lifecycle`] is the unit of work a [`TaskHandle`](crate::TaskHandle) runs:
//!
//! ```text
//! setup() ──► step() ──► step() ──► ... ──► teardown()
//!  (once)      (until error or cancellation)    (once)
//! ```
//!
//! The common handle type is [`LifecycleRef`], an `Arc<dyn Lifecycle>` that the
//! runner and the supervisor share between restarts.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;

/// Shared handle to a lifecycle.
pub type LifecycleRef = Arc<dyn Lifecycle>;

/// # Setup / step / teardown callbacks.
///
/// - `setup` runs once, in the caller's task, before any step. If it fails it
///   must clean up its own partial side effects: `teardown` is not called.
/// - `step` is called repeatedly on a dedicated tokio task until it fails or
///   the run is cancelled. Cancellation is only observed between two steps.
/// - `teardown` runs exactly once after the step loop ends, whatever the reason.
///
/// `setup` and `teardown` default to no-ops.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use restartable::{Lifecycle, TaskError};
///
/// struct Ticker;
///
/// #[async_trait]
/// impl Lifecycle for Ticker {
///     fn name(&self) -> &str { "ticker" }
///
///     async fn step(&self) -> Result<(), TaskError> {
///         // one unit of work...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Lifecycle: Send + Sync + 'static {
    /// Returns a stable, human-readable name used in events.
    fn name(&self) -> &str;

    /// Prepares resources for the step loop.
    async fn setup(&self) -> Result<(), TaskError> {
        Ok(())
    }

    /// Performs one unit of work.
    ///
    /// Implementations that wait on I/O should return periodically: a step that
    /// never returns never observes cancellation.
    async fn step(&self) -> Result<(), TaskError>;

    /// Releases what `setup` acquired.
    async fn teardown(&self) -> Result<(), TaskError> {
        Ok(())
    }
}
