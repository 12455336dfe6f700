//! # Function-backed lifecycle (`LifecycleFn`)
//!
//! [`LifecycleFn`] wraps up to three closures `Fn() -> Fut`, producing a fresh
//! future per call. Missing `setup`/`teardown` closures default to [`noop`].
//!
//! ## Concurrency semantics
//! - Each call creates a **new** future owning its own state.
//! - No hidden mutation between calls or restarts; shared state goes into an
//!   explicit `Arc<...>` captured by the closures.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use restartable::{Lifecycle, LifecycleFn, LifecycleRef, TaskError};
//!
//! let steps = Arc::new(AtomicU32::new(0));
//! let counter = Arc::clone(&steps);
//!
//! let lc: LifecycleRef = LifecycleFn::new("counter", move || {
//!     let counter = Arc::clone(&counter);
//!     async move {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!         Ok::<_, TaskError>(())
//!     }
//! })
//! .with_teardown(|| async { Ok::<_, TaskError>(()) })
//! .arc();
//!
//! assert_eq!(lc.name(), "counter");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::tasks::lifecycle::Lifecycle;

/// Boxed future returned by a lifecycle callback.
pub type BoxTaskFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send + 'static>>;

type Callback = Arc<dyn Fn() -> BoxTaskFuture + Send + Sync>;

/// Callback that completes immediately with `Ok(())`.
pub fn noop() -> BoxTaskFuture {
    Box::pin(async { Ok(()) })
}

fn boxed<F, Fut>(f: F) -> Callback
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()) as BoxTaskFuture)
}

/// Function-backed lifecycle implementation.
pub struct LifecycleFn {
    name: Cow<'static, str>,
    setup: Callback,
    step: Callback,
    teardown: Callback,
}

impl LifecycleFn {
    /// Creates a lifecycle from its `step` closure; `setup` and `teardown` are no-ops.
    pub fn new<F, Fut>(name: impl Into<Cow<'static, str>>, step: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            setup: Arc::new(noop),
            step: boxed(step),
            teardown: Arc::new(noop),
        }
    }

    /// Replaces the `setup` closure.
    #[must_use]
    pub fn with_setup<F, Fut>(mut self, setup: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.setup = boxed(setup);
        self
    }

    /// Replaces the `teardown` closure.
    #[must_use]
    pub fn with_teardown<F, Fut>(mut self, teardown: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.teardown = boxed(teardown);
        self
    }

    /// Returns the lifecycle as a shared handle (`Arc<dyn Lifecycle>`).
    pub fn arc(self) -> Arc<dyn Lifecycle> {
        Arc::new(self)
    }
}

impl std::fmt::Debug for LifecycleFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleFn")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Lifecycle for LifecycleFn {
    fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&self) -> Result<(), TaskError> {
        (self.setup)().await
    }

    async fn step(&self) -> Result<(), TaskError> {
        (self.step)().await
    }

    async fn teardown(&self) -> Result<(), TaskError> {
        (self.teardown)().await
    }
}
