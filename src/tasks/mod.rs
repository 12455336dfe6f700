//! # Lifecycle abstractions.
//!
//! This module provides the lifecycle-related types:
//! - [`Lifecycle`] - trait for setup/step/teardown units of work
//! - [`LifecycleFn`] - closure-backed lifecycle implementation
//! - [`LifecycleRef`] - shared reference to a lifecycle (`Arc<dyn Lifecycle>`)
//! - [`noop`] - callback that does nothing

mod lifecycle;
mod lifecycle_fn;

pub use lifecycle::{Lifecycle, LifecycleRef};
pub use lifecycle_fn::{BoxTaskFuture, LifecycleFn, noop};
