//! # Supervision policies.
//!
//! - [`RestartPolicy`] decides whether a supervisor sets its lifecycle up again
//!   after a step failure, based on the [`FailureRecord`](crate::FailureRecord).

mod restart;

pub use restart::{RestartFn, RestartPolicy};
