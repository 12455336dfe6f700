//! # Supervisor configuration.
//!
//! Provides [`SupervisorConfig`], the settings a [`Supervisor`](crate::Supervisor) is built with.
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1 by [`SupervisorConfig::bus_capacity_clamped`]

use crate::policies::RestartPolicy;

/// Configuration for one supervisor.
///
/// ## Field semantics
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `restart`: Restart policy used unless the builder overrides it
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages skip older items.
    pub bus_capacity: usize,

    /// Restart policy applied after step failures.
    pub restart: RestartPolicy,
}

impl SupervisorConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `restart = RestartPolicy::Never` (no automatic restart)
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            restart: RestartPolicy::default(),
        }
    }
}
