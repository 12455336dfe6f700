//! Runtime core: runs and supervision.
//!
//! This module contains the implementation of the restartable runtime.
//! The public API from this module is [`TaskHandle`], [`Supervisor`] and their
//! configuration/state types.
//!
//! Internal modules:
//! - [`runner`]: runs one setup/step/teardown lifecycle and closes it on request;
//! - [`failure`]: one-shot step-failure channel and the lifecycle wrapper feeding it;
//! - [`supervisor`]: owns at most one run, monitors it, restarts it per policy;
//! - [`builder`]: wires configuration, policy and subscribers into a supervisor;
//! - [`config`]: supervisor settings;
//! - [`state`]: observable supervisor state.

mod builder;
mod config;
mod failure;
mod runner;
mod state;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::SupervisorConfig;
pub use runner::TaskHandle;
pub use state::SupervisorState;
pub use supervisor::Supervisor;
