/// Observable state of a [`Supervisor`](crate::Supervisor).
///
/// ```text
///            start() ok
///  Stopped ─────────────► Running
///     ▲  ◄──────────────    │
///     │      stop()         │ step failed (monitor)
///     │                     ▼
///     └──── declined / ─ Restarting ── restarted ──► Running
///           setup failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupervisorState {
    /// No run is owned.
    #[default]
    Stopped,
    /// A run is owned and its step loop is active.
    Running,
    /// The monitor is tearing down a failed run and consulting the restart policy.
    Restarting,
}

impl SupervisorState {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorState::Stopped => "stopped",
            SupervisorState::Running => "running",
            SupervisorState::Restarting => "restarting",
        }
    }
}
