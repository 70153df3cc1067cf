use std::fmt;

/// Lifecycle of a [`FailureMonitor`](crate::engine::FailureMonitor).
///
/// `Stopped` is terminal; a stopped monitor is never restarted in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
    Stopped,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MonitorState::Idle => "idle",
            MonitorState::Running => "running",
            MonitorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
