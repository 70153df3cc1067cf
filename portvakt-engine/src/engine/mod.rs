mod error;
mod monitor;
mod state;

pub use self::{
    error::EngineError,
    monitor::{FailureMonitor, FrameOutcome, RunSummary},
    state::MonitorState,
};

pub mod prelude {
    pub use super::{EngineError, FailureMonitor, FrameOutcome, MonitorState, RunSummary};
}
