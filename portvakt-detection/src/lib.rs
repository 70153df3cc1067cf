//! # Portvakt Detection Engine
//!
//! Turns the capture line stream into decisions: lines are grouped into
//! frames, frames are checked for an authentication failure, and failures are
//! counted per source address.

pub mod counters;
pub mod error;
pub mod frame;
pub mod matcher;

pub use counters::FailureCounters;
pub use error::DetectionError;
pub use frame::{Frame, FrameBuffer};
pub use matcher::{FailureMatcher, MatchResult};
