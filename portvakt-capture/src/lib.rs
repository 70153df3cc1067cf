//! portvakt‑capture
//!
//! Provides the Stream Reader for Portvakt: launches the external capture
//! process (tcpdump by default) and exposes its decoded output as a sequence
//! of text lines. Saved capture text can be read through the same interface.

pub mod capture;
pub mod error;
pub mod lines;

pub use capture::{CaptureCommand, CaptureProcess, CaptureTerminator}; // Re-export for easier use
pub use error::CaptureError;
pub use lines::{LineReader, LineSource};
