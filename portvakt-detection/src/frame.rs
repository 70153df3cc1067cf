//! ## portvakt-detection::frame
//! **Groups capture lines into frames**
//!
//! A frame is every line seen since the previous frame, up to and including
//! the next line that carries the boundary marker (the HTTP status line by
//! default). Only the newly pushed line is tested for the marker, so a frame
//! is flushed exactly once per boundary line.

use aho_corasick::AhoCorasick;

use crate::error::DetectionError;

/// The text of one completed frame, lines joined with `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(String);

impl Frame {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.0.lines()
    }
}

impl From<&str> for Frame {
    fn from(text: &str) -> Self {
        Frame(text.to_string())
    }
}

/// Accumulates lines until a boundary line completes the frame.
pub struct FrameBuffer {
    boundary: AhoCorasick,
    text: String,
}

impl FrameBuffer {
    pub fn new(boundary_marker: &str) -> Result<Self, DetectionError> {
        if boundary_marker.is_empty() {
            return Err(DetectionError::EmptyMarker("boundary"));
        }
        let boundary = AhoCorasick::new([boundary_marker])
            .map_err(|e| DetectionError::PatternError(e.to_string()))?;
        Ok(Self {
            boundary,
            text: String::new(),
        })
    }

    /// Appends `line` and returns the completed frame if `line` is a boundary.
    /// The buffer is empty again afterwards.
    #[inline]
    pub fn push(&mut self, line: &str) -> Option<Frame> {
        self.text.push_str(line);
        self.text.push('\n');

        if self.boundary.is_match(line) {
            Some(Frame(std::mem::take(&mut self.text)))
        } else {
            None
        }
    }

    /// Bytes buffered for the frame in progress.
    pub fn pending_len(&self) -> usize {
        self.text.len()
    }

    /// Drops an unterminated trailing frame, returning how many bytes were lost.
    pub fn finish(&mut self) -> usize {
        let dropped = self.text.len();
        self.text.clear();
        dropped
    }
}
