use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Marker must not be empty: {0}")]
    EmptyMarker(&'static str),

    #[error("Pattern compilation failed: {0}")]
    PatternError(String),
}
