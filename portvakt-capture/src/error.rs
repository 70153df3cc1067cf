use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Failed to launch capture program `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Capture process did not provide a stdout pipe")]
    MissingStdout,

    #[error("Error reading capture output: {0}")]
    Read(#[source] std::io::Error),

    #[error("Failed to open capture file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for capture process: {0}")]
    Wait(#[source] std::io::Error),
}
