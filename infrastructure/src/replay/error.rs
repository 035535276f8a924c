//! Error types for the replay adapter

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a transcript
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Failed to read transcript {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid transcript: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Transcript has no recorded turns or hypotheses")]
    Empty,
}
