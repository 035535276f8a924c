//! Infrastructure layer for discovery-pipeline
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: configuration file loading, the JSONL
//! run event log and the transcript replay collaborator.

pub mod config;
pub mod logging;
pub mod replay;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigValidationError, FileConfig, FileOutputConfig, FileOutputFormat,
    FilePhaseConfig, FilePipelineConfig, FileRacingConfig,
};
pub use logging::JsonlRunEventLogger;
pub use replay::{ReplayCollaborator, ReplayError, Transcript};
