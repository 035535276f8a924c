//! Presentation layer for discovery-pipeline
//!
//! This crate contains CLI definitions, output formatters,
//! progress reporters and the interactive terminal reviewer.

pub mod cli;
pub mod output;
pub mod progress;
pub mod review;

// Re-export commonly used types
pub use cli::commands::{Cli, OutputFormat};
pub use output::console::ConsoleFormatter;
pub use progress::reporter::{ProgressReporter, SimpleProgress};
pub use review::ConsoleReviewer;
