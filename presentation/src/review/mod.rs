//! Terminal prompts for checkpoints and failed phases.

pub mod commands;
pub mod console;

pub use commands::{ParsedCommand, parse_failure_command, parse_intervention_command};
pub use console::ConsoleReviewer;
