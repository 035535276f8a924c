//! CLI command definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Phase table plus accepted outputs
    Summary,
    /// The full run record as JSON
    Json,
}

/// CLI arguments for discovery-pipeline
#[derive(Parser, Debug)]
#[command(name = "discovery-pipeline")]
#[command(author, version, about = "Phase-gated discovery runs with human checkpoints")]
#[command(long_about = r#"
Discovery Pipeline drives a query through an ordered list of phases.

Each phase refines a candidate until it scores at or above its threshold,
or races a population of hypotheses against each other. Between phases the
run can stop at review checkpoints; a failed phase waits for a recovery
decision (retry, modify query, continue partial, export partial).

Candidates and scores come from a recorded transcript (--transcript).

Configuration files are loaded from (in priority order):
1. DISCOVERY_* environment variables
2. --config <path>     Explicit config file
3. ./discovery.toml    Project-level config
4. ~/.config/discovery-pipeline/config.toml   Global config

Example:
  discovery-pipeline --transcript run.json "Find a stable electrolyte"
  discovery-pipeline --transcript run.json --auto --output json "..."
"#)]
pub struct Cli {
    /// The research query to run (not required with --show-config)
    pub query: Option<String>,

    /// Recorded transcript that supplies candidates and scores
    #[arg(short, long, value_name = "PATH")]
    pub transcript: Option<PathBuf>,

    /// Answer every checkpoint and failure without prompting
    #[arg(long)]
    pub auto: bool,

    /// Output format
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Write every run event as JSON lines to this file
    #[arg(long, value_name = "PATH")]
    pub events: Option<PathBuf>,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}
