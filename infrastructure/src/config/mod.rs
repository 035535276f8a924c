//! Configuration file loading for discovery-pipeline
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `DISCOVERY_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./discovery.toml` or `./.discovery.toml`
//! 4. Global: `$XDG_CONFIG_HOME/discovery-pipeline/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileConfig, FileOutputConfig, FileOutputFormat, FilePhaseConfig,
    FilePipelineConfig, FileRacingConfig,
};
pub use loader::ConfigLoader;
