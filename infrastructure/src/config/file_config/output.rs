//! Output configuration from TOML (`[output]` section)

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the final run is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOutputFormat {
    /// Human-readable phase table
    #[default]
    Summary,
    /// The full serialized run
    Json,
}

impl fmt::Display for FileOutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOutputFormat::Summary => write!(f, "summary"),
            FileOutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Raw output configuration from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutputConfig {
    pub format: FileOutputFormat,
    /// Enable colored terminal output
    pub color: bool,
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self {
            format: FileOutputFormat::Summary,
            color: true,
        }
    }
}
