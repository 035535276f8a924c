//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized as plain strings and numbers, then converted to
//! domain types by [`FileConfig::into_discovery_config`].

mod output;
mod phases;
mod pipeline;

pub use output::{FileOutputConfig, FileOutputFormat};
pub use phases::{FilePhaseConfig, FileRacingConfig};
pub use pipeline::FilePipelineConfig;

use discovery_application::DiscoveryConfig;
use discovery_domain::PhaseSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("{field}: unknown value '{value}' (expected one of: {valid_values})")]
    InvalidEnumValue {
        field: String,
        value: String,
        valid_values: &'static str,
    },

    #[error("{field} must be at least 1")]
    ZeroCount { field: String },

    #[error("{field}: {value} is outside the score range 0-10")]
    ThresholdOutOfRange { field: String, value: f64 },

    #[error(
        "phases.{phase}.racing: elimination_threshold {elimination} must be below breakthrough_threshold {breakthrough}"
    )]
    EliminationNotBelowBreakthrough {
        phase: String,
        elimination: f64,
        breakthrough: f64,
    },

    #[error("phases.{0}.racing: strategies cannot be empty")]
    EmptyStrategies(String),

    #[error("phase id cannot be empty")]
    EmptyPhaseId,

    #[error("duplicate phase id: {0}")]
    DuplicatePhase(String),

    #[error("pipeline.intervention_timeout_ms cannot be 0")]
    ZeroTimeout,

    #[error("{0}")]
    Invalid(String),
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Intervention and recovery policy
    pub pipeline: FilePipelineConfig,
    /// Ordered phases; empty means the built-in default pipeline
    pub phases: Vec<FilePhaseConfig>,
    /// Output settings
    pub output: FileOutputConfig,
}

impl FileConfig {
    /// Convert to the application config, rejecting the first invalid value.
    pub fn into_discovery_config(&self) -> Result<DiscoveryConfig, ConfigValidationError> {
        let policy = self.pipeline.to_policy()?;

        let phases = if self.phases.is_empty() {
            PhaseSpec::default_pipeline()
        } else {
            let mut seen = HashSet::new();
            let mut phases = Vec::with_capacity(self.phases.len());
            for phase in &self.phases {
                let spec = phase.to_phase_spec()?;
                if !seen.insert(spec.id.clone()) {
                    return Err(ConfigValidationError::DuplicatePhase(spec.id.to_string()));
                }
                phases.push(spec);
            }
            phases
        };

        let config = DiscoveryConfig::new(phases, policy);
        // Anything the field checks above missed.
        config
            .validate()
            .map_err(|e| ConfigValidationError::Invalid(e.to_string()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_domain::{InterventionMode, RecoveryMode, ReviewGate};

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[pipeline]
intervention_mode = "auto_continue"
intervention_timeout_ms = 30000
recovery_mode = "auto_retry"
max_phase_retries = 1

[[phases]]
id = "research"
pass_threshold = 6.5

[[phases]]
id = "hypothesis"
name = "Hypothesis Generation"
mode = "racing"
review = "required"
max_iterations = 4

[phases.racing]
strategies = ["literature", "materials"]
hypotheses_per_strategy = 3

[output]
format = "json"
color = false
"#;

        let file: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(file.phases.len(), 2);
        assert_eq!(file.output.format, FileOutputFormat::Json);
        assert!(!file.output.color);

        let config = file.into_discovery_config().unwrap();
        assert_eq!(config.policy.intervention_mode, InterventionMode::AutoContinue);
        assert_eq!(config.policy.recovery_mode, RecoveryMode::AutoRetry);
        assert_eq!(config.policy.intervention_timeout_ms, Some(30000));
        assert_eq!(config.policy.max_phase_retries, 1);
        assert_eq!(config.phases[0].pass_threshold, 6.5);
        assert_eq!(config.phases[1].name, "Hypothesis Generation");
        assert_eq!(config.phases[1].review, ReviewGate::Required);
        let racing = config.phases[1].racing_spec().unwrap();
        assert_eq!(racing.population_size(), 6);
    }

    #[test]
    fn test_empty_config_uses_default_pipeline() {
        let file: FileConfig = toml::from_str("").unwrap();
        let config = file.into_discovery_config().unwrap();
        assert_eq!(config, DiscoveryConfig::default());
    }

    #[test]
    fn test_duplicate_phase_rejected() {
        let toml_str = r#"
[[phases]]
id = "research"

[[phases]]
id = "research"
"#;
        let file: FileConfig = toml::from_str(toml_str).unwrap();
        assert!(matches!(
            file.into_discovery_config(),
            Err(ConfigValidationError::DuplicatePhase(id)) if id == "research"
        ));
    }

    #[test]
    fn test_single_round_race_rejected_by_domain_check() {
        let toml_str = r#"
[[phases]]
id = "hypothesis"
mode = "racing"
max_iterations = 1
"#;
        let file: FileConfig = toml::from_str(toml_str).unwrap();
        assert!(matches!(
            file.into_discovery_config(),
            Err(ConfigValidationError::Invalid(_))
        ));
    }
}
