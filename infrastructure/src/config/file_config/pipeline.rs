//! Pipeline policy from TOML (`[pipeline]` section)

use super::ConfigValidationError;
use discovery_domain::{InterventionMode, PipelinePolicy, RecoveryMode};
use serde::{Deserialize, Serialize};

/// Raw pipeline policy
///
/// # Example
///
/// ```toml
/// [pipeline]
/// intervention_mode = "interactive"   # "interactive", "auto_continue", "disabled"
/// intervention_timeout_ms = 300000    # auto-continue unanswered reviews
/// recovery_mode = "interactive"       # "interactive", "auto_retry", "continue_partial", "export_partial"
/// max_phase_retries = 2
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePipelineConfig {
    pub intervention_mode: String,
    pub intervention_timeout_ms: Option<u64>,
    pub recovery_mode: String,
    pub max_phase_retries: u32,
}

impl Default for FilePipelineConfig {
    fn default() -> Self {
        let policy = PipelinePolicy::default();
        Self {
            intervention_mode: policy.intervention_mode.to_string(),
            intervention_timeout_ms: policy.intervention_timeout_ms,
            recovery_mode: policy.recovery_mode.to_string(),
            max_phase_retries: policy.max_phase_retries,
        }
    }
}

impl FilePipelineConfig {
    pub fn parse_intervention_mode(&self) -> Result<InterventionMode, ConfigValidationError> {
        self.intervention_mode
            .parse()
            .map_err(|_| ConfigValidationError::InvalidEnumValue {
                field: "pipeline.intervention_mode".to_string(),
                value: self.intervention_mode.clone(),
                valid_values: "interactive, auto_continue, disabled",
            })
    }

    pub fn parse_recovery_mode(&self) -> Result<RecoveryMode, ConfigValidationError> {
        self.recovery_mode
            .parse()
            .map_err(|_| ConfigValidationError::InvalidEnumValue {
                field: "pipeline.recovery_mode".to_string(),
                value: self.recovery_mode.clone(),
                valid_values: "interactive, auto_retry, continue_partial, export_partial",
            })
    }

    pub fn to_policy(&self) -> Result<PipelinePolicy, ConfigValidationError> {
        if self.intervention_timeout_ms == Some(0) {
            return Err(ConfigValidationError::ZeroTimeout);
        }
        Ok(PipelinePolicy {
            intervention_mode: self.parse_intervention_mode()?,
            intervention_timeout_ms: self.intervention_timeout_ms,
            recovery_mode: self.parse_recovery_mode()?,
            max_phase_retries: self.max_phase_retries,
        })
    }
}
