//! Discovery configuration: the pipeline shape and its policy.
//!
//! [`DiscoveryConfig`] is what `RunDiscoveryUseCase` is built from. It is
//! static for the lifetime of a run; every run gets its own copy.

use discovery_domain::{DomainError, PhaseSpec, PipelinePolicy, validate_pipeline};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Ordered phases of the pipeline.
    pub phases: Vec<PhaseSpec>,
    pub policy: PipelinePolicy,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            phases: PhaseSpec::default_pipeline(),
            policy: PipelinePolicy::default(),
        }
    }
}

impl DiscoveryConfig {
    pub fn new(phases: Vec<PhaseSpec>, policy: PipelinePolicy) -> Self {
        Self { phases, policy }
    }

    // ==================== Builder Methods ====================

    pub fn with_phases(mut self, phases: Vec<PhaseSpec>) -> Self {
        self.phases = phases;
        self
    }

    pub fn with_policy(mut self, policy: PipelinePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn phase(&self, index: usize) -> Option<&PhaseSpec> {
        self.phases.get(index)
    }

    pub fn intervention_timeout(&self) -> Option<Duration> {
        self.policy.intervention_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        validate_pipeline(&self.phases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_domain::InterventionMode;

    #[test]
    fn test_default_is_valid() {
        let config = DiscoveryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.phases.len(), 4);
        assert!(config.intervention_timeout().is_none());
    }

    #[test]
    fn test_builder() {
        let config = DiscoveryConfig::default()
            .with_phases(vec![PhaseSpec::refinement("research", "Research")])
            .with_policy(
                PipelinePolicy::default()
                    .with_intervention_mode(InterventionMode::AutoContinue)
                    .with_intervention_timeout_ms(5000),
            );
        assert_eq!(config.phases.len(), 1);
        assert_eq!(config.intervention_timeout(), Some(Duration::from_millis(5000)));
        assert_eq!(config.phase(0).map(|p| p.id.as_str()), Some("research"));
    }

    #[test]
    fn test_empty_pipeline_invalid() {
        let config = DiscoveryConfig::default().with_phases(vec![]);
        assert!(config.validate().is_err());
    }
}
