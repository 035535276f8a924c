//! Phase list from TOML (`[[phases]]` array)
//!
//! Example configuration:
//!
//! ```toml
//! [[phases]]
//! id = "research"
//! pass_threshold = 7.0
//! max_iterations = 3
//!
//! [[phases]]
//! id = "hypothesis"
//! name = "Hypothesis Generation"
//! mode = "racing"
//! review = "recommended"
//!
//! [phases.racing]
//! strategies = ["literature", "materials", "process"]
//! breakthrough_threshold = 9.0
//! elimination_threshold = 5.0
//! ```

use super::ConfigValidationError;
use discovery_domain::{
    PhaseMode, PhaseSpec, RacingSpec, RacingThresholds, ReviewGate, SCORE_MAX, SCORE_MIN,
};
use serde::{Deserialize, Serialize};

/// Raw phase definition. Unset fields take the domain defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePhaseConfig {
    pub id: String,
    /// Display name; defaults to the id
    pub name: Option<String>,
    /// "refinement" (default) or "racing"
    pub mode: Option<String>,
    pub pass_threshold: Option<f64>,
    pub max_iterations: Option<u32>,
    /// "none", "recommended" or "required"
    pub review: Option<String>,
    pub checkpoint_every: Option<u32>,
    pub required: Option<bool>,
    pub racing: Option<FileRacingConfig>,
}

/// Raw racing settings (`[phases.racing]`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRacingConfig {
    pub strategies: Option<Vec<String>>,
    pub hypotheses_per_strategy: Option<u32>,
    pub breakthrough_threshold: Option<f64>,
    pub elimination_threshold: Option<f64>,
    pub carry_forward: Option<usize>,
}

fn check_score(field: String, value: f64) -> Result<f64, ConfigValidationError> {
    if (SCORE_MIN..=SCORE_MAX).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigValidationError::ThresholdOutOfRange { field, value })
    }
}

impl FileRacingConfig {
    pub fn to_racing_spec(&self, phase: &str) -> Result<RacingSpec, ConfigValidationError> {
        let defaults = RacingSpec::default();
        let strategies = self.strategies.clone().unwrap_or(defaults.strategies);
        if strategies.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigValidationError::EmptyStrategies(phase.to_string()));
        }

        let breakthrough = check_score(
            format!("phases.{}.racing.breakthrough_threshold", phase),
            self.breakthrough_threshold
                .unwrap_or(defaults.thresholds.breakthrough),
        )?;
        let elimination = check_score(
            format!("phases.{}.racing.elimination_threshold", phase),
            self.elimination_threshold
                .unwrap_or(defaults.thresholds.elimination),
        )?;
        if elimination >= breakthrough {
            return Err(ConfigValidationError::EliminationNotBelowBreakthrough {
                phase: phase.to_string(),
                elimination,
                breakthrough,
            });
        }

        let hypotheses_per_strategy = self
            .hypotheses_per_strategy
            .unwrap_or(defaults.hypotheses_per_strategy);
        if hypotheses_per_strategy == 0 {
            return Err(ConfigValidationError::ZeroCount {
                field: format!("phases.{}.racing.hypotheses_per_strategy", phase),
            });
        }

        Ok(RacingSpec {
            strategies,
            hypotheses_per_strategy,
            thresholds: RacingThresholds::new(breakthrough, elimination),
            carry_forward: self.carry_forward.unwrap_or(defaults.carry_forward),
        })
    }
}

impl FilePhaseConfig {
    pub fn to_phase_spec(&self) -> Result<PhaseSpec, ConfigValidationError> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(ConfigValidationError::EmptyPhaseId);
        }
        let name = self.name.clone().unwrap_or_else(|| id.to_string());

        let mode = self.mode.as_deref().unwrap_or("refinement").to_lowercase();
        let mut spec = match mode.as_str() {
            "refinement" => PhaseSpec::refinement(id, name),
            "racing" => {
                let racing = self
                    .racing
                    .clone()
                    .unwrap_or_default()
                    .to_racing_spec(id)?;
                PhaseSpec::racing(id, name, racing)
            }
            _ => {
                return Err(ConfigValidationError::InvalidEnumValue {
                    field: format!("phases.{}.mode", id),
                    value: mode,
                    valid_values: "refinement, racing",
                });
            }
        };
        if self.racing.is_some() && !matches!(spec.mode, PhaseMode::Racing(_)) {
            tracing::warn!(phase = id, "[phases.racing] is ignored for refinement phases");
        }

        if let Some(threshold) = self.pass_threshold {
            spec.pass_threshold = check_score(format!("phases.{}.pass_threshold", id), threshold)?;
        }
        if let Some(max) = self.max_iterations {
            if max == 0 {
                return Err(ConfigValidationError::ZeroCount {
                    field: format!("phases.{}.max_iterations", id),
                });
            }
            spec.max_iterations = max;
        }
        if let Some(review) = &self.review {
            spec.review = review
                .parse::<ReviewGate>()
                .map_err(|_| ConfigValidationError::InvalidEnumValue {
                    field: format!("phases.{}.review", id),
                    value: review.clone(),
                    valid_values: "none, recommended, required",
                })?;
        }
        if let Some(every) = self.checkpoint_every {
            if every == 0 {
                return Err(ConfigValidationError::ZeroCount {
                    field: format!("phases.{}.checkpoint_every", id),
                });
            }
            spec.checkpoint_every = Some(every);
        }
        if let Some(required) = self.required {
            spec.required = required;
        }
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(id: &str) -> FilePhaseConfig {
        FilePhaseConfig {
            id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_minimal_phase_uses_defaults() {
        let spec = phase("research").to_phase_spec().unwrap();
        assert_eq!(spec.name, "research");
        assert_eq!(spec.pass_threshold, 7.0);
        assert_eq!(spec.max_iterations, 3);
        assert_eq!(spec.review, ReviewGate::None);
        assert!(spec.required);
        assert!(!spec.is_racing());
    }

    #[test]
    fn test_racing_phase() {
        let config = FilePhaseConfig {
            mode: Some("racing".to_string()),
            review: Some("recommended".to_string()),
            racing: Some(FileRacingConfig {
                strategies: Some(vec!["literature".to_string()]),
                breakthrough_threshold: Some(8.5),
                ..Default::default()
            }),
            ..phase("hypothesis")
        };
        let spec = config.to_phase_spec().unwrap();
        let racing = spec.racing_spec().unwrap();
        assert_eq!(racing.strategies, vec!["literature".to_string()]);
        assert_eq!(racing.thresholds.breakthrough, 8.5);
        assert_eq!(racing.thresholds.elimination, 5.0);
        assert_eq!(spec.review, ReviewGate::Recommended);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero = FilePhaseConfig {
            max_iterations: Some(0),
            ..phase("research")
        };
        assert!(matches!(
            zero.to_phase_spec(),
            Err(ConfigValidationError::ZeroCount { .. })
        ));

        let threshold = FilePhaseConfig {
            pass_threshold: Some(10.5),
            ..phase("research")
        };
        assert!(matches!(
            threshold.to_phase_spec(),
            Err(ConfigValidationError::ThresholdOutOfRange { .. })
        ));

        let mode = FilePhaseConfig {
            mode: Some("tournament".to_string()),
            ..phase("research")
        };
        assert!(matches!(
            mode.to_phase_spec(),
            Err(ConfigValidationError::InvalidEnumValue { .. })
        ));

        assert!(matches!(
            phase("  ").to_phase_spec(),
            Err(ConfigValidationError::EmptyPhaseId)
        ));
    }

    #[test]
    fn test_racing_threshold_order_enforced() {
        let racing = FileRacingConfig {
            breakthrough_threshold: Some(5.0),
            elimination_threshold: Some(6.0),
            ..Default::default()
        };
        assert!(matches!(
            racing.to_racing_spec("hypothesis"),
            Err(ConfigValidationError::EliminationNotBelowBreakthrough { .. })
        ));

        let empty = FileRacingConfig {
            strategies: Some(vec![]),
            ..Default::default()
        };
        assert!(matches!(
            empty.to_racing_spec("hypothesis"),
            Err(ConfigValidationError::EmptyStrategies(_))
        ));
    }
}
