//! Phase specifications: the static shape of a pipeline.

use crate::core::error::DomainError;
use crate::core::ids::PhaseId;
use crate::core::score::{SCORE_MAX, SCORE_MIN};
use crate::racing::classification::RacingThresholds;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Human review requested after a phase completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewGate {
    #[default]
    None,
    /// Raise a `review_recommended` intervention
    Recommended,
    /// Raise an `approval_required` intervention
    Required,
}

impl fmt::Display for ReviewGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewGate::None => write!(f, "none"),
            ReviewGate::Recommended => write!(f, "recommended"),
            ReviewGate::Required => write!(f, "required"),
        }
    }
}

impl std::str::FromStr for ReviewGate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "off" => Ok(ReviewGate::None),
            "recommended" | "review" => Ok(ReviewGate::Recommended),
            "required" | "approval" => Ok(ReviewGate::Required),
            _ => Err(format!("Invalid ReviewGate: {}", s)),
        }
    }
}

/// Population settings for a racing phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RacingSpec {
    /// Agent strategies; each proposes `hypotheses_per_strategy` candidates
    pub strategies: Vec<String>,
    pub hypotheses_per_strategy: u32,
    pub thresholds: RacingThresholds,
    /// How many top hypotheses become the phase output
    pub carry_forward: usize,
}

impl Default for RacingSpec {
    fn default() -> Self {
        Self {
            strategies: vec![
                "literature".to_string(),
                "materials".to_string(),
                "process".to_string(),
            ],
            hypotheses_per_strategy: 2,
            thresholds: RacingThresholds::default(),
            carry_forward: 3,
        }
    }
}

impl RacingSpec {
    pub fn population_size(&self) -> usize {
        self.strategies.len() * self.hypotheses_per_strategy as usize
    }
}

/// How a phase produces its output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseMode {
    /// Generate → score → retry with feedback
    Refinement,
    /// Population of competing hypotheses
    Racing(RacingSpec),
}

/// Static description of one pipeline phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    pub id: PhaseId,
    pub name: String,
    pub pass_threshold: f64,
    pub max_iterations: u32,
    pub review: ReviewGate,
    /// Raise an escalation checkpoint after every n-th failing iteration
    pub checkpoint_every: Option<u32>,
    /// Whether the run loses its purpose without this phase
    pub required: bool,
    pub mode: PhaseMode,
}

impl PhaseSpec {
    pub fn refinement(id: impl Into<PhaseId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            pass_threshold: 7.0,
            max_iterations: 3,
            review: ReviewGate::None,
            checkpoint_every: None,
            required: true,
            mode: PhaseMode::Refinement,
        }
    }

    pub fn racing(id: impl Into<PhaseId>, name: impl Into<String>, racing: RacingSpec) -> Self {
        Self {
            mode: PhaseMode::Racing(racing),
            max_iterations: 5,
            ..Self::refinement(id, name)
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.pass_threshold = threshold;
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_review(mut self, review: ReviewGate) -> Self {
        self.review = review;
        self
    }

    pub fn with_checkpoint_every(mut self, every: u32) -> Self {
        self.checkpoint_every = Some(every);
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn racing_spec(&self) -> Option<&RacingSpec> {
        match &self.mode {
            PhaseMode::Racing(spec) => Some(spec),
            PhaseMode::Refinement => None,
        }
    }

    pub fn is_racing(&self) -> bool {
        matches!(self.mode, PhaseMode::Racing(_))
    }

    /// Whether an escalation checkpoint follows the given failing iteration.
    ///
    /// Never true for the final iteration of the budget.
    pub fn checkpoint_after(&self, iteration: u32) -> bool {
        match self.checkpoint_every {
            Some(every) if every > 0 => {
                iteration < self.max_iterations && iteration % every == 0
            }
            _ => false,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let invalid = |msg: String| Err(DomainError::InvalidConfig(msg));

        if self.id.as_str().trim().is_empty() {
            return invalid("phase id cannot be empty".to_string());
        }
        if self.max_iterations == 0 {
            return invalid(format!("phase {}: max_iterations must be at least 1", self.id));
        }
        if !(SCORE_MIN..=SCORE_MAX).contains(&self.pass_threshold) {
            return invalid(format!(
                "phase {}: pass_threshold {} outside 0-10",
                self.id, self.pass_threshold
            ));
        }
        if self.checkpoint_every == Some(0) {
            return invalid(format!("phase {}: checkpoint_every cannot be 0", self.id));
        }
        if let PhaseMode::Racing(racing) = &self.mode {
            if racing.strategies.is_empty() {
                return invalid(format!("phase {}: racing needs at least one strategy", self.id));
            }
            // Seeding never passes, so a race needs at least one rescoring round.
            if self.max_iterations < 2 {
                return invalid(format!(
                    "phase {}: a racing phase needs max_iterations of at least 2",
                    self.id
                ));
            }
            if racing.hypotheses_per_strategy == 0 {
                return invalid(format!(
                    "phase {}: hypotheses_per_strategy must be at least 1",
                    self.id
                ));
            }
            racing
                .thresholds
                .validate()
                .map_err(|e| DomainError::InvalidConfig(format!("phase {}: {}", self.id, e)))?;
        }
        Ok(())
    }

    /// research → hypothesis (racing) → validation → output
    pub fn default_pipeline() -> Vec<PhaseSpec> {
        vec![
            PhaseSpec::refinement("research", "Research"),
            PhaseSpec::racing("hypothesis", "Hypothesis Generation", RacingSpec::default())
                .with_review(ReviewGate::Recommended),
            PhaseSpec::refinement("validation", "Validation").with_review(ReviewGate::Recommended),
            PhaseSpec::refinement("output", "Output").optional(),
        ]
    }
}

/// Validate a whole pipeline: non-empty, unique ids, each phase valid.
pub fn validate_pipeline(phases: &[PhaseSpec]) -> Result<(), DomainError> {
    if phases.is_empty() {
        return Err(DomainError::InvalidConfig(
            "pipeline needs at least one phase".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for phase in phases {
        phase.validate()?;
        if !seen.insert(phase.id.as_str()) {
            return Err(DomainError::InvalidConfig(format!(
                "duplicate phase id: {}",
                phase.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pipeline_is_valid() {
        let phases = PhaseSpec::default_pipeline();
        assert_eq!(phases.len(), 4);
        assert!(validate_pipeline(&phases).is_ok());
        assert!(phases[1].is_racing());
        assert!(!phases[3].required);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let phases = vec![
            PhaseSpec::refinement("research", "Research"),
            PhaseSpec::refinement("research", "Research again"),
        ];
        assert!(matches!(
            validate_pipeline(&phases),
            Err(DomainError::InvalidConfig(msg)) if msg.contains("duplicate")
        ));
    }

    #[test]
    fn test_empty_pipeline_rejected() {
        assert!(validate_pipeline(&[]).is_err());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let spec = PhaseSpec::refinement("research", "Research").with_max_iterations(0);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let spec = PhaseSpec::refinement("research", "Research").with_threshold(12.0);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_racing_without_strategies_rejected() {
        let racing = RacingSpec {
            strategies: vec![],
            ..RacingSpec::default()
        };
        let spec = PhaseSpec::racing("hypothesis", "Hypothesis", racing);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_single_round_race_rejected() {
        let spec = PhaseSpec::racing("hypothesis", "Hypotheses", RacingSpec::default())
            .with_max_iterations(1);
        assert!(spec.validate().is_err());
        assert!(spec.with_max_iterations(2).validate().is_ok());
    }

    #[test]
    fn test_checkpoint_after() {
        let spec = PhaseSpec::refinement("research", "Research")
            .with_max_iterations(5)
            .with_checkpoint_every(2);
        assert!(!spec.checkpoint_after(1));
        assert!(spec.checkpoint_after(2));
        assert!(!spec.checkpoint_after(3));
        assert!(spec.checkpoint_after(4));
        // never after the final iteration
        let spec = spec.with_max_iterations(4);
        assert!(!spec.checkpoint_after(4));
    }

    #[test]
    fn test_review_gate_from_str() {
        assert_eq!("required".parse::<ReviewGate>().ok(), Some(ReviewGate::Required));
        assert_eq!("review".parse::<ReviewGate>().ok(), Some(ReviewGate::Recommended));
        assert_eq!("none".parse::<ReviewGate>().ok(), Some(ReviewGate::None));
        assert!("maybe".parse::<ReviewGate>().is_err());
    }

    #[test]
    fn test_population_size() {
        assert_eq!(RacingSpec::default().population_size(), 6);
    }
}
