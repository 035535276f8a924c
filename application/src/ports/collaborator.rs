//! Collaborator port
//!
//! Defines the interface to the external generator/judge. The core never
//! looks inside the candidates it receives; it stores them, forwards them
//! and acts on the scores.

use async_trait::async_trait;
use discovery_domain::{Candidate, Feedback, HypothesisId, PhaseId, RunId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during collaborator calls
///
/// None of these escape the refinement loop: a failed generate or score call
/// becomes a non-passing iteration, a failed rescore carries the previous
/// score forward.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Scoring failed: {0}")]
    ScoringFailed(String),

    #[error("Nothing left to replay for {0}")]
    Exhausted(String),

    #[error("Timeout")]
    Timeout,

    #[error("Other error: {0}")]
    Other(String),
}

/// What the generator is working on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationContext {
    pub run_id: RunId,
    pub query: String,
    pub phase_id: PhaseId,
    pub phase_name: String,
    /// 1-based iteration within the current attempt
    pub iteration: u32,
    /// 1-based attempt; greater than 1 after a retry
    pub attempt: u32,
    /// Outputs accepted by earlier phases, in pipeline order
    pub accepted: Vec<(PhaseId, Candidate)>,
    /// Free-text guidance from a reviewer
    pub guidance: Option<String>,
}

/// What the judge scores against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricContext {
    pub query: String,
    pub phase_id: PhaseId,
    pub phase_name: String,
    pub pass_threshold: f64,
    pub iteration: u32,
}

/// Judge verdict for one candidate.
///
/// `passed` is advisory: the pipeline decides pass/fail against its own
/// phase threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub value: f64,
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub feedback: Feedback,
}

impl Verdict {
    pub fn new(value: f64, feedback: Feedback) -> Self {
        Self {
            value,
            passed: false,
            feedback,
        }
    }
}

/// A hypothesis as proposed by one strategy, with its seed score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedHypothesis {
    pub payload: Candidate,
    pub initial_score: f64,
}

/// A hypothesis sent back for rescoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisProbe {
    pub id: HypothesisId,
    pub strategy: String,
    pub payload: Candidate,
    pub score: f64,
    pub history: Vec<f64>,
    /// Shared iteration being scored (2 or later)
    pub iteration: u32,
}

/// Generator/judge collaborator
///
/// Implementations (adapters) live in the infrastructure layer or in tests.
#[async_trait]
pub trait CollaboratorPort: Send + Sync {
    /// Produce a candidate, informed by the previous iteration's feedback.
    async fn generate(
        &self,
        context: &GenerationContext,
        prior_feedback: Option<&Feedback>,
    ) -> Result<Candidate, CollaboratorError>;

    /// Score a candidate on the 0-10 scale.
    async fn score(
        &self,
        candidate: &Candidate,
        rubric: &RubricContext,
    ) -> Result<Verdict, CollaboratorError>;

    /// Propose `count` seeded hypotheses for one strategy.
    async fn propose_hypotheses(
        &self,
        strategy: &str,
        context: &GenerationContext,
        count: u32,
    ) -> Result<Vec<ProposedHypothesis>, CollaboratorError>;

    /// Updated score for a still-active hypothesis.
    async fn rescore_hypothesis(
        &self,
        probe: &HypothesisProbe,
        context: &GenerationContext,
    ) -> Result<f64, CollaboratorError>;
}
