//! Domain error types

use thiserror::Error;

/// Domain-level errors
///
/// Raised when a state transition would break one of the pipeline
/// invariants. The orchestrator treats these as programming errors at the
/// boundary; run state is left unchanged when one is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Score {0} is outside the allowed range 0-10")]
    ScoreOutOfRange(f64),

    #[error("Phase {phase}: expected iteration {expected}, got {actual}")]
    IterationOutOfOrder {
        phase: String,
        expected: u32,
        actual: u32,
    },

    #[error("Phase {phase}: iteration budget of {max} exhausted")]
    IterationBudgetExhausted { phase: String, max: u32 },

    #[error("Phase {phase}: cannot move from {from} to {to}")]
    InvalidPhaseTransition {
        phase: String,
        from: String,
        to: String,
    },

    #[error("Run cannot move from {from} to {to}")]
    InvalidRunTransition { from: String, to: String },

    #[error("Unknown phase: {0}")]
    UnknownPhase(String),

    #[error("Unknown hypothesis: {0}")]
    UnknownHypothesis(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_out_of_range_display() {
        let error = DomainError::ScoreOutOfRange(11.5);
        assert_eq!(error.to_string(), "Score 11.5 is outside the allowed range 0-10");
    }

    #[test]
    fn test_iteration_out_of_order_display() {
        let error = DomainError::IterationOutOfOrder {
            phase: "research".to_string(),
            expected: 2,
            actual: 4,
        };
        assert_eq!(
            error.to_string(),
            "Phase research: expected iteration 2, got 4"
        );
    }
}
