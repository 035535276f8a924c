//! Phase entity: one stage of a discovery run and its iteration history.

use super::iteration::{Candidate, Iteration};
use super::spec::PhaseSpec;
use crate::core::error::DomainError;
use crate::core::ids::{HypothesisId, PhaseId};
use crate::racing::race::Race;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    #[default]
    Pending,
    Running,
    /// Latest iteration passed
    Completed,
    /// Iteration budget exhausted without a pass
    Failed,
    /// Explicitly skipped by recovery or an intervention
    Skipped,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PhaseStatus::Pending => "pending",
            PhaseStatus::Running => "running",
            PhaseStatus::Completed => "completed",
            PhaseStatus::Failed => "failed",
            PhaseStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PhaseStatus::Completed | PhaseStatus::Failed | PhaseStatus::Skipped
        )
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an explicit skip or retry decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOrigin {
    Recovery,
    Intervention,
}

/// A finished attempt at a phase, archived when the phase is re-entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseAttempt {
    /// 1-based attempt number
    pub number: u32,
    pub status: PhaseStatus,
    pub iterations: Vec<Iteration>,
    pub race: Option<Race>,
    pub output: Option<Candidate>,
    /// Why the next attempt was started
    pub retried_by: DecisionOrigin,
}

/// One stage of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    id: PhaseId,
    name: String,
    status: PhaseStatus,
    pass_threshold: f64,
    max_iterations: u32,
    iterations: Vec<Iteration>,
    output: Option<Candidate>,
    passed: bool,
    score: Option<f64>,
    race: Option<Race>,
    carried_forward: Vec<HypothesisId>,
    skipped_by: Option<DecisionOrigin>,
    attempts: Vec<PhaseAttempt>,
}

impl Phase {
    pub fn new(spec: &PhaseSpec) -> Self {
        Self {
            id: spec.id.clone(),
            name: spec.name.clone(),
            status: PhaseStatus::Pending,
            pass_threshold: spec.pass_threshold,
            max_iterations: spec.max_iterations,
            iterations: Vec::new(),
            output: None,
            passed: false,
            score: None,
            race: None,
            carried_forward: Vec::new(),
            skipped_by: None,
            attempts: Vec::new(),
        }
    }

    // ==================== Accessors ====================

    pub fn id(&self) -> &PhaseId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> PhaseStatus {
        self.status
    }

    pub fn pass_threshold(&self) -> f64 {
        self.pass_threshold
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn iterations(&self) -> &[Iteration] {
        &self.iterations
    }

    pub fn last_iteration(&self) -> Option<&Iteration> {
        self.iterations.last()
    }

    /// Index the next recorded iteration must carry.
    pub fn next_iteration_index(&self) -> u32 {
        self.iterations.len() as u32 + 1
    }

    pub fn output(&self) -> Option<&Candidate> {
        self.output.as_ref()
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    /// Score of the most recent iteration.
    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn best_score(&self) -> Option<f64> {
        self.iterations.iter().map(|it| it.score).reduce(f64::max)
    }

    pub fn race(&self) -> Option<&Race> {
        self.race.as_ref()
    }

    pub fn race_mut(&mut self) -> Option<&mut Race> {
        self.race.as_mut()
    }

    pub fn carried_forward(&self) -> &[HypothesisId] {
        &self.carried_forward
    }

    pub fn skipped_by(&self) -> Option<DecisionOrigin> {
        self.skipped_by
    }

    pub fn attempts(&self) -> &[PhaseAttempt] {
        &self.attempts
    }

    /// Number of times this phase has been re-entered.
    pub fn retries_used(&self) -> u32 {
        self.attempts.len() as u32
    }

    pub fn budget_exhausted(&self) -> bool {
        self.iterations.len() as u32 >= self.max_iterations
    }

    // ==================== Transitions ====================

    fn transition_error(&self, to: PhaseStatus) -> DomainError {
        DomainError::InvalidPhaseTransition {
            phase: self.id.to_string(),
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    pub fn start(&mut self) -> Result<(), DomainError> {
        if self.status != PhaseStatus::Pending {
            return Err(self.transition_error(PhaseStatus::Running));
        }
        self.status = PhaseStatus::Running;
        Ok(())
    }

    /// Append an iteration. Indices must be gap-free and within budget.
    pub fn record_iteration(&mut self, iteration: Iteration) -> Result<(), DomainError> {
        if self.status != PhaseStatus::Running {
            return Err(self.transition_error(PhaseStatus::Running));
        }
        if self.budget_exhausted() {
            return Err(DomainError::IterationBudgetExhausted {
                phase: self.id.to_string(),
                max: self.max_iterations,
            });
        }
        let expected = self.next_iteration_index();
        if iteration.index != expected {
            return Err(DomainError::IterationOutOfOrder {
                phase: self.id.to_string(),
                expected,
                actual: iteration.index,
            });
        }
        self.score = Some(iteration.score);
        self.iterations.push(iteration);
        Ok(())
    }

    /// Accept `output`. Requires the latest iteration to have passed.
    pub fn complete(&mut self, output: Candidate) -> Result<(), DomainError> {
        let last_passed = self.last_iteration().is_some_and(|it| it.passed);
        if self.status != PhaseStatus::Running || !last_passed {
            return Err(self.transition_error(PhaseStatus::Completed));
        }
        self.status = PhaseStatus::Completed;
        self.passed = true;
        self.output = Some(output);
        Ok(())
    }

    /// Mark the phase failed.
    ///
    /// Allowed once the iteration budget is spent without a pass, or when a
    /// race ran out of active hypotheses before the budget was spent.
    pub fn fail(&mut self) -> Result<(), DomainError> {
        let last_passed = self.last_iteration().is_some_and(|it| it.passed);
        let race_resolved = self.race.as_ref().is_some_and(|r| r.is_resolved());
        if self.status != PhaseStatus::Running
            || last_passed
            || !(self.budget_exhausted() || race_resolved)
        {
            return Err(self.transition_error(PhaseStatus::Failed));
        }
        self.status = PhaseStatus::Failed;
        self.passed = false;
        Ok(())
    }

    /// Explicitly skip a running or failed phase.
    pub fn skip(&mut self, origin: DecisionOrigin) -> Result<(), DomainError> {
        if !matches!(self.status, PhaseStatus::Running | PhaseStatus::Failed) {
            return Err(self.transition_error(PhaseStatus::Skipped));
        }
        self.status = PhaseStatus::Skipped;
        self.passed = false;
        self.skipped_by = Some(origin);
        Ok(())
    }

    /// Re-enter a completed or failed phase with a fresh iteration budget.
    ///
    /// The finished attempt is archived; returns the new attempt number.
    pub fn restart(&mut self, origin: DecisionOrigin) -> Result<u32, DomainError> {
        if !matches!(self.status, PhaseStatus::Completed | PhaseStatus::Failed) {
            return Err(self.transition_error(PhaseStatus::Running));
        }
        let number = self.attempts.len() as u32 + 1;
        self.attempts.push(PhaseAttempt {
            number,
            status: self.status,
            iterations: std::mem::take(&mut self.iterations),
            race: self.race.take(),
            output: self.output.take(),
            retried_by: origin,
        });
        self.status = PhaseStatus::Running;
        self.passed = false;
        self.score = None;
        self.carried_forward.clear();
        Ok(number + 1)
    }

    pub fn attach_race(&mut self, race: Race) {
        self.race = Some(race);
    }

    /// Replace a completed racing phase's output with a curated selection.
    pub fn carry_forward(
        &mut self,
        ids: Vec<HypothesisId>,
        output: Candidate,
    ) -> Result<(), DomainError> {
        if self.status != PhaseStatus::Completed {
            return Err(self.transition_error(PhaseStatus::Completed));
        }
        self.carried_forward = ids;
        self.output = Some(output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::iteration::Feedback;
    use serde_json::json;

    fn spec() -> PhaseSpec {
        PhaseSpec::refinement("research", "Research")
            .with_threshold(7.0)
            .with_max_iterations(3)
    }

    fn judged(index: u32, score: f64) -> Iteration {
        Iteration::judged(
            index,
            Candidate::new(json!(format!("draft {}", index))),
            score,
            7.0,
            Feedback::new(),
            1,
        )
    }

    #[test]
    fn test_new_phase_is_pending() {
        let phase = Phase::new(&spec());
        assert_eq!(phase.status(), PhaseStatus::Pending);
        assert_eq!(phase.next_iteration_index(), 1);
        assert!(phase.iterations().is_empty());
    }

    #[test]
    fn test_record_requires_running() {
        let mut phase = Phase::new(&spec());
        assert!(phase.record_iteration(judged(1, 5.0)).is_err());
    }

    #[test]
    fn test_indices_must_be_gap_free() {
        let mut phase = Phase::new(&spec());
        phase.start().unwrap();
        phase.record_iteration(judged(1, 5.0)).unwrap();
        let err = phase.record_iteration(judged(3, 5.0)).unwrap_err();
        assert!(matches!(
            err,
            DomainError::IterationOutOfOrder {
                expected: 2,
                actual: 3,
                ..
            }
        ));
        assert_eq!(phase.iterations().len(), 1);
    }

    #[test]
    fn test_budget_is_enforced() {
        let mut phase = Phase::new(&spec());
        phase.start().unwrap();
        for i in 1..=3 {
            phase.record_iteration(judged(i, 5.0)).unwrap();
        }
        assert!(matches!(
            phase.record_iteration(judged(4, 9.0)),
            Err(DomainError::IterationBudgetExhausted { max: 3, .. })
        ));
    }

    #[test]
    fn test_complete_requires_passing_last_iteration() {
        let mut phase = Phase::new(&spec());
        phase.start().unwrap();
        phase.record_iteration(judged(1, 5.0)).unwrap();
        assert!(phase.complete(Candidate::new(json!("x"))).is_err());

        phase.record_iteration(judged(2, 7.5)).unwrap();
        phase.complete(Candidate::new(json!("draft 2"))).unwrap();
        assert_eq!(phase.status(), PhaseStatus::Completed);
        assert!(phase.passed());
        assert_eq!(phase.score(), Some(7.5));
    }

    #[test]
    fn test_fail_requires_exhausted_budget() {
        let mut phase = Phase::new(&spec());
        phase.start().unwrap();
        phase.record_iteration(judged(1, 4.0)).unwrap();
        assert!(phase.fail().is_err());
        phase.record_iteration(judged(2, 5.0)).unwrap();
        phase.record_iteration(judged(3, 6.0)).unwrap();
        phase.fail().unwrap();
        assert_eq!(phase.status(), PhaseStatus::Failed);
        assert_eq!(phase.best_score(), Some(6.0));
    }

    #[test]
    fn test_skip_is_distinguishable_from_completed() {
        let mut phase = Phase::new(&spec());
        phase.start().unwrap();
        for i in 1..=3 {
            phase.record_iteration(judged(i, 4.0)).unwrap();
        }
        phase.fail().unwrap();
        phase.skip(DecisionOrigin::Recovery).unwrap();
        assert_eq!(phase.status(), PhaseStatus::Skipped);
        assert!(!phase.passed());
        assert_eq!(phase.skipped_by(), Some(DecisionOrigin::Recovery));
    }

    #[test]
    fn test_restart_archives_attempt() {
        let mut phase = Phase::new(&spec());
        phase.start().unwrap();
        for i in 1..=3 {
            phase.record_iteration(judged(i, 4.0)).unwrap();
        }
        phase.fail().unwrap();

        let attempt = phase.restart(DecisionOrigin::Recovery).unwrap();
        assert_eq!(attempt, 2);
        assert_eq!(phase.status(), PhaseStatus::Running);
        assert!(phase.iterations().is_empty());
        assert_eq!(phase.next_iteration_index(), 1);
        assert_eq!(phase.retries_used(), 1);
        assert_eq!(phase.attempts()[0].iterations.len(), 3);
        assert_eq!(phase.attempts()[0].status, PhaseStatus::Failed);
    }

    #[test]
    fn test_restart_rejected_while_running() {
        let mut phase = Phase::new(&spec());
        phase.start().unwrap();
        assert!(phase.restart(DecisionOrigin::Intervention).is_err());
    }
}
