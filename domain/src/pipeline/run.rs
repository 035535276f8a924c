//! Discovery run: the aggregate root owned by the orchestrator.

use super::iteration::Candidate;
use super::phase::{Phase, PhaseStatus};
use super::spec::PhaseSpec;
use crate::core::error::DomainError;
use crate::core::ids::{PhaseId, RunId};
use crate::intervention::InterventionRecord;
use crate::recovery::RecoveryRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every phase reached a terminal state; `degraded` when any was skipped
    Completed { degraded: bool },
    /// Stopped after `phase` failed; accepted outputs are retained
    PartialExport { phase: PhaseId },
    /// Stopped after `phase` failed; a new run should use `query`
    QueryModified { phase: PhaseId, query: String },
    Cancelled,
}

impl RunOutcome {
    fn status(&self) -> RunStatus {
        match self {
            RunOutcome::Completed { .. } => RunStatus::Completed,
            RunOutcome::PartialExport { .. } | RunOutcome::QueryModified { .. } => {
                RunStatus::Failed
            }
            RunOutcome::Cancelled => RunStatus::Cancelled,
        }
    }
}

/// Phase ids grouped by status. Skipped phases are never folded into
/// completed ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub completed: Vec<PhaseId>,
    pub failed: Vec<PhaseId>,
    pub skipped: Vec<PhaseId>,
    /// Not yet finished, including a phase still running
    pub pending: Vec<PhaseId>,
}

/// One end-to-end execution of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryRun {
    id: RunId,
    query: String,
    phases: Vec<Phase>,
    current_phase: Option<usize>,
    status: RunStatus,
    outcome: Option<RunOutcome>,
    elapsed_ms: u64,
    interventions: Vec<InterventionRecord>,
    recoveries: Vec<RecoveryRecord>,
}

impl DiscoveryRun {
    pub fn new(id: RunId, query: impl Into<String>, specs: &[PhaseSpec]) -> Self {
        Self {
            id,
            query: query.into(),
            phases: specs.iter().map(Phase::new).collect(),
            current_phase: None,
            status: RunStatus::Idle,
            outcome: None,
            elapsed_ms: 0,
            interventions: Vec::new(),
            recoveries: Vec::new(),
        }
    }

    // ==================== Accessors ====================

    pub fn id(&self) -> &RunId {
        &self.id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn phase(&self, id: &PhaseId) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id() == id)
    }

    pub fn phase_index(&self, id: &PhaseId) -> Option<usize> {
        self.phases.iter().position(|p| p.id() == id)
    }

    pub fn phase_at(&self, index: usize) -> Option<&Phase> {
        self.phases.get(index)
    }

    pub fn phase_at_mut(&mut self, index: usize) -> Result<&mut Phase, DomainError> {
        self.phases
            .get_mut(index)
            .ok_or_else(|| DomainError::UnknownPhase(format!("#{}", index)))
    }

    pub fn current_phase_index(&self) -> Option<usize> {
        self.current_phase
    }

    pub fn current_phase(&self) -> Option<&Phase> {
        self.current_phase.and_then(|i| self.phases.get(i))
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn interventions(&self) -> &[InterventionRecord] {
        &self.interventions
    }

    pub fn recoveries(&self) -> &[RecoveryRecord] {
        &self.recoveries
    }

    // ==================== Transitions ====================

    pub fn start(&mut self) -> Result<(), DomainError> {
        if self.status != RunStatus::Idle {
            return Err(DomainError::InvalidRunTransition {
                from: self.status.to_string(),
                to: RunStatus::Running.to_string(),
            });
        }
        self.status = RunStatus::Running;
        Ok(())
    }

    /// Enter the terminal state matching `outcome`.
    pub fn finish(&mut self, outcome: RunOutcome) -> Result<(), DomainError> {
        let to = outcome.status();
        if self.status != RunStatus::Running {
            return Err(DomainError::InvalidRunTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        self.outcome = Some(outcome);
        Ok(())
    }

    pub fn set_current_phase(&mut self, index: usize) -> Result<(), DomainError> {
        if index >= self.phases.len() {
            return Err(DomainError::UnknownPhase(format!("#{}", index)));
        }
        self.current_phase = Some(index);
        Ok(())
    }

    pub fn set_elapsed_ms(&mut self, elapsed_ms: u64) {
        self.elapsed_ms = elapsed_ms;
    }

    pub fn record_intervention(&mut self, record: InterventionRecord) {
        self.interventions.push(record);
    }

    pub fn record_recovery(&mut self, record: RecoveryRecord) {
        self.recoveries.push(record);
    }

    // ==================== Derived views ====================

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for phase in &self.phases {
            let id = phase.id().clone();
            match phase.status() {
                PhaseStatus::Completed => summary.completed.push(id),
                PhaseStatus::Failed => summary.failed.push(id),
                PhaseStatus::Skipped => summary.skipped.push(id),
                PhaseStatus::Pending | PhaseStatus::Running => summary.pending.push(id),
            }
        }
        summary
    }

    pub fn has_skipped(&self) -> bool {
        self.phases
            .iter()
            .any(|p| p.status() == PhaseStatus::Skipped)
    }

    /// Accepted outputs of completed phases, in pipeline order.
    pub fn accepted_outputs(&self) -> Vec<(&PhaseId, &Candidate)> {
        self.phases
            .iter()
            .filter(|p| p.status() == PhaseStatus::Completed)
            .filter_map(|p| p.output().map(|o| (p.id(), o)))
            .collect()
    }

    /// Share of phases in a terminal state, 0-100.
    pub fn progress_percent(&self) -> u8 {
        if self.phases.is_empty() {
            return 0;
        }
        let done = self
            .phases
            .iter()
            .filter(|p| p.status().is_terminal())
            .count();
        (done * 100 / self.phases.len()) as u8
    }

    /// Short human-readable description of where the run is.
    pub fn current_step(&self) -> String {
        match self.status {
            RunStatus::Idle => "Waiting to start".to_string(),
            RunStatus::Completed => "Completed".to_string(),
            RunStatus::Failed => "Stopped after a phase failure".to_string(),
            RunStatus::Cancelled => "Cancelled".to_string(),
            RunStatus::Running => match self.current_phase() {
                Some(phase) if phase.status() == PhaseStatus::Running => {
                    match phase.race() {
                        Some(race) => format!(
                            "{}: racing round {}/{} ({} active)",
                            phase.name(),
                            race.iteration(),
                            phase.max_iterations(),
                            race.stats().active
                        ),
                        None => format!(
                            "{}: iteration {}/{}",
                            phase.name(),
                            phase.iterations().len(),
                            phase.max_iterations()
                        ),
                    }
                }
                Some(phase) => format!("{}: {}", phase.name(), phase.status()),
                None => "Starting".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::iteration::{Feedback, Iteration};
    use crate::pipeline::phase::DecisionOrigin;
    use serde_json::json;

    fn run() -> DiscoveryRun {
        DiscoveryRun::new(
            RunId::new("run-1"),
            "graphene anodes",
            &[
                PhaseSpec::refinement("research", "Research").with_max_iterations(1),
                PhaseSpec::refinement("validation", "Validation").with_max_iterations(1),
                PhaseSpec::refinement("output", "Output").with_max_iterations(1),
            ],
        )
    }

    fn finish_phase(run: &mut DiscoveryRun, index: usize, score: f64) {
        let phase = run.phase_at_mut(index).unwrap();
        phase.start().unwrap();
        let candidate = Candidate::new(json!("out"));
        phase
            .record_iteration(Iteration::judged(1, candidate.clone(), score, 7.0, Feedback::new(), 1))
            .unwrap();
        if score >= 7.0 {
            phase.complete(candidate).unwrap();
        } else {
            phase.fail().unwrap();
        }
    }

    #[test]
    fn test_lifecycle() {
        let mut run = run();
        assert_eq!(run.status(), RunStatus::Idle);
        assert!(run.finish(RunOutcome::Cancelled).is_err());
        run.start().unwrap();
        assert!(run.start().is_err());
        run.finish(RunOutcome::Completed { degraded: false }).unwrap();
        assert_eq!(run.status(), RunStatus::Completed);
        assert!(run.finish(RunOutcome::Cancelled).is_err());
    }

    #[test]
    fn test_partial_export_is_failed_status() {
        let mut run = run();
        run.start().unwrap();
        run.finish(RunOutcome::PartialExport {
            phase: PhaseId::new("validation"),
        })
        .unwrap();
        assert_eq!(run.status(), RunStatus::Failed);
    }

    #[test]
    fn test_summary_keeps_skipped_separate() {
        let mut run = run();
        run.start().unwrap();
        finish_phase(&mut run, 0, 8.0);
        finish_phase(&mut run, 1, 3.0);
        run.phase_at_mut(1).unwrap().skip(DecisionOrigin::Recovery).unwrap();

        let summary = run.summary();
        assert_eq!(summary.completed, vec![PhaseId::new("research")]);
        assert_eq!(summary.skipped, vec![PhaseId::new("validation")]);
        assert_eq!(summary.pending, vec![PhaseId::new("output")]);
        assert!(summary.failed.is_empty());
        assert!(run.has_skipped());
        assert_eq!(run.progress_percent(), 66);
        assert_eq!(run.accepted_outputs().len(), 1);
    }

    #[test]
    fn test_current_step() {
        let mut run = run();
        assert_eq!(run.current_step(), "Waiting to start");
        run.start().unwrap();
        run.set_current_phase(0).unwrap();
        run.phase_at_mut(0).unwrap().start().unwrap();
        assert_eq!(run.current_step(), "Research: iteration 0/1");
        assert!(run.set_current_phase(9).is_err());
    }
}
