//! Read-only run snapshot published after every state change.

use crate::core::ids::PhaseId;
use crate::intervention::Intervention;
use crate::pipeline::phase::PhaseStatus;
use crate::pipeline::run::DiscoveryRun;
use crate::recovery::FailureReport;
use serde::{Deserialize, Serialize};

/// Everything a display or export layer needs about one run.
///
/// Carries the full run (iteration history, archived attempts, race
/// populations including eliminated entries) so nothing has to be
/// reconstructed later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run: DiscoveryRun,
    pub pending_intervention: Option<Intervention>,
    pub pending_failure: Option<FailureReport>,
}

/// Compact per-phase view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub id: PhaseId,
    pub name: String,
    pub status: PhaseStatus,
    pub score: Option<f64>,
    pub iterations: usize,
    pub max_iterations: u32,
}

impl RunSnapshot {
    pub fn new(run: DiscoveryRun) -> Self {
        Self {
            run,
            pending_intervention: None,
            pending_failure: None,
        }
    }

    pub fn progress_percent(&self) -> u8 {
        self.run.progress_percent()
    }

    pub fn current_step(&self) -> String {
        if let Some(iv) = &self.pending_intervention {
            return format!("Waiting for {} on {}", iv.kind, iv.phase_id);
        }
        if let Some(report) = &self.pending_failure {
            return format!("Waiting for a recovery decision on {}", report.phase_id);
        }
        self.run.current_step()
    }

    pub fn phases(&self) -> Vec<PhaseSummary> {
        self.run
            .phases()
            .iter()
            .map(|p| PhaseSummary {
                id: p.id().clone(),
                name: p.name().to_string(),
                status: p.status(),
                score: p.score(),
                iterations: p.iterations().len(),
                max_iterations: p.max_iterations(),
            })
            .collect()
    }

    pub fn is_waiting(&self) -> bool {
        self.pending_intervention.is_some() || self.pending_failure.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::RunId;
    use crate::intervention::InterventionKind;
    use crate::pipeline::spec::PhaseSpec;

    #[test]
    fn test_pending_intervention_drives_current_step() {
        let run = DiscoveryRun::new(RunId::new("run-1"), "q", &PhaseSpec::default_pipeline());
        let mut snapshot = RunSnapshot::new(run);
        assert!(!snapshot.is_waiting());
        assert_eq!(snapshot.phases().len(), 4);

        snapshot.pending_intervention = Some(Intervention::after_phase(
            PhaseId::new("hypothesis"),
            InterventionKind::ReviewRecommended,
            None,
            vec![],
        ));
        assert!(snapshot.is_waiting());
        assert_eq!(
            snapshot.current_step(),
            "Waiting for review_recommended on hypothesis"
        );
    }

    #[test]
    fn test_snapshot_serializes() {
        let run = DiscoveryRun::new(RunId::new("run-1"), "q", &PhaseSpec::default_pipeline());
        let json = serde_json::to_value(RunSnapshot::new(run)).unwrap();
        assert_eq!(json["run"]["status"], "idle");
        assert_eq!(json["run"]["phases"].as_array().unwrap().len(), 4);
    }
}
