//! Failure recovery: what happens when a phase exhausts its budget.
//!
//! A failed phase produces a [`FailureReport`] with ranked
//! [`Recommendation`]s and the run's partial results. The run then waits for
//! exactly one [`FailureResolution`], chosen by a human or by the
//! configured [`RecoveryMode`](crate::pipeline::policy::RecoveryMode).

use crate::core::ids::PhaseId;
use crate::intervention::ResolutionSource;
use crate::pipeline::phase::Phase;
use crate::pipeline::run::RunSummary;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The decision taken for a failed phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum FailureResolution {
    /// Re-enter the phase with a fresh iteration budget
    RetryPhase,
    /// End this run; a new one should start from the edited query
    ModifyQuery { query: String },
    /// Mark the phase skipped and keep going
    ContinuePartial,
    /// Stop here, keeping every accepted output
    ExportPartial,
}

impl FailureResolution {
    pub fn option(&self) -> RecoveryOption {
        match self {
            FailureResolution::RetryPhase => RecoveryOption::RetryPhase,
            FailureResolution::ModifyQuery { .. } => RecoveryOption::ModifyQuery,
            FailureResolution::ContinuePartial => RecoveryOption::ContinuePartial,
            FailureResolution::ExportPartial => RecoveryOption::ExportPartial,
        }
    }
}

impl fmt::Display for FailureResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.option())
    }
}

/// A resolution without its payload, used for recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOption {
    RetryPhase,
    ModifyQuery,
    ContinuePartial,
    ExportPartial,
}

impl fmt::Display for RecoveryOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryOption::RetryPhase => write!(f, "retry_phase"),
            RecoveryOption::ModifyQuery => write!(f, "modify_query"),
            RecoveryOption::ContinuePartial => write!(f, "continue_partial"),
            RecoveryOption::ExportPartial => write!(f, "export_partial"),
        }
    }
}

/// Sorted with `High` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub option: RecoveryOption,
    pub priority: Priority,
    pub rationale: String,
}

/// How close a near miss has to be for a retry to rank high.
const NEAR_MISS_MARGIN: f64 = 1.5;

/// Rank the recovery options for a failed phase.
///
/// Pure function of its inputs; ties keep the order
/// retry, modify, continue, export.
pub fn recommend(
    best_score: f64,
    threshold: f64,
    phase_required: bool,
    retries_remaining: u32,
    any_completed: bool,
) -> Vec<Recommendation> {
    let mut recs = Vec::with_capacity(4);

    if retries_remaining > 0 {
        let near_miss = threshold - best_score <= NEAR_MISS_MARGIN;
        recs.push(Recommendation {
            option: RecoveryOption::RetryPhase,
            priority: if near_miss { Priority::High } else { Priority::Medium },
            rationale: if near_miss {
                format!("best score {:.1} was close to the {:.1} threshold", best_score, threshold)
            } else {
                format!("{} retr{} left", retries_remaining, if retries_remaining == 1 { "y" } else { "ies" })
            },
        });
    }

    let far_off = best_score < threshold / 2.0;
    recs.push(Recommendation {
        option: RecoveryOption::ModifyQuery,
        priority: if far_off { Priority::High } else { Priority::Low },
        rationale: if far_off {
            "scores stayed far below the threshold; the query may need rework".to_string()
        } else {
            "rephrasing the query could open a different direction".to_string()
        },
    });

    recs.push(Recommendation {
        option: RecoveryOption::ContinuePartial,
        priority: if phase_required { Priority::Low } else { Priority::Medium },
        rationale: if phase_required {
            "later phases depend on this one".to_string()
        } else {
            "this phase is optional".to_string()
        },
    });

    recs.push(Recommendation {
        option: RecoveryOption::ExportPartial,
        priority: if any_completed { Priority::Medium } else { Priority::Low },
        rationale: if any_completed {
            "completed phases already hold usable results".to_string()
        } else {
            "nothing has been completed yet".to_string()
        },
    });

    recs.sort_by_key(|r| r.priority);
    recs
}

/// Everything a decision maker needs about a failed phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub phase_id: PhaseId,
    pub phase_name: String,
    pub best_score: f64,
    pub threshold: f64,
    pub iterations: u32,
    pub retries_used: u32,
    pub retries_remaining: u32,
    pub recommendations: Vec<Recommendation>,
    pub partial: RunSummary,
}

impl FailureReport {
    pub fn for_phase(phase: &Phase, required: bool, max_retries: u32, partial: RunSummary) -> Self {
        let best_score = phase.best_score().unwrap_or(0.0);
        let retries_used = phase.retries_used();
        let retries_remaining = max_retries.saturating_sub(retries_used);
        let recommendations = recommend(
            best_score,
            phase.pass_threshold(),
            required,
            retries_remaining,
            !partial.completed.is_empty(),
        );
        Self {
            phase_id: phase.id().clone(),
            phase_name: phase.name().to_string(),
            best_score,
            threshold: phase.pass_threshold(),
            iterations: phase.iterations().len() as u32,
            retries_used,
            retries_remaining,
            recommendations,
            partial,
        }
    }

    pub fn top_recommendation(&self) -> Option<&Recommendation> {
        self.recommendations.first()
    }
}

/// Audit entry for a resolved failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryRecord {
    pub report: FailureReport,
    pub resolution: FailureResolution,
    pub source: ResolutionSource,
    pub waited_ms: u64,
}
