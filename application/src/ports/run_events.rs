//! Run event port
//!
//! Every state transition of a run emits exactly one [`RunEvent`] through a
//! [`RunEventNotifier`]. This is the push layer on top of the pull snapshot
//! published by `RunControl::snapshot()`.
//!
//! This is separate from `tracing`-based diagnostics: tracing carries
//! human-readable operation logs, these events are the machine-readable
//! record of what the run did.
//!
//! # Built-in Implementations
//!
//! - [`NoRunEvents`] - discards everything
//! - [`ChannelRunEvents`] - forwards into a tokio channel for live updates
//! - [`CompositeRunEvents`] - fans out to several notifiers
//!
//! A JSONL file logger lives in the infrastructure layer.

use discovery_domain::{
    DecisionOrigin, FailureReport, HypothesisId, Intervention, InterventionRecord, Iteration,
    PhaseId, RaceStats, RecoveryRecord, RunId, RunOutcome, RunStatus,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One state transition of a discovery run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: RunId,
        query: String,
        phases: Vec<PhaseId>,
    },
    PhaseStarted {
        run_id: RunId,
        phase_id: PhaseId,
        attempt: u32,
    },
    IterationRecorded {
        run_id: RunId,
        phase_id: PhaseId,
        iteration: Iteration,
    },
    RaceSeeded {
        run_id: RunId,
        phase_id: PhaseId,
        stats: RaceStats,
    },
    RaceRound {
        run_id: RunId,
        phase_id: PhaseId,
        stats: RaceStats,
        eliminated: Vec<HypothesisId>,
        breakthroughs: Vec<HypothesisId>,
    },
    PhaseCompleted {
        run_id: RunId,
        phase_id: PhaseId,
        score: Option<f64>,
    },
    PhaseFailed {
        run_id: RunId,
        phase_id: PhaseId,
        best_score: Option<f64>,
    },
    PhaseSkipped {
        run_id: RunId,
        phase_id: PhaseId,
        origin: DecisionOrigin,
    },
    PhaseRetried {
        run_id: RunId,
        phase_id: PhaseId,
        attempt: u32,
        origin: DecisionOrigin,
    },
    InterventionRaised {
        run_id: RunId,
        intervention: Intervention,
    },
    InterventionResolved {
        run_id: RunId,
        record: InterventionRecord,
    },
    FailureReported {
        run_id: RunId,
        report: FailureReport,
    },
    FailureResolved {
        run_id: RunId,
        record: RecoveryRecord,
    },
    RunFinished {
        run_id: RunId,
        status: RunStatus,
        outcome: Option<RunOutcome>,
        elapsed_ms: u64,
    },
}

impl RunEvent {
    /// Event type identifier, matching the serialized `type` tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            RunEvent::RunStarted { .. } => "run_started",
            RunEvent::PhaseStarted { .. } => "phase_started",
            RunEvent::IterationRecorded { .. } => "iteration_recorded",
            RunEvent::RaceSeeded { .. } => "race_seeded",
            RunEvent::RaceRound { .. } => "race_round",
            RunEvent::PhaseCompleted { .. } => "phase_completed",
            RunEvent::PhaseFailed { .. } => "phase_failed",
            RunEvent::PhaseSkipped { .. } => "phase_skipped",
            RunEvent::PhaseRetried { .. } => "phase_retried",
            RunEvent::InterventionRaised { .. } => "intervention_raised",
            RunEvent::InterventionResolved { .. } => "intervention_resolved",
            RunEvent::FailureReported { .. } => "failure_reported",
            RunEvent::FailureResolved { .. } => "failure_resolved",
            RunEvent::RunFinished { .. } => "run_finished",
        }
    }

    pub fn run_id(&self) -> &RunId {
        match self {
            RunEvent::RunStarted { run_id, .. }
            | RunEvent::PhaseStarted { run_id, .. }
            | RunEvent::IterationRecorded { run_id, .. }
            | RunEvent::RaceSeeded { run_id, .. }
            | RunEvent::RaceRound { run_id, .. }
            | RunEvent::PhaseCompleted { run_id, .. }
            | RunEvent::PhaseFailed { run_id, .. }
            | RunEvent::PhaseSkipped { run_id, .. }
            | RunEvent::PhaseRetried { run_id, .. }
            | RunEvent::InterventionRaised { run_id, .. }
            | RunEvent::InterventionResolved { run_id, .. }
            | RunEvent::FailureReported { run_id, .. }
            | RunEvent::FailureResolved { run_id, .. }
            | RunEvent::RunFinished { run_id, .. } => run_id,
        }
    }
}

/// Receiver of run events.
///
/// `notify` is synchronous and non-fallible so a slow or broken sink can
/// never stall the orchestrator; implementations drop what they cannot
/// deliver.
pub trait RunEventNotifier: Send + Sync {
    fn notify(&self, event: &RunEvent);
}

/// No-op notifier for tests and when events are not needed
pub struct NoRunEvents;

impl RunEventNotifier for NoRunEvents {
    fn notify(&self, _event: &RunEvent) {}
}

/// Forwards every event into an unbounded tokio channel.
pub struct ChannelRunEvents {
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelRunEvents {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RunEventNotifier for ChannelRunEvents {
    fn notify(&self, event: &RunEvent) {
        // Receiver gone: nobody is listening any more.
        let _ = self.tx.send(event.clone());
    }
}

/// A notifier that delegates to multiple inner notifiers.
pub struct CompositeRunEvents {
    delegates: Vec<Arc<dyn RunEventNotifier>>,
}

impl CompositeRunEvents {
    pub fn new(delegates: Vec<Arc<dyn RunEventNotifier>>) -> Self {
        Self { delegates }
    }
}

impl RunEventNotifier for CompositeRunEvents {
    fn notify(&self, event: &RunEvent) {
        for d in &self.delegates {
            d.notify(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> RunEvent {
        RunEvent::PhaseStarted {
            run_id: RunId::new("run-1"),
            phase_id: PhaseId::new("research"),
            attempt: 1,
        }
    }

    #[test]
    fn test_event_type_matches_serde_tag() {
        let event = started();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.event_type());
        assert_eq!(json["phase_id"], "research");
    }

    #[tokio::test]
    async fn test_channel_forwards_events() {
        let (notifier, mut rx) = ChannelRunEvents::new();
        notifier.notify(&started());
        assert_eq!(rx.recv().await, Some(started()));
    }

    #[test]
    fn test_channel_ignores_closed_receiver() {
        let (notifier, rx) = ChannelRunEvents::new();
        drop(rx);
        notifier.notify(&started());
    }

    #[tokio::test]
    async fn test_composite_fans_out() {
        let (a, mut rx_a) = ChannelRunEvents::new();
        let (b, mut rx_b) = ChannelRunEvents::new();
        let composite = CompositeRunEvents::new(vec![Arc::new(a), Arc::new(b), Arc::new(NoRunEvents)]);
        composite.notify(&started());
        assert_eq!(rx_a.recv().await.map(|e| e.event_type()), Some("phase_started"));
        assert_eq!(rx_b.recv().await.map(|e| e.event_type()), Some("phase_started"));
    }
}
