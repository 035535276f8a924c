//! Per-run state threaded through every orchestration step.

use crate::ports::collaborator::{GenerationContext, RubricContext};
use crate::ports::run_events::{RunEvent, RunEventNotifier};
use crate::use_cases::control::ControlBoard;
use discovery_domain::{
    DiscoveryRun, DomainError, FailureReport, Intervention, Phase, RunSnapshot,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Everything one run owns. Created by `start()`, moved into the run task.
pub(super) struct RunContext {
    pub(super) run: DiscoveryRun,
    pub(super) pending_intervention: Option<Intervention>,
    pub(super) pending_failure: Option<FailureReport>,
    pub(super) cancel: CancellationToken,
    pub(super) board: Arc<ControlBoard>,
    snapshots: watch::Sender<RunSnapshot>,
    notifier: Arc<dyn RunEventNotifier>,
    started: Instant,
}

impl RunContext {
    pub(super) fn new(
        run: DiscoveryRun,
        snapshots: watch::Sender<RunSnapshot>,
        notifier: Arc<dyn RunEventNotifier>,
        cancel: CancellationToken,
        board: Arc<ControlBoard>,
    ) -> Self {
        Self {
            run,
            pending_intervention: None,
            pending_failure: None,
            cancel,
            board,
            snapshots,
            notifier,
            started: Instant::now(),
        }
    }

    pub(super) fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub(super) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(super) fn emit(&self, event: RunEvent) {
        self.notifier.notify(&event);
    }

    /// Refresh elapsed time and publish a snapshot to every subscriber.
    pub(super) fn publish(&mut self) {
        self.run.set_elapsed_ms(self.elapsed_ms());
        self.snapshots.send_replace(RunSnapshot {
            run: self.run.clone(),
            pending_intervention: self.pending_intervention.clone(),
            pending_failure: self.pending_failure.clone(),
        });
    }

    pub(super) fn phase(&self, index: usize) -> Result<&Phase, DomainError> {
        self.run
            .phase_at(index)
            .ok_or_else(|| DomainError::UnknownPhase(format!("#{}", index)))
    }

    pub(super) fn phase_mut(&mut self, index: usize) -> Result<&mut Phase, DomainError> {
        self.run.phase_at_mut(index)
    }

    pub(super) fn generation_context(
        &self,
        index: usize,
        iteration: u32,
        guidance: Option<&str>,
    ) -> Result<GenerationContext, DomainError> {
        let phase = self.phase(index)?;
        Ok(GenerationContext {
            run_id: self.run.id().clone(),
            query: self.run.query().to_string(),
            phase_id: phase.id().clone(),
            phase_name: phase.name().to_string(),
            iteration,
            attempt: phase.retries_used() + 1,
            accepted: self
                .run
                .accepted_outputs()
                .into_iter()
                .map(|(id, candidate)| (id.clone(), candidate.clone()))
                .collect(),
            guidance: guidance.map(str::to_string),
        })
    }

    pub(super) fn rubric_context(&self, index: usize, iteration: u32) -> Result<RubricContext, DomainError> {
        let phase = self.phase(index)?;
        Ok(RubricContext {
            query: self.run.query().to_string(),
            phase_id: phase.id().clone(),
            phase_name: phase.name().to_string(),
            pass_threshold: phase.pass_threshold(),
            iteration,
        })
    }
}
