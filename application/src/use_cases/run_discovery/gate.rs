//! Intervention gate: suspend the run until a checkpoint is resolved.
//!
//! The source of the resolution depends on `InterventionMode`:
//! - `Interactive` → wait for `RunControl::respond_to_intervention()`,
//!   auto-continuing when the checkpoint's timeout elapses
//! - `AutoContinue` → resolve immediately with a system-issued `continue`
//! - `Disabled` → checkpoints are never raised

use super::RunDiscoveryUseCase;
use super::context::RunContext;
use super::types::{CheckpointDecision, RunDiscoveryError};
use crate::ports::collaborator::CollaboratorPort;
use crate::ports::run_events::RunEvent;
use discovery_domain::{
    HypothesisId, Intervention, InterventionAction, InterventionMode, InterventionRecord,
    InterventionResponse, ResolutionSource,
};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{info, warn};

impl<C: CollaboratorPort + 'static> RunDiscoveryUseCase<C> {
    /// Escalation checkpoint after a failing, non-final iteration.
    pub(super) async fn iteration_checkpoint(
        &self,
        ctx: &mut RunContext,
        index: usize,
        iteration: u32,
        selectable: Vec<HypothesisId>,
    ) -> Result<CheckpointDecision, RunDiscoveryError> {
        let phase_id = ctx.phase(index)?.id().clone();
        let intervention = Intervention::after_iteration(
            phase_id,
            iteration,
            self.config.policy.intervention_timeout_ms,
            selectable,
        );
        let Some(response) = self.await_intervention(ctx, intervention).await? else {
            return Ok(CheckpointDecision::Cancelled);
        };
        Ok(match response.action {
            InterventionAction::Skip => CheckpointDecision::Skip,
            InterventionAction::Modify => CheckpointDecision::Steer(response.comment),
            _ => CheckpointDecision::Proceed,
        })
    }

    /// Raise `intervention` and wait for its resolution.
    ///
    /// An `escalate` response re-opens the checkpoint as a blocking approval
    /// and keeps waiting. Returns `None` when the run was cancelled while
    /// waiting.
    pub(super) async fn await_intervention(
        &self,
        ctx: &mut RunContext,
        mut intervention: Intervention,
    ) -> Result<Option<InterventionResponse>, RunDiscoveryError> {
        loop {
            if ctx.is_cancelled() {
                return Ok(None);
            }
            info!(
                intervention = %intervention.id,
                kind = %intervention.kind,
                phase = %intervention.phase_id,
                "Intervention raised"
            );
            ctx.pending_intervention = Some(intervention.clone());
            ctx.emit(RunEvent::InterventionRaised {
                run_id: ctx.run.id().clone(),
                intervention: intervention.clone(),
            });
            ctx.publish();

            let started = Instant::now();
            let resolved = match self.config.policy.intervention_mode {
                InterventionMode::Interactive => self.wait_for_response(ctx, &intervention).await,
                InterventionMode::AutoContinue | InterventionMode::Disabled => {
                    Some((InterventionResponse::proceed(), ResolutionSource::System))
                }
            };
            ctx.pending_intervention = None;

            let Some((response, source)) = resolved else {
                ctx.publish();
                return Ok(None);
            };
            let waited_ms = started.elapsed().as_millis() as u64;
            info!(
                intervention = %intervention.id,
                action = %response.action,
                %source,
                waited_ms,
                "Intervention resolved"
            );

            let record = InterventionRecord {
                intervention: intervention.clone(),
                response: response.clone(),
                source,
                waited_ms,
            };
            ctx.run.record_intervention(record.clone());
            ctx.emit(RunEvent::InterventionResolved {
                run_id: ctx.run.id().clone(),
                record,
            });
            ctx.publish();

            if response.action == InterventionAction::Escalate {
                intervention = intervention.escalate();
                continue;
            }
            return Ok(Some(response));
        }
    }

    /// Wait for the first of: a user response, the timeout, cancellation.
    async fn wait_for_response(
        &self,
        ctx: &RunContext,
        intervention: &Intervention,
    ) -> Option<(InterventionResponse, ResolutionSource)> {
        let (tx, mut rx) = oneshot::channel();
        ctx.board.open_intervention(intervention.clone(), tx);

        let timeout = intervention.timeout_ms.map(Duration::from_millis);
        let expiry = async move {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                // Later responses become no-ops.
                ctx.board.expire_intervention(&intervention.id);
                None
            }
            received = &mut rx => match received {
                Ok(response) => Some((response, ResolutionSource::User)),
                Err(_) => {
                    warn!(intervention = %intervention.id, "Intervention channel closed");
                    None
                }
            },
            _ = expiry => {
                if ctx.board.expire_intervention(&intervention.id) {
                    Some((InterventionResponse::proceed(), ResolutionSource::System))
                } else {
                    // A user response won the race against the timer.
                    rx.try_recv()
                        .ok()
                        .map(|response| (response, ResolutionSource::User))
                }
            }
        }
    }
}
