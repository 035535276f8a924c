//! Failure recovery coordinator.

use super::RunDiscoveryUseCase;
use super::context::RunContext;
use super::types::RunDiscoveryError;
use crate::ports::collaborator::CollaboratorPort;
use crate::ports::run_events::RunEvent;
use discovery_domain::{FailureReport, FailureResolution, RecoveryRecord, ResolutionSource};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{info, warn};

impl<C: CollaboratorPort + 'static> RunDiscoveryUseCase<C> {
    /// Report a failed phase and wait for a resolution.
    ///
    /// Non-interactive recovery modes resolve immediately. Returns `None`
    /// when the run was cancelled while waiting.
    pub(super) async fn await_recovery(
        &self,
        ctx: &mut RunContext,
        index: usize,
    ) -> Result<Option<FailureResolution>, RunDiscoveryError> {
        if ctx.is_cancelled() {
            return Ok(None);
        }

        let policy = &self.config.policy;
        let required = self.config.phases.get(index).is_none_or(|spec| spec.required);
        let summary = ctx.run.summary();
        let report = FailureReport::for_phase(
            ctx.phase(index)?,
            required,
            policy.max_phase_retries,
            summary,
        );
        warn!(
            phase = %report.phase_id,
            best_score = report.best_score,
            threshold = report.threshold,
            retries_remaining = report.retries_remaining,
            "Phase failed"
        );

        ctx.pending_failure = Some(report.clone());
        ctx.emit(RunEvent::FailureReported {
            run_id: ctx.run.id().clone(),
            report: report.clone(),
        });
        ctx.publish();

        let started = Instant::now();
        let resolved = match policy
            .recovery_mode
            .auto_resolution(report.retries_used, policy.max_phase_retries)
        {
            Some(resolution) => Some((resolution, ResolutionSource::System)),
            None => self.wait_for_resolution(ctx, &report).await,
        };
        ctx.pending_failure = None;

        let Some((resolution, source)) = resolved else {
            ctx.publish();
            return Ok(None);
        };
        let waited_ms = match source {
            ResolutionSource::System => 0,
            ResolutionSource::User => started.elapsed().as_millis() as u64,
        };
        info!(
            phase = %report.phase_id,
            %resolution,
            %source,
            waited_ms,
            "Failure resolved"
        );

        let record = RecoveryRecord {
            report,
            resolution: resolution.clone(),
            source,
            waited_ms,
        };
        ctx.run.record_recovery(record.clone());
        ctx.emit(RunEvent::FailureResolved {
            run_id: ctx.run.id().clone(),
            record,
        });
        ctx.publish();
        Ok(Some(resolution))
    }

    /// Failure decisions have no timeout: wait for a response or cancellation.
    async fn wait_for_resolution(
        &self,
        ctx: &RunContext,
        report: &FailureReport,
    ) -> Option<(FailureResolution, ResolutionSource)> {
        let (tx, rx) = oneshot::channel();
        ctx.board.open_failure(report.clone(), tx);

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                ctx.board.close_failure(&report.phase_id);
                None
            }
            received = rx => match received {
                Ok(resolution) => Some((resolution, ResolutionSource::User)),
                Err(_) => {
                    warn!(phase = %report.phase_id, "Recovery channel closed");
                    None
                }
            },
        }
    }
}
