//! Run Discovery use case
//!
//! The phase orchestrator. Drives an ordered list of phases, each through a
//! refinement loop or a hypothesis race, and stops at the decision points
//! the policy asks for:
//!
//! | Step                       | Refinement | Racing | Decided by                 |
//! |----------------------------|------------|--------|----------------------------|
//! | 1. Iterate                 | yes        | yes    | collaborator scores        |
//! | 1b. Escalation checkpoint  | opt        | opt    | `checkpoint_every`         |
//! | 2. Review gate             | opt        | opt    | `review`                   |
//! | 3. Failure recovery        | on fail    | on fail| `recovery_mode` or a human |
//!
//! Each run executes in its own task. [`RunDiscoveryUseCase::start`] returns
//! a [`DiscoveryHandle`] whose [`RunControl`] observes snapshots and answers
//! interventions and failures.

mod context;
mod gate;
mod racing;
mod recovery;
mod refinement;
mod types;

pub use types::{RunDiscoveryError, RunDiscoveryInput};

use context::RunContext;
use types::PhaseResult;

use crate::config::DiscoveryConfig;
use crate::ports::collaborator::CollaboratorPort;
use crate::ports::run_events::{NoRunEvents, RunEvent, RunEventNotifier};
use crate::use_cases::control::{ControlBoard, DiscoveryHandle, RunControl};
use discovery_domain::{
    DecisionOrigin, DiscoveryRun, FailureResolution, Intervention, InterventionAction,
    InterventionKind, PhaseMode, PhaseStatus, ReviewGate, RunId, RunOutcome, RunSnapshot,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Use case for running a discovery pipeline
pub struct RunDiscoveryUseCase<C: CollaboratorPort + 'static> {
    pub(super) collaborator: Arc<C>,
    pub(super) config: Arc<DiscoveryConfig>,
    pub(super) notifier: Arc<dyn RunEventNotifier>,
    pub(super) cancellation_token: Option<CancellationToken>,
}

impl<C: CollaboratorPort + 'static> Clone for RunDiscoveryUseCase<C> {
    fn clone(&self) -> Self {
        Self {
            collaborator: self.collaborator.clone(),
            config: self.config.clone(),
            notifier: self.notifier.clone(),
            cancellation_token: self.cancellation_token.clone(),
        }
    }
}

/// Where the orchestrator goes after a phase attempt.
enum Next {
    Advance,
    /// Re-run the same phase; carries reviewer guidance
    Rerun(Option<String>),
    Finish(RunOutcome),
}

impl<C: CollaboratorPort + 'static> RunDiscoveryUseCase<C> {
    pub fn new(collaborator: Arc<C>, config: DiscoveryConfig) -> Self {
        Self {
            collaborator,
            config: Arc::new(config),
            notifier: Arc::new(NoRunEvents),
            cancellation_token: None,
        }
    }

    /// Push every run event to `notifier`.
    pub fn with_notifier(mut self, notifier: Arc<dyn RunEventNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Parent token: cancelling it cancels every run started from here.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Validate the input and spawn the run task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        &self,
        input: RunDiscoveryInput,
    ) -> Result<DiscoveryHandle, RunDiscoveryError> {
        if input.query.trim().is_empty() {
            return Err(RunDiscoveryError::EmptyQuery);
        }
        self.config
            .validate()
            .map_err(|e| RunDiscoveryError::InvalidConfig(e.to_string()))?;

        let run_id = input.run_id.unwrap_or_else(RunId::generate);
        let run = DiscoveryRun::new(run_id.clone(), input.query, &self.config.phases);
        let (snapshot_tx, snapshot_rx) = watch::channel(RunSnapshot::new(run.clone()));
        let board = Arc::new(ControlBoard::new(
            self.config.phases.iter().map(|p| p.id.clone()).collect(),
        ));
        let cancel = match &self.cancellation_token {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };

        let control = RunControl::new(run_id, board.clone(), snapshot_rx, cancel.clone());
        let context = RunContext::new(run, snapshot_tx, self.notifier.clone(), cancel, board);

        let this = self.clone();
        let task = tokio::spawn(async move { this.drive(context).await });
        Ok(DiscoveryHandle::new(control, task))
    }

    /// Start a run and wait for it. Only useful when nothing needs a human
    /// answer (auto policies), since the control is not exposed.
    pub async fn execute(
        &self,
        input: RunDiscoveryInput,
    ) -> Result<DiscoveryRun, RunDiscoveryError> {
        self.start(input)?.wait().await
    }

    /// The orchestrator loop. Owns the run until it reaches a terminal state.
    async fn drive(&self, mut ctx: RunContext) -> Result<DiscoveryRun, RunDiscoveryError> {
        ctx.run.start()?;
        info!(run = %ctx.run.id(), phases = ctx.run.phases().len(), "Discovery run started");
        ctx.emit(RunEvent::RunStarted {
            run_id: ctx.run.id().clone(),
            query: ctx.run.query().to_string(),
            phases: ctx.run.phases().iter().map(|p| p.id().clone()).collect(),
        });
        ctx.publish();

        let outcome = self.run_phases(&mut ctx).await?;
        self.finish(&mut ctx, outcome)?;
        Ok(ctx.run)
    }

    async fn run_phases(&self, ctx: &mut RunContext) -> Result<RunOutcome, RunDiscoveryError> {
        let mut index = 0;
        let mut guidance: Option<String> = None;

        while index < self.config.phases.len() {
            if ctx.is_cancelled() {
                return Ok(RunOutcome::Cancelled);
            }
            let spec = &self.config.phases[index];
            ctx.run.set_current_phase(index)?;
            let phase = ctx.phase_mut(index)?;
            if phase.status() == PhaseStatus::Pending {
                phase.start()?;
            }
            let attempt = phase.retries_used() + 1;
            info!(phase = %spec.id, attempt, "Phase started");
            ctx.emit(RunEvent::PhaseStarted {
                run_id: ctx.run.id().clone(),
                phase_id: spec.id.clone(),
                attempt,
            });
            ctx.publish();

            let result = match &spec.mode {
                PhaseMode::Refinement => {
                    self.run_refinement(ctx, index, spec, guidance.as_deref())
                        .await?
                }
                PhaseMode::Racing(racing) => {
                    self.run_race(ctx, index, spec, racing, guidance.as_deref())
                        .await?
                }
            };

            let next = match result {
                PhaseResult::Cancelled => return Ok(RunOutcome::Cancelled),
                PhaseResult::Skipped => Next::Advance,
                PhaseResult::Completed => {
                    let phase = ctx.phase(index)?;
                    info!(phase = %spec.id, score = ?phase.score(), "Phase completed");
                    ctx.emit(RunEvent::PhaseCompleted {
                        run_id: ctx.run.id().clone(),
                        phase_id: spec.id.clone(),
                        score: phase.score(),
                    });
                    self.review_phase(ctx, index).await?
                }
                PhaseResult::Failed => {
                    let best = ctx.phase(index)?.best_score();
                    warn!(phase = %spec.id, best_score = ?best, "Phase failed");
                    ctx.emit(RunEvent::PhaseFailed {
                        run_id: ctx.run.id().clone(),
                        phase_id: spec.id.clone(),
                        best_score: best,
                    });
                    ctx.publish();
                    self.recover_phase(ctx, index).await?
                }
            };

            match next {
                Next::Advance => {
                    index += 1;
                    guidance = None;
                }
                Next::Rerun(comment) => guidance = comment,
                Next::Finish(outcome) => return Ok(outcome),
            }
        }

        Ok(RunOutcome::Completed {
            degraded: ctx.run.has_skipped(),
        })
    }

    /// Review gate after a completed phase.
    async fn review_phase(&self, ctx: &mut RunContext, index: usize) -> Result<Next, RunDiscoveryError> {
        let spec = &self.config.phases[index];
        let kind = match spec.review {
            ReviewGate::None => return Ok(Next::Advance),
            ReviewGate::Recommended => InterventionKind::ReviewRecommended,
            ReviewGate::Required => InterventionKind::ApprovalRequired,
        };
        if !self.config.policy.gates_enabled() {
            return Ok(Next::Advance);
        }

        let phase = ctx.phase(index)?;
        let selectable = phase.race().map(|r| r.selectable_ids()).unwrap_or_default();
        let reruns_left = phase.retries_used() < self.config.policy.max_phase_retries;
        let mut intervention = Intervention::after_phase(
            spec.id.clone(),
            kind,
            self.config.policy.intervention_timeout_ms,
            selectable,
        );
        if !reruns_left {
            intervention = intervention.without(&[InterventionAction::Retry, InterventionAction::Modify]);
        }

        let Some(response) = self.await_intervention(ctx, intervention).await? else {
            return Ok(Next::Finish(RunOutcome::Cancelled));
        };

        match response.action {
            InterventionAction::Retry | InterventionAction::Modify => {
                let attempt = ctx.phase_mut(index)?.restart(DecisionOrigin::Intervention)?;
                info!(phase = %spec.id, attempt, action = %response.action, "Phase re-entered from review");
                ctx.emit(RunEvent::PhaseRetried {
                    run_id: ctx.run.id().clone(),
                    phase_id: spec.id.clone(),
                    attempt,
                    origin: DecisionOrigin::Intervention,
                });
                ctx.publish();
                let guidance = match response.action {
                    InterventionAction::Modify => response.comment,
                    _ => None,
                };
                Ok(Next::Rerun(guidance))
            }
            _ => {
                if !response.selected_ids.is_empty() {
                    self.carry_selection(ctx, index, &response.selected_ids)?;
                }
                Ok(Next::Advance)
            }
        }
    }

    /// Failure recovery for a failed phase.
    async fn recover_phase(&self, ctx: &mut RunContext, index: usize) -> Result<Next, RunDiscoveryError> {
        let spec = &self.config.phases[index];
        let Some(resolution) = self.await_recovery(ctx, index).await? else {
            return Ok(Next::Finish(RunOutcome::Cancelled));
        };

        match resolution {
            FailureResolution::RetryPhase => {
                let attempt = ctx.phase_mut(index)?.restart(DecisionOrigin::Recovery)?;
                info!(phase = %spec.id, attempt, "Retrying failed phase");
                ctx.emit(RunEvent::PhaseRetried {
                    run_id: ctx.run.id().clone(),
                    phase_id: spec.id.clone(),
                    attempt,
                    origin: DecisionOrigin::Recovery,
                });
                ctx.publish();
                Ok(Next::Rerun(None))
            }
            FailureResolution::ContinuePartial => {
                self.skip_phase(ctx, index, DecisionOrigin::Recovery)?;
                Ok(Next::Advance)
            }
            FailureResolution::ModifyQuery { query } => Ok(Next::Finish(RunOutcome::QueryModified {
                phase: spec.id.clone(),
                query,
            })),
            FailureResolution::ExportPartial => Ok(Next::Finish(RunOutcome::PartialExport {
                phase: spec.id.clone(),
            })),
        }
    }

    fn skip_phase(
        &self,
        ctx: &mut RunContext,
        index: usize,
        origin: DecisionOrigin,
    ) -> Result<(), RunDiscoveryError> {
        let phase = ctx.phase_mut(index)?;
        phase.skip(origin)?;
        let phase_id = phase.id().clone();
        info!(phase = %phase_id, ?origin, "Phase skipped");
        ctx.emit(RunEvent::PhaseSkipped {
            run_id: ctx.run.id().clone(),
            phase_id,
            origin,
        });
        ctx.publish();
        Ok(())
    }

    fn finish(&self, ctx: &mut RunContext, outcome: RunOutcome) -> Result<(), RunDiscoveryError> {
        ctx.pending_intervention = None;
        ctx.pending_failure = None;
        ctx.run.set_elapsed_ms(ctx.elapsed_ms());
        ctx.run.finish(outcome)?;
        info!(
            run = %ctx.run.id(),
            status = %ctx.run.status(),
            elapsed_ms = ctx.run.elapsed_ms(),
            "Discovery run finished"
        );
        ctx.emit(RunEvent::RunFinished {
            run_id: ctx.run.id().clone(),
            status: ctx.run.status(),
            outcome: ctx.run.outcome().cloned(),
            elapsed_ms: ctx.run.elapsed_ms(),
        });
        ctx.publish();
        Ok(())
    }
}
