//! Refinement loop: generate, score, retry with feedback.

use super::RunDiscoveryUseCase;
use super::context::RunContext;
use super::types::{CheckpointDecision, PhaseResult, RunDiscoveryError};
use crate::ports::collaborator::CollaboratorPort;
use crate::ports::run_events::RunEvent;
use discovery_domain::{
    Candidate, DecisionOrigin, Feedback, Iteration, PhaseSpec, validate_score,
};
use tokio::time::Instant;
use tracing::{debug, warn};

impl<C: CollaboratorPort + 'static> RunDiscoveryUseCase<C> {
    /// Drive one refinement phase attempt to a terminal state.
    ///
    /// A collaborator error consumes an iteration slot as a non-passing
    /// iteration; it never aborts the loop.
    pub(super) async fn run_refinement(
        &self,
        ctx: &mut RunContext,
        index: usize,
        spec: &PhaseSpec,
        guidance: Option<&str>,
    ) -> Result<PhaseResult, RunDiscoveryError> {
        let mut prior_feedback: Option<Feedback> = None;

        loop {
            if ctx.is_cancelled() {
                return Ok(PhaseResult::Cancelled);
            }

            let number = ctx.phase(index)?.next_iteration_index();
            let (iteration, candidate) = self
                .refine_once(ctx, index, number, prior_feedback.as_ref(), guidance)
                .await?;
            let passed = iteration.passed;
            let feedback = iteration.feedback.clone();

            ctx.phase_mut(index)?.record_iteration(iteration.clone())?;
            debug!(
                phase = %spec.id,
                iteration = number,
                score = iteration.score,
                passed,
                "Iteration recorded"
            );
            ctx.emit(RunEvent::IterationRecorded {
                run_id: ctx.run.id().clone(),
                phase_id: spec.id.clone(),
                iteration,
            });

            if passed && let Some(candidate) = candidate {
                ctx.phase_mut(index)?.complete(candidate)?;
                ctx.publish();
                return Ok(PhaseResult::Completed);
            }
            if ctx.phase(index)?.budget_exhausted() {
                ctx.phase_mut(index)?.fail()?;
                ctx.publish();
                return Ok(PhaseResult::Failed);
            }
            ctx.publish();

            prior_feedback = Some(feedback);

            if spec.checkpoint_after(number) && self.config.policy.gates_enabled() {
                match self.iteration_checkpoint(ctx, index, number, vec![]).await? {
                    CheckpointDecision::Proceed => {}
                    CheckpointDecision::Steer(comment) => {
                        if let (Some(comment), Some(feedback)) = (comment, prior_feedback.as_mut()) {
                            feedback.hint = Some(comment);
                        }
                    }
                    CheckpointDecision::Skip => {
                        self.skip_phase(ctx, index, DecisionOrigin::Intervention)?;
                        return Ok(PhaseResult::Skipped);
                    }
                    CheckpointDecision::Cancelled => return Ok(PhaseResult::Cancelled),
                }
            }
        }
    }

    /// One generate/score cycle. Returns the iteration plus the candidate to
    /// accept if it passed.
    async fn refine_once(
        &self,
        ctx: &RunContext,
        index: usize,
        number: u32,
        prior_feedback: Option<&Feedback>,
        guidance: Option<&str>,
    ) -> Result<(Iteration, Option<Candidate>), RunDiscoveryError> {
        let generation = ctx.generation_context(index, number, guidance)?;
        let rubric = ctx.rubric_context(index, number)?;
        let started = Instant::now();
        let elapsed = || started.elapsed().as_millis() as u64;

        let candidate = match self.collaborator.generate(&generation, prior_feedback).await {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(phase = %generation.phase_id, iteration = number, error = %e, "Generation failed");
                return Ok((
                    Iteration::collaborator_failure(number, None, e.to_string(), elapsed()),
                    None,
                ));
            }
        };

        let verdict = match self.collaborator.score(&candidate, &rubric).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(phase = %generation.phase_id, iteration = number, error = %e, "Scoring failed");
                return Ok((
                    Iteration::collaborator_failure(number, Some(candidate), e.to_string(), elapsed()),
                    None,
                ));
            }
        };

        match validate_score(verdict.value) {
            Ok(score) => {
                if verdict.passed != (score >= rubric.pass_threshold) {
                    debug!(
                        phase = %generation.phase_id,
                        score,
                        judge_passed = verdict.passed,
                        "Judge pass flag disagrees with phase threshold; using threshold"
                    );
                }
                let iteration = Iteration::judged(
                    number,
                    candidate.clone(),
                    score,
                    rubric.pass_threshold,
                    verdict.feedback,
                    elapsed(),
                );
                Ok((iteration, Some(candidate)))
            }
            Err(e) => {
                warn!(phase = %generation.phase_id, iteration = number, error = %e, "Judge returned an invalid score");
                Ok((
                    Iteration::collaborator_failure(number, Some(candidate), e.to_string(), elapsed()),
                    None,
                ))
            }
        }
    }
}
