//! Hypothesis racing engine.
//!
//! ```text
//! seed:  strategy A ─┐
//!        strategy B ─┼─ join_all ──> population (iteration 1)
//!        strategy C ─┘
//! round: active h1 ─┐
//!        active h2 ─┼─ JoinSet barrier ──> classify ──> RaceStats (iteration n)
//!        active h3 ─┘
//! ```
//!
//! Rescoring within one round runs concurrently; the next round starts only
//! once every call of the current one has returned.

use super::RunDiscoveryUseCase;
use super::context::RunContext;
use super::types::{CheckpointDecision, PhaseResult, RunDiscoveryError};
use crate::ports::collaborator::{CollaboratorPort, GenerationContext, HypothesisProbe};
use crate::ports::run_events::RunEvent;
use discovery_domain::{
    DecisionOrigin, Feedback, HypothesisId, Iteration, PhaseSpec, Race, RacingHypothesis,
    RacingSpec, RoundOutcome, RoundScore, validate_score,
};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

impl<C: CollaboratorPort + 'static> RunDiscoveryUseCase<C> {
    /// Drive one racing phase attempt to a terminal state.
    ///
    /// The race runs until its iteration budget is spent or no hypothesis
    /// is still active. The phase passes when the final round passed.
    pub(super) async fn run_race(
        &self,
        ctx: &mut RunContext,
        index: usize,
        spec: &PhaseSpec,
        racing: &RacingSpec,
        guidance: Option<&str>,
    ) -> Result<PhaseResult, RunDiscoveryError> {
        if ctx.is_cancelled() {
            return Ok(PhaseResult::Cancelled);
        }

        let started = Instant::now();
        let seeding = ctx.generation_context(index, 1, guidance)?;
        let population = self.seed_population(&seeding, racing).await;
        let mut race = Race::seed(racing.thresholds, population, ctx.elapsed_ms());
        info!(
            phase = %spec.id,
            population = race.stats().total,
            "Race seeded"
        );
        ctx.emit(RunEvent::RaceSeeded {
            run_id: ctx.run.id().clone(),
            phase_id: spec.id.clone(),
            stats: race.stats().clone(),
        });
        // Seed scores are provisional: the seeding round never passes.
        let seed_iteration = round_iteration(&race, 1, false, &RoundOutcome::default(), started);
        self.record_round(ctx, index, spec, &race, seed_iteration)?;

        let mut steer: Option<String> = guidance.map(str::to_string);
        loop {
            let phase = ctx.phase(index)?;
            if race.is_resolved() || phase.budget_exhausted() {
                break;
            }
            if ctx.is_cancelled() {
                return Ok(PhaseResult::Cancelled);
            }

            let number = phase.next_iteration_index();
            let round_started = Instant::now();
            let context = ctx.generation_context(index, number, steer.as_deref())?;
            let scores = self.rescore_active(&race, &context, number).await;
            let outcome = race.apply_round(scores, ctx.elapsed_ms());
            let passed = race.round_passed(spec.pass_threshold);
            debug!(
                phase = %spec.id,
                iteration = number,
                active = race.stats().active,
                eliminated = outcome.eliminated.len(),
                breakthroughs = outcome.breakthroughs.len(),
                "Race round complete"
            );
            ctx.emit(RunEvent::RaceRound {
                run_id: ctx.run.id().clone(),
                phase_id: spec.id.clone(),
                stats: race.stats().clone(),
                eliminated: outcome.eliminated.clone(),
                breakthroughs: outcome.breakthroughs.clone(),
            });
            let iteration = round_iteration(&race, number, passed, &outcome, round_started);
            self.record_round(ctx, index, spec, &race, iteration)?;

            let more_rounds = race.has_active() && !ctx.phase(index)?.budget_exhausted();
            if more_rounds
                && spec.checkpoint_after(number)
                && !passed
                && self.config.policy.gates_enabled()
            {
                match self.iteration_checkpoint(ctx, index, number, vec![]).await? {
                    CheckpointDecision::Proceed => {}
                    CheckpointDecision::Steer(comment) => {
                        if comment.is_some() {
                            steer = comment;
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

        let last_passed = ctx
            .phase(index)?
            .last_iteration()
            .is_some_and(|it| it.passed);
        if last_passed {
            let carried = race.top(racing.carry_forward);
            let ids: Vec<HypothesisId> = carried.iter().map(|h| h.id().clone()).collect();
            let output = race.output_for(&carried);
            let phase = ctx.phase_mut(index)?;
            phase.complete(output.clone())?;
            phase.carry_forward(ids, output)?;
            ctx.publish();
            Ok(PhaseResult::Completed)
        } else {
            ctx.phase_mut(index)?.fail()?;
            ctx.publish();
            Ok(PhaseResult::Failed)
        }
    }

    /// Ask every strategy for its proposals concurrently.
    ///
    /// A failing strategy contributes nothing; proposals with an invalid
    /// seed score are dropped.
    async fn seed_population(
        &self,
        context: &GenerationContext,
        racing: &RacingSpec,
    ) -> Vec<RacingHypothesis> {
        let per_strategy = racing.hypotheses_per_strategy;
        let proposals = join_all(racing.strategies.iter().map(|strategy| {
            self.collaborator
                .propose_hypotheses(strategy, context, per_strategy)
        }))
        .await;

        let mut population = Vec::with_capacity(racing.population_size());
        for (strategy, result) in racing.strategies.iter().zip(proposals) {
            let proposed = match result {
                Ok(proposed) => proposed,
                Err(e) => {
                    warn!(strategy = %strategy, error = %e, "Strategy failed to propose hypotheses");
                    continue;
                }
            };
            for (ordinal, proposal) in proposed.into_iter().take(per_strategy as usize).enumerate() {
                let id = HypothesisId::for_proposal(strategy, ordinal + 1);
                match validate_score(proposal.initial_score) {
                    Ok(score) => {
                        let index = population.len();
                        population.push(RacingHypothesis::seeded(
                            id,
                            index,
                            strategy.clone(),
                            proposal.payload,
                            score,
                        ));
                    }
                    Err(e) => warn!(hypothesis = %id, error = %e, "Dropping proposal"),
                }
            }
        }
        population
    }

    /// Rescore every active hypothesis; returns once all calls finished.
    async fn rescore_active(
        &self,
        race: &Race,
        context: &GenerationContext,
        iteration: u32,
    ) -> Vec<(usize, RoundScore)> {
        let active = race.active_indices();
        let mut join_set = JoinSet::new();

        for &position in &active {
            let h = &race.hypotheses()[position];
            let probe = HypothesisProbe {
                id: h.id().clone(),
                strategy: h.strategy().to_string(),
                payload: h.payload().clone(),
                score: h.score(),
                history: h.history().to_vec(),
                iteration,
            };
            let collaborator = Arc::clone(&self.collaborator);
            let context = context.clone();

            join_set.spawn(async move {
                let result = collaborator.rescore_hypothesis(&probe, &context).await;
                (position, probe.id, result)
            });
        }

        let mut scores: HashMap<usize, RoundScore> = HashMap::with_capacity(active.len());
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok((position, id, Ok(value))) => {
                    let score = match validate_score(value) {
                        Ok(score) => RoundScore::Scored(score),
                        Err(e) => {
                            warn!(hypothesis = %id, error = %e, "Invalid rescore; carrying previous score");
                            RoundScore::Failed
                        }
                    };
                    scores.insert(position, score);
                }
                Ok((position, id, Err(e))) => {
                    warn!(hypothesis = %id, error = %e, "Rescore failed; carrying previous score");
                    scores.insert(position, RoundScore::Failed);
                }
                Err(e) => {
                    warn!("Task join error: {}", e);
                }
            }
        }

        // A lost task still counts as a failed rescore.
        active
            .into_iter()
            .map(|position| (position, scores.remove(&position).unwrap_or(RoundScore::Failed)))
            .collect()
    }

    fn record_round(
        &self,
        ctx: &mut RunContext,
        index: usize,
        spec: &PhaseSpec,
        race: &Race,
        iteration: Iteration,
    ) -> Result<(), RunDiscoveryError> {
        let phase = ctx.phase_mut(index)?;
        phase.attach_race(race.clone());
        phase.record_iteration(iteration.clone())?;
        ctx.emit(RunEvent::IterationRecorded {
            run_id: ctx.run.id().clone(),
            phase_id: spec.id.clone(),
            iteration,
        });
        ctx.publish();
        Ok(())
    }

    /// Restrict a completed racing phase's output to reviewer-selected ids.
    pub(super) fn carry_selection(
        &self,
        ctx: &mut RunContext,
        index: usize,
        selected: &[HypothesisId],
    ) -> Result<(), RunDiscoveryError> {
        let phase = ctx.phase(index)?;
        let Some(race) = phase.race() else {
            return Ok(());
        };
        let chosen = race.select(selected);
        let ids: Vec<HypothesisId> = chosen.iter().map(|h| h.id().clone()).collect();
        let output = race.output_for(&chosen);
        info!(phase = %phase.id(), carried = ids.len(), "Carrying selected hypotheses forward");
        ctx.phase_mut(index)?.carry_forward(ids, output)?;
        ctx.publish();
        Ok(())
    }
}

/// One race round expressed as a phase iteration.
fn round_iteration(
    race: &Race,
    number: u32,
    passed: bool,
    outcome: &RoundOutcome,
    started: Instant,
) -> Iteration {
    let mut feedback = Feedback::new();
    for id in &outcome.breakthroughs {
        feedback = feedback.with_worked(format!("{} reached breakthrough", id));
    }
    for id in &outcome.eliminated {
        feedback = feedback.with_challenge(format!("{} eliminated", id));
    }
    if outcome.rescore_failures > 0 {
        feedback = feedback.with_challenge(format!(
            "{} rescore call(s) failed; previous scores carried",
            outcome.rescore_failures
        ));
    }
    Iteration {
        index: number,
        score: race.round_score(),
        passed,
        feedback,
        duration_ms: started.elapsed().as_millis() as u64,
        candidate: None,
        error: None,
    }
}
