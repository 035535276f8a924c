//! Hypothesis race: a population evolving over shared iterations.

use super::classification::RacingThresholds;
use super::hypothesis::{HypothesisStatus, RacingHypothesis};
use super::stats::RaceStats;
use crate::core::ids::HypothesisId;
use crate::pipeline::iteration::Candidate;
use serde::{Deserialize, Serialize};

/// Result of one rescoring call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoundScore {
    Scored(f64),
    /// The call failed; the hypothesis keeps its score
    Failed,
}

/// Status changes produced by one shared iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundOutcome {
    pub eliminated: Vec<HypothesisId>,
    pub breakthroughs: Vec<HypothesisId>,
    pub rescore_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    thresholds: RacingThresholds,
    hypotheses: Vec<RacingHypothesis>,
    stats: RaceStats,
    /// Shared iterations completed, seeding included
    iteration: u32,
}

impl Race {
    /// Start a race from the seeded population. Seeding counts as iteration 1.
    pub fn seed(thresholds: RacingThresholds, hypotheses: Vec<RacingHypothesis>, elapsed_ms: u64) -> Self {
        let stats = RaceStats::compute(&hypotheses, 1, elapsed_ms);
        Self {
            thresholds,
            hypotheses,
            stats,
            iteration: 1,
        }
    }

    pub fn thresholds(&self) -> &RacingThresholds {
        &self.thresholds
    }

    pub fn hypotheses(&self) -> &[RacingHypothesis] {
        &self.hypotheses
    }

    pub fn hypothesis(&self, id: &HypothesisId) -> Option<&RacingHypothesis> {
        self.hypotheses.iter().find(|h| h.id() == id)
    }

    pub fn stats(&self) -> &RaceStats {
        &self.stats
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Positions of the hypotheses still eligible for rescoring.
    pub fn active_indices(&self) -> Vec<usize> {
        self.hypotheses
            .iter()
            .enumerate()
            .filter(|(_, h)| h.is_active())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn has_active(&self) -> bool {
        self.hypotheses.iter().any(|h| h.is_active())
    }

    /// Every hypothesis has resolved to breakthrough or eliminated.
    pub fn is_resolved(&self) -> bool {
        !self.has_active()
    }

    /// Apply one shared iteration's scores, then recompute stats.
    ///
    /// Entries for positions that are out of range or no longer active are
    /// ignored, so eliminated hypotheses can never be touched.
    pub fn apply_round(&mut self, scores: Vec<(usize, RoundScore)>, elapsed_ms: u64) -> RoundOutcome {
        let mut outcome = RoundOutcome::default();
        for (index, score) in scores {
            let Some(h) = self.hypotheses.get_mut(index) else {
                continue;
            };
            match score {
                RoundScore::Scored(value) => {
                    if h.apply_score(value, &self.thresholds) {
                        match h.status() {
                            HypothesisStatus::Eliminated => outcome.eliminated.push(h.id().clone()),
                            HypothesisStatus::Breakthrough => {
                                outcome.breakthroughs.push(h.id().clone())
                            }
                            HypothesisStatus::Active => {}
                        }
                    }
                }
                RoundScore::Failed => {
                    if h.carry_score() {
                        outcome.rescore_failures += 1;
                    }
                }
            }
        }
        self.iteration += 1;
        self.stats = RaceStats::compute(&self.hypotheses, self.iteration, elapsed_ms);
        outcome
    }

    /// All hypotheses by score descending, ties to the earlier-created one.
    pub fn leaderboard(&self) -> Vec<&RacingHypothesis> {
        let mut ranked: Vec<&RacingHypothesis> = self.hypotheses.iter().collect();
        ranked.sort_by(|a, b| {
            b.score()
                .total_cmp(&a.score())
                .then_with(|| a.index().cmp(&b.index()))
        });
        ranked
    }

    /// Top `n` non-eliminated hypotheses in leaderboard order.
    pub fn top(&self, n: usize) -> Vec<&RacingHypothesis> {
        self.leaderboard()
            .into_iter()
            .filter(|h| !h.is_eliminated())
            .take(n)
            .collect()
    }

    /// Ids a reviewer may carry forward.
    pub fn selectable_ids(&self) -> Vec<HypothesisId> {
        self.leaderboard()
            .into_iter()
            .filter(|h| !h.is_eliminated())
            .map(|h| h.id().clone())
            .collect()
    }

    /// Score recorded for the phase iteration this round represents.
    pub fn round_score(&self) -> f64 {
        self.stats.top_score.unwrap_or(0.0)
    }

    /// A round passes on any breakthrough or a top score meeting `threshold`.
    pub fn round_passed(&self, threshold: f64) -> bool {
        self.stats.breakthrough > 0 || self.stats.top_score.is_some_and(|top| top >= threshold)
    }

    /// Hypotheses with the given ids, in leaderboard order.
    pub fn select(&self, ids: &[HypothesisId]) -> Vec<&RacingHypothesis> {
        self.leaderboard()
            .into_iter()
            .filter(|h| ids.contains(h.id()))
            .collect()
    }

    /// Opaque phase output for a set of carried hypotheses.
    pub fn output_for(&self, carried: &[&RacingHypothesis]) -> Candidate {
        let entries: Vec<serde_json::Value> = carried
            .iter()
            .map(|h| {
                serde_json::json!({
                    "id": h.id(),
                    "strategy": h.strategy(),
                    "score": h.score(),
                    "tier": h.tier(&self.thresholds),
                    "payload": h.payload(),
                })
            })
            .collect();
        Candidate::new(serde_json::Value::Array(entries))
    }
}
