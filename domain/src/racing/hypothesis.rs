//! A single competitor in a hypothesis race.

use super::classification::{ClassificationTier, RacingThresholds};
use crate::core::ids::HypothesisId;
use crate::pipeline::iteration::Candidate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisStatus {
    Active,
    /// Frozen: never rescored again
    Eliminated,
    /// Terminal for scoring, still visible on the leaderboard
    Breakthrough,
}

impl HypothesisStatus {
    pub fn as_str(&self) -> &str {
        match self {
            HypothesisStatus::Active => "active",
            HypothesisStatus::Eliminated => "eliminated",
            HypothesisStatus::Breakthrough => "breakthrough",
        }
    }
}

impl fmt::Display for HypothesisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RacingHypothesis {
    id: HypothesisId,
    /// Creation order inside the population; breaks leaderboard ties
    index: usize,
    strategy: String,
    payload: Candidate,
    score: f64,
    history: Vec<f64>,
    status: HypothesisStatus,
    iterations: u32,
    rescore_failures: u32,
}

impl RacingHypothesis {
    /// A freshly proposed hypothesis. The seed score is provisional.
    pub fn seeded(
        id: HypothesisId,
        index: usize,
        strategy: impl Into<String>,
        payload: Candidate,
        initial_score: f64,
    ) -> Self {
        Self {
            id,
            index,
            strategy: strategy.into(),
            payload,
            score: initial_score,
            history: vec![initial_score],
            status: HypothesisStatus::Active,
            iterations: 1,
            rescore_failures: 0,
        }
    }

    pub fn id(&self) -> &HypothesisId {
        &self.id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn payload(&self) -> &Candidate {
        &self.payload
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn status(&self) -> HypothesisStatus {
        self.status
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn rescore_failures(&self) -> u32 {
        self.rescore_failures
    }

    pub fn is_active(&self) -> bool {
        self.status == HypothesisStatus::Active
    }

    pub fn is_eliminated(&self) -> bool {
        self.status == HypothesisStatus::Eliminated
    }

    pub fn tier(&self, thresholds: &RacingThresholds) -> ClassificationTier {
        thresholds.tier(self.score)
    }

    /// Record a new score and reclassify. Returns `false` (and changes
    /// nothing) unless the hypothesis is still active.
    pub fn apply_score(&mut self, score: f64, thresholds: &RacingThresholds) -> bool {
        if !self.is_active() {
            return false;
        }
        self.score = score;
        self.history.push(score);
        self.iterations += 1;
        self.status = thresholds.classify(score);
        true
    }

    /// The rescoring call failed: repeat the current score, stay active.
    pub fn carry_score(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.history.push(self.score);
        self.iterations += 1;
        self.rescore_failures += 1;
        true
    }
}
