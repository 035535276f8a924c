//! Aggregates derived from a hypothesis population.

use super::hypothesis::{HypothesisStatus, RacingHypothesis};
use serde::{Deserialize, Serialize};

/// Recomputed after every shared iteration; never edited by hand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaceStats {
    pub total: usize,
    pub active: usize,
    pub eliminated: usize,
    pub breakthrough: usize,
    /// Best score among non-eliminated hypotheses
    pub top_score: Option<f64>,
    /// Mean score over non-eliminated hypotheses
    pub average_score: Option<f64>,
    pub iteration: u32,
    pub elapsed_ms: u64,
}

impl RaceStats {
    pub fn compute(hypotheses: &[RacingHypothesis], iteration: u32, elapsed_ms: u64) -> Self {
        let mut stats = Self {
            total: hypotheses.len(),
            iteration,
            elapsed_ms,
            ..Self::default()
        };

        let mut sum = 0.0;
        let mut standing = 0usize;
        for h in hypotheses {
            match h.status() {
                HypothesisStatus::Active => stats.active += 1,
                HypothesisStatus::Eliminated => {
                    stats.eliminated += 1;
                    continue;
                }
                HypothesisStatus::Breakthrough => stats.breakthrough += 1,
            }
            sum += h.score();
            standing += 1;
            stats.top_score = Some(stats.top_score.map_or(h.score(), |top| top.max(h.score())));
        }
        if standing > 0 {
            stats.average_score = Some(sum / standing as f64);
        }
        stats
    }

    pub fn is_consistent(&self) -> bool {
        self.active + self.eliminated + self.breakthrough == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::HypothesisId;
    use crate::pipeline::iteration::Candidate;
    use crate::racing::classification::RacingThresholds;
    use serde_json::json;

    fn population(scores: &[f64]) -> Vec<RacingHypothesis> {
        scores
            .iter()
            .enumerate()
            .map(|(i, s)| {
                RacingHypothesis::seeded(
                    HypothesisId::new(format!("h-{}", i)),
                    i,
                    "literature",
                    Candidate::new(json!(i)),
                    *s,
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_population() {
        let stats = RaceStats::compute(&[], 1, 0);
        assert_eq!(stats.total, 0);
        assert!(stats.top_score.is_none());
        assert!(stats.average_score.is_none());
        assert!(stats.is_consistent());
    }

    #[test]
    fn test_eliminated_excluded_from_averages() {
        let t = RacingThresholds::default();
        let mut pop = population(&[6.0, 6.0, 6.0]);
        pop[0].apply_score(2.0, &t);
        pop[1].apply_score(9.5, &t);
        pop[2].apply_score(6.5, &t);

        let stats = RaceStats::compute(&pop, 2, 40);
        assert_eq!(stats.eliminated, 1);
        assert_eq!(stats.breakthrough, 1);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.top_score, Some(9.5));
        assert_eq!(stats.average_score, Some(8.0));
        assert!(stats.is_consistent());
    }
}
