//! Score thresholds and the classification tiers derived from them.
//!
//! Both [`RacingThresholds::tier`] and [`RacingThresholds::classify`] are pure
//! functions of a score. Tiers are recomputed on demand, never stored.

use super::hypothesis::HypothesisStatus;
use crate::core::score::{SCORE_MAX, SCORE_MIN};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Qualitative label for a hypothesis score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationTier {
    Breakthrough,
    Strong,
    Promising,
    Developing,
    BelowCutoff,
}

impl ClassificationTier {
    pub fn as_str(&self) -> &str {
        match self {
            ClassificationTier::Breakthrough => "breakthrough",
            ClassificationTier::Strong => "strong",
            ClassificationTier::Promising => "promising",
            ClassificationTier::Developing => "developing",
            ClassificationTier::BelowCutoff => "below_cutoff",
        }
    }
}

impl fmt::Display for ClassificationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Thresholds applied after every shared racing iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RacingThresholds {
    pub breakthrough: f64,
    pub strong: f64,
    pub promising: f64,
    pub elimination: f64,
}

impl Default for RacingThresholds {
    fn default() -> Self {
        Self {
            breakthrough: 9.0,
            strong: 8.0,
            promising: 7.0,
            elimination: 5.0,
        }
    }
}

impl RacingThresholds {
    /// Intermediate tiers keep their defaults, clamped between the two cutoffs.
    pub fn new(breakthrough: f64, elimination: f64) -> Self {
        let defaults = Self::default();
        let strong = defaults.strong.min(breakthrough).max(elimination);
        let promising = defaults.promising.min(strong).max(elimination);
        Self {
            breakthrough,
            strong,
            promising,
            elimination,
        }
    }

    /// Thresholds must sit inside the score range and be ordered
    /// `elimination <= promising <= strong <= breakthrough`, with
    /// elimination strictly below breakthrough.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("breakthrough", self.breakthrough),
            ("strong", self.strong),
            ("promising", self.promising),
            ("elimination", self.elimination),
        ] {
            if !(SCORE_MIN..=SCORE_MAX).contains(&value) {
                return Err(format!("{} threshold {} outside 0-10", name, value));
            }
        }
        if self.elimination >= self.breakthrough {
            return Err(format!(
                "elimination threshold {} must be below breakthrough threshold {}",
                self.elimination, self.breakthrough
            ));
        }
        if !(self.elimination <= self.promising
            && self.promising <= self.strong
            && self.strong <= self.breakthrough)
        {
            return Err("tier thresholds must be ordered elimination <= promising <= strong <= breakthrough".to_string());
        }
        Ok(())
    }

    /// Highest matching tier wins.
    pub fn tier(&self, score: f64) -> ClassificationTier {
        if score >= self.breakthrough {
            ClassificationTier::Breakthrough
        } else if score >= self.strong {
            ClassificationTier::Strong
        } else if score >= self.promising {
            ClassificationTier::Promising
        } else if score >= self.elimination {
            ClassificationTier::Developing
        } else {
            ClassificationTier::BelowCutoff
        }
    }

    /// Status a freshly scored hypothesis moves to.
    pub fn classify(&self, score: f64) -> HypothesisStatus {
        if score >= self.breakthrough {
            HypothesisStatus::Breakthrough
        } else if score < self.elimination {
            HypothesisStatus::Eliminated
        } else {
            HypothesisStatus::Active
        }
    }
}
