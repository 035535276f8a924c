//! Hypothesis racing: population-based search with elimination and
//! breakthrough detection.
//!
//! Each strategy seeds a handful of [`RacingHypothesis`] entries; every
//! shared iteration rescores the active ones and [`RacingThresholds`]
//! reclassifies them. [`RaceStats`] is derived after each round.

pub mod classification;
pub mod hypothesis;
pub mod race;
pub mod stats;

pub use classification::{ClassificationTier, RacingThresholds};
pub use hypothesis::{HypothesisStatus, RacingHypothesis};
pub use race::{Race, RoundOutcome, RoundScore};
pub use stats::RaceStats;
