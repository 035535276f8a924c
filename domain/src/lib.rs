//! Domain layer for discovery-pipeline
//!
//! This crate contains the entities, value objects and pure policies of the
//! discovery pipeline. It has no dependencies on an async runtime, I/O or
//! presentation concerns.
//!
//! # Core Concepts
//!
//! ## Pipeline
//!
//! A [`DiscoveryRun`] drives an ordered list of [`Phase`]s. Each phase runs a
//! refinement loop of scored [`Iteration`]s until one passes its threshold
//! or the iteration budget is spent.
//!
//! ## Racing
//!
//! A racing phase replaces the single candidate with a population of
//! [`RacingHypothesis`] entries that are rescored every shared iteration,
//! eliminated below a cutoff and flagged as breakthroughs above another.
//!
//! ## Interventions and Recovery
//!
//! - **Intervention**: a checkpoint where the run waits for a human (or times out)
//! - **Failure recovery**: a decision point when a phase fails, with ranked
//!   recommendations

pub mod core;
pub mod intervention;
pub mod pipeline;
pub mod racing;
pub mod recovery;
pub mod snapshot;

// Re-export commonly used types
pub use core::{
    error::DomainError,
    ids::{HypothesisId, InterventionId, PhaseId, RunId},
    score::{SCORE_MAX, SCORE_MIN, validate_score},
};
pub use intervention::{
    Intervention, InterventionAction, InterventionKind, InterventionPoint, InterventionRecord,
    InterventionResponse, ResolutionSource, ResponseRejection,
};
pub use pipeline::{
    Candidate, DecisionOrigin, DiscoveryRun, Feedback, InterventionMode, Iteration, Phase,
    PhaseAttempt, PhaseMode, PhaseSpec, PhaseStatus, PipelinePolicy, RacingSpec, RecoveryMode,
    ReviewGate, RunOutcome, RunStatus, RunSummary, validate_pipeline,
};
pub use racing::{
    ClassificationTier, HypothesisStatus, Race, RaceStats, RacingHypothesis, RacingThresholds,
    RoundOutcome, RoundScore,
};
pub use recovery::{
    FailureReport, FailureResolution, Priority, Recommendation, RecoveryOption, RecoveryRecord,
    recommend,
};
pub use snapshot::{PhaseSummary, RunSnapshot};
