//! Pipeline entities: the run, its phases and their iterations.
//!
//! [`DiscoveryRun`] is the aggregate root. It owns an ordered list of
//! [`Phase`]s built from [`PhaseSpec`]s; each phase appends immutable
//! [`Iteration`] records. [`PipelinePolicy`] decides who answers gates and
//! failures.

pub mod iteration;
pub mod phase;
pub mod policy;
pub mod run;
pub mod spec;

pub use iteration::{Candidate, Feedback, Iteration};
pub use phase::{DecisionOrigin, Phase, PhaseAttempt, PhaseStatus};
pub use policy::{InterventionMode, PipelinePolicy, RecoveryMode};
pub use run::{DiscoveryRun, RunOutcome, RunStatus, RunSummary};
pub use spec::{PhaseMode, PhaseSpec, RacingSpec, ReviewGate, validate_pipeline};
