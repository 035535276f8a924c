//! Type definitions for the RunDiscovery use case.

use discovery_domain::{DomainError, RunId};
use thiserror::Error;

/// Errors that can stop a discovery run.
///
/// Collaborator failures, phase exhaustion and cancellation are not errors:
/// they are recorded in the run itself.
#[derive(Error, Debug)]
pub enum RunDiscoveryError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Query cannot be empty")]
    EmptyQuery,

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Run task failed: {0}")]
    TaskFailed(String),
}

/// Input for starting a discovery run
#[derive(Debug, Clone)]
pub struct RunDiscoveryInput {
    pub query: String,
    /// Explicit run id; generated when absent
    pub run_id: Option<RunId>,
}

impl RunDiscoveryInput {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            run_id: None,
        }
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

/// How a phase attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PhaseResult {
    Completed,
    Failed,
    /// Skipped from an escalation checkpoint
    Skipped,
    Cancelled,
}

/// Decision taken at an escalation checkpoint between iterations.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum CheckpointDecision {
    Proceed,
    /// Use the comment as guidance for the next iteration
    Steer(Option<String>),
    Skip,
    Cancelled,
}
