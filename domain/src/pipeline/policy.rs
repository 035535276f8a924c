//! Pipeline policy: how interventions and phase failures are decided.
//!
//! [`PipelinePolicy`] captures the static rules that govern the human
//! touch points of a run. The orchestrator consults it whenever it reaches a
//! gate or a failed phase.

use crate::recovery::FailureResolution;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who answers intervention checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionMode {
    /// Wait for an inbound `respond_to_intervention` request
    #[default]
    Interactive,
    /// Resolve every checkpoint with a system-issued `continue`
    AutoContinue,
    /// Raise no checkpoints at all
    Disabled,
}

impl fmt::Display for InterventionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterventionMode::Interactive => write!(f, "interactive"),
            InterventionMode::AutoContinue => write!(f, "auto_continue"),
            InterventionMode::Disabled => write!(f, "disabled"),
        }
    }
}

impl std::str::FromStr for InterventionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "interactive" => Ok(InterventionMode::Interactive),
            "auto_continue" | "auto" => Ok(InterventionMode::AutoContinue),
            "disabled" | "off" => Ok(InterventionMode::Disabled),
            _ => Err(format!("Invalid InterventionMode: {}", s)),
        }
    }
}

/// Who decides what happens to a failed phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMode {
    /// Wait for an inbound `respond_to_failure` request
    #[default]
    Interactive,
    /// Retry until the retry budget is spent, then export partial results
    AutoRetry,
    /// Skip the failed phase and keep going
    ContinuePartial,
    /// Stop the run, keeping everything completed so far
    ExportPartial,
}

impl fmt::Display for RecoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryMode::Interactive => write!(f, "interactive"),
            RecoveryMode::AutoRetry => write!(f, "auto_retry"),
            RecoveryMode::ContinuePartial => write!(f, "continue_partial"),
            RecoveryMode::ExportPartial => write!(f, "export_partial"),
        }
    }
}

impl std::str::FromStr for RecoveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "interactive" => Ok(RecoveryMode::Interactive),
            "auto_retry" | "retry" => Ok(RecoveryMode::AutoRetry),
            "continue_partial" | "continue" => Ok(RecoveryMode::ContinuePartial),
            "export_partial" | "export" => Ok(RecoveryMode::ExportPartial),
            _ => Err(format!("Invalid RecoveryMode: {}", s)),
        }
    }
}

impl RecoveryMode {
    /// Resolution chosen without a human, or `None` in interactive mode.
    pub fn auto_resolution(&self, retries_used: u32, max_retries: u32) -> Option<FailureResolution> {
        match self {
            RecoveryMode::Interactive => None,
            RecoveryMode::AutoRetry if retries_used < max_retries => {
                Some(FailureResolution::RetryPhase)
            }
            RecoveryMode::AutoRetry => Some(FailureResolution::ExportPartial),
            RecoveryMode::ContinuePartial => Some(FailureResolution::ContinuePartial),
            RecoveryMode::ExportPartial => Some(FailureResolution::ExportPartial),
        }
    }
}

/// Pipeline behavioral policy: static constraints for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelinePolicy {
    pub intervention_mode: InterventionMode,
    /// Auto-continue an unanswered checkpoint after this many milliseconds
    pub intervention_timeout_ms: Option<u64>,
    pub recovery_mode: RecoveryMode,
    /// Retries allowed per phase, across recovery and intervention
    pub max_phase_retries: u32,
}

impl Default for PipelinePolicy {
    fn default() -> Self {
        Self {
            intervention_mode: InterventionMode::Interactive,
            intervention_timeout_ms: None,
            recovery_mode: RecoveryMode::Interactive,
            max_phase_retries: 2,
        }
    }
}

impl PipelinePolicy {
    // ==================== Builder Methods ====================

    pub fn with_intervention_mode(mut self, mode: InterventionMode) -> Self {
        self.intervention_mode = mode;
        self
    }

    pub fn with_intervention_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.intervention_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_recovery_mode(mut self, mode: RecoveryMode) -> Self {
        self.recovery_mode = mode;
        self
    }

    pub fn with_max_phase_retries(mut self, max: u32) -> Self {
        self.max_phase_retries = max;
        self
    }

    /// Fully unattended: auto-continue gates, export partial on failure.
    pub fn unattended() -> Self {
        Self::default()
            .with_intervention_mode(InterventionMode::AutoContinue)
            .with_recovery_mode(RecoveryMode::ExportPartial)
    }

    pub fn gates_enabled(&self) -> bool {
        self.intervention_mode != InterventionMode::Disabled
    }
}
