//! Intervention checkpoints: points where a run waits for a human.
//!
//! An [`Intervention`] is raised after a phase completes (review) or after a
//! failing iteration (escalation). It offers a fixed option set; the first
//! [`InterventionResponse`] to arrive resolves it, and the resolution is kept
//! as an [`InterventionRecord`] with its [`ResolutionSource`].

use crate::core::ids::{HypothesisId, InterventionId, PhaseId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    /// Blocking approval; never times out
    ApprovalRequired,
    ReviewRecommended,
    EscalationAvailable,
}

impl InterventionKind {
    pub fn as_str(&self) -> &str {
        match self {
            InterventionKind::ApprovalRequired => "approval_required",
            InterventionKind::ReviewRecommended => "review_recommended",
            InterventionKind::EscalationAvailable => "escalation_available",
        }
    }
}

impl fmt::Display for InterventionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionAction {
    Continue,
    Retry,
    Skip,
    Modify,
    Escalate,
}

impl InterventionAction {
    pub fn as_str(&self) -> &str {
        match self {
            InterventionAction::Continue => "continue",
            InterventionAction::Retry => "retry",
            InterventionAction::Skip => "skip",
            InterventionAction::Modify => "modify",
            InterventionAction::Escalate => "escalate",
        }
    }
}

impl fmt::Display for InterventionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for InterventionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continue" | "c" => Ok(InterventionAction::Continue),
            "retry" | "r" => Ok(InterventionAction::Retry),
            "skip" | "s" => Ok(InterventionAction::Skip),
            "modify" | "m" => Ok(InterventionAction::Modify),
            "escalate" | "e" => Ok(InterventionAction::Escalate),
            _ => Err(format!("Invalid InterventionAction: {}", s)),
        }
    }
}

/// Where in the run the checkpoint sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "at", rename_all = "snake_case")]
pub enum InterventionPoint {
    AfterPhase,
    AfterIteration { iteration: u32 },
}

/// A pending human checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub id: InterventionId,
    pub kind: InterventionKind,
    pub phase_id: PhaseId,
    pub point: InterventionPoint,
    pub options: Vec<InterventionAction>,
    /// Auto-continue after this many milliseconds
    pub timeout_ms: Option<u64>,
    /// Hypotheses a reviewer may carry forward (racing phases only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selectable: Vec<HypothesisId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalated_from: Option<InterventionId>,
}

impl Intervention {
    /// Review checkpoint after a completed phase.
    ///
    /// `approval_required` checkpoints ignore `timeout_ms`.
    pub fn after_phase(
        phase_id: PhaseId,
        kind: InterventionKind,
        timeout_ms: Option<u64>,
        selectable: Vec<HypothesisId>,
    ) -> Self {
        use InterventionAction::*;
        let (options, timeout_ms) = match kind {
            InterventionKind::ApprovalRequired => (vec![Continue, Retry, Modify], None),
            _ => (vec![Continue, Retry, Modify, Escalate], timeout_ms),
        };
        Self {
            id: InterventionId::generate(),
            kind,
            phase_id,
            point: InterventionPoint::AfterPhase,
            options,
            timeout_ms,
            selectable,
            escalated_from: None,
        }
    }

    /// Escalation checkpoint after a failing, non-final iteration.
    pub fn after_iteration(
        phase_id: PhaseId,
        iteration: u32,
        timeout_ms: Option<u64>,
        selectable: Vec<HypothesisId>,
    ) -> Self {
        use InterventionAction::*;
        Self {
            id: InterventionId::generate(),
            kind: InterventionKind::EscalationAvailable,
            phase_id,
            point: InterventionPoint::AfterIteration { iteration },
            options: vec![Continue, Skip, Modify, Escalate],
            timeout_ms,
            selectable,
            escalated_from: None,
        }
    }

    /// Re-open this checkpoint as a blocking approval.
    pub fn escalate(&self) -> Self {
        Self {
            id: InterventionId::generate(),
            kind: InterventionKind::ApprovalRequired,
            phase_id: self.phase_id.clone(),
            point: self.point,
            options: self
                .options
                .iter()
                .copied()
                .filter(|a| *a != InterventionAction::Escalate)
                .collect(),
            timeout_ms: None,
            selectable: self.selectable.clone(),
            escalated_from: Some(self.id.clone()),
        }
    }

    /// Drop `actions` from the option set.
    pub fn without(mut self, actions: &[InterventionAction]) -> Self {
        self.options.retain(|a| !actions.contains(a));
        self
    }

    pub fn offers(&self, action: InterventionAction) -> bool {
        self.options.contains(&action)
    }

    /// Check a response against the offered options and selectable ids.
    pub fn validate_response(&self, response: &InterventionResponse) -> Result<(), ResponseRejection> {
        if !self.offers(response.action) {
            return Err(ResponseRejection::ActionNotOffered(response.action));
        }
        if response.selected_ids.is_empty() {
            return Ok(());
        }
        if self.selectable.is_empty() || response.action != InterventionAction::Continue {
            return Err(ResponseRejection::SelectionNotAllowed);
        }
        if let Some(unknown) = response
            .selected_ids
            .iter()
            .find(|id| !self.selectable.contains(id))
        {
            return Err(ResponseRejection::UnknownHypothesis(unknown.clone()));
        }
        Ok(())
    }
}

/// Why a response was refused.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResponseRejection {
    #[error("Action {0} is not offered by this intervention")]
    ActionNotOffered(InterventionAction),

    #[error("Hypothesis selection is only allowed when continuing a racing phase")]
    SelectionNotAllowed,

    #[error("Hypothesis {0} is not selectable")]
    UnknownHypothesis(HypothesisId),
}

/// One chosen action plus optional comment and carried hypotheses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionResponse {
    pub action: InterventionAction,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected_ids: Vec<HypothesisId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl InterventionResponse {
    pub fn new(action: InterventionAction) -> Self {
        Self {
            action,
            selected_ids: Vec::new(),
            comment: None,
        }
    }

    pub fn proceed() -> Self {
        Self::new(InterventionAction::Continue)
    }

    pub fn with_selection(mut self, ids: Vec<HypothesisId>) -> Self {
        self.selected_ids = ids;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    User,
    /// Policy or timeout
    System,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionSource::User => write!(f, "user"),
            ResolutionSource::System => write!(f, "system"),
        }
    }
}

/// Audit entry for a resolved checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionRecord {
    pub intervention: Intervention,
    pub response: InterventionResponse,
    pub source: ResolutionSource,
    pub waited_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn racing_review() -> Intervention {
        Intervention::after_phase(
            PhaseId::new("hypothesis"),
            InterventionKind::ReviewRecommended,
            Some(5000),
            vec![HypothesisId::new("literature-1"), HypothesisId::new("process-2")],
        )
    }

    #[test]
    fn test_review_options() {
        let iv = racing_review();
        assert_eq!(iv.options.len(), 4);
        assert!(iv.offers(InterventionAction::Escalate));
        assert!(!iv.offers(InterventionAction::Skip));
        assert_eq!(iv.timeout_ms, Some(5000));
    }

    #[test]
    fn test_approval_required_never_times_out() {
        let iv = Intervention::after_phase(
            PhaseId::new("validation"),
            InterventionKind::ApprovalRequired,
            Some(5000),
            vec![],
        );
        assert!(iv.timeout_ms.is_none());
        assert!(!iv.offers(InterventionAction::Escalate));
    }

    #[test]
    fn test_escalate_reopens_as_approval() {
        let iv = Intervention::after_iteration(PhaseId::new("research"), 2, Some(1000), vec![]);
        let escalated = iv.escalate();
        assert_eq!(escalated.kind, InterventionKind::ApprovalRequired);
        assert_ne!(escalated.id, iv.id);
        assert_eq!(escalated.escalated_from.as_ref(), Some(&iv.id));
        assert!(escalated.timeout_ms.is_none());
        assert!(!escalated.offers(InterventionAction::Escalate));
        assert!(escalated.offers(InterventionAction::Skip));
        assert_eq!(escalated.point, InterventionPoint::AfterIteration { iteration: 2 });
    }

    #[test]
    fn test_without_drops_options() {
        let iv = racing_review().without(&[InterventionAction::Retry, InterventionAction::Modify]);
        assert_eq!(
            iv.options,
            vec![InterventionAction::Continue, InterventionAction::Escalate]
        );
    }

    #[test]
    fn test_validate_rejects_unoffered_action() {
        let iv = racing_review();
        let response = InterventionResponse::new(InterventionAction::Skip);
        assert_eq!(
            iv.validate_response(&response),
            Err(ResponseRejection::ActionNotOffered(InterventionAction::Skip))
        );
    }

    #[test]
    fn test_validate_selection() {
        let iv = racing_review();
        let ok = InterventionResponse::proceed().with_selection(vec![HypothesisId::new("process-2")]);
        assert!(iv.validate_response(&ok).is_ok());

        let bad = InterventionResponse::proceed().with_selection(vec![HypothesisId::new("nope-9")]);
        assert_eq!(
            iv.validate_response(&bad),
            Err(ResponseRejection::UnknownHypothesis(HypothesisId::new("nope-9")))
        );
    }

    #[test]
    fn test_selection_not_allowed_without_race() {
        let iv = Intervention::after_phase(
            PhaseId::new("validation"),
            InterventionKind::ReviewRecommended,
            None,
            vec![],
        );
        let response = InterventionResponse::proceed().with_selection(vec![HypothesisId::new("x-1")]);
        assert_eq!(
            iv.validate_response(&response),
            Err(ResponseRejection::SelectionNotAllowed)
        );
    }

    #[test]
    fn test_selection_only_with_continue() {
        let iv = racing_review();
        for action in [
            InterventionAction::Retry,
            InterventionAction::Modify,
            InterventionAction::Escalate,
        ] {
            let response = InterventionResponse::new(action)
                .with_selection(vec![HypothesisId::new("process-2")]);
            assert_eq!(
                iv.validate_response(&response),
                Err(ResponseRejection::SelectionNotAllowed),
                "{} with a selection",
                action
            );
        }
    }

    #[test]
    fn test_action_from_str() {
        assert_eq!("Continue".parse::<InterventionAction>().ok(), Some(InterventionAction::Continue));
        assert_eq!("e".parse::<InterventionAction>().ok(), Some(InterventionAction::Escalate));
        assert!("abort".parse::<InterventionAction>().is_err());
    }
}
