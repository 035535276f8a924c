//! Iteration records and the payloads they carry.

use serde::{Deserialize, Serialize};

/// Opaque artifact produced by the generator.
///
/// The pipeline stores and forwards it but never looks inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Candidate(serde_json::Value);

impl Candidate {
    pub fn new(payload: serde_json::Value) -> Self {
        Self(payload)
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_payload(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for Candidate {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Structured judge feedback for one iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feedback {
    pub what_worked: Vec<String>,
    pub challenges: Vec<String>,
    /// Guidance for the next attempt
    pub hint: Option<String>,
}

impl Feedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_worked(mut self, item: impl Into<String>) -> Self {
        self.what_worked.push(item.into());
        self
    }

    pub fn with_challenge(mut self, item: impl Into<String>) -> Self {
        self.challenges.push(item.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Synthetic feedback for an iteration whose collaborator call failed.
    pub fn collaborator_failure(error: impl Into<String>) -> Self {
        Self {
            what_worked: Vec::new(),
            challenges: vec![error.into()],
            hint: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.what_worked.is_empty() && self.challenges.is_empty() && self.hint.is_none()
    }
}

/// One generate/score cycle within a phase.
///
/// Created once and appended to its phase; never edited afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iteration {
    /// 1-based index within the current attempt
    pub index: u32,
    pub score: f64,
    pub passed: bool,
    pub feedback: Feedback,
    pub duration_ms: u64,
    /// Generated artifact, absent when generation failed
    pub candidate: Option<Candidate>,
    /// Collaborator error that consumed this iteration slot
    pub error: Option<String>,
}

impl Iteration {
    /// An iteration the judge scored. `passed` is decided against the phase threshold.
    pub fn judged(
        index: u32,
        candidate: Candidate,
        score: f64,
        threshold: f64,
        feedback: Feedback,
        duration_ms: u64,
    ) -> Self {
        Self {
            index,
            score,
            passed: score >= threshold,
            feedback,
            duration_ms,
            candidate: Some(candidate),
            error: None,
        }
    }

    /// A non-passing iteration standing in for a failed generator or judge call.
    pub fn collaborator_failure(
        index: u32,
        candidate: Option<Candidate>,
        error: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        let error = error.into();
        Self {
            index,
            score: 0.0,
            passed: false,
            feedback: Feedback::collaborator_failure(error.clone()),
            duration_ms,
            candidate,
            error: Some(error),
        }
    }

    pub fn is_collaborator_failure(&self) -> bool {
        self.error.is_some()
    }
}
