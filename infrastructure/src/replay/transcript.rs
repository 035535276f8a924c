//! Recorded transcript format.
//!
//! ```json
//! {
//!   "phases": {
//!     "research": [
//!       { "candidate": {"summary": "..."}, "score": 5.5, "feedback": {"hint": "cite more"} },
//!       { "candidate": {"summary": "..."}, "score": 7.5 }
//!     ]
//!   },
//!   "strategies": {
//!     "literature": [
//!       { "payload": {"claim": "..."}, "scores": [6.0, 7.2, 9.1] }
//!     ]
//!   }
//! }
//! ```
//!
//! A phase turn without `candidate` replays a generation failure; a turn
//! with a candidate but no `score` replays a scoring failure. A hypothesis'
//! `scores[0]` is its seed score, later entries answer successive rescores.
//! A retried racing phase is proposed the strategy's next recorded
//! hypotheses rather than the ones its first attempt raced.

use discovery_domain::Feedback;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transcript {
    /// Generate/score turns per phase id, consumed in order across attempts
    pub phases: HashMap<String, Vec<TranscriptTurn>>,
    /// Proposals per racing strategy, consumed in order across attempts
    pub strategies: HashMap<String, Vec<TranscriptHypothesis>>,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.phases.values().all(Vec::is_empty) && self.strategies.values().all(Vec::is_empty)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptTurn {
    pub candidate: Option<serde_json::Value>,
    pub score: Option<f64>,
    pub feedback: Feedback,
    /// Error message recorded for a failed call
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptHypothesis {
    pub payload: serde_json::Value,
    pub scores: Vec<f64>,
}
