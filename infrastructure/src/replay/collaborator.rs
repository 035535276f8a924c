//! Transcript replay collaborator.
//!
//! Implements [`CollaboratorPort`] by handing back exactly what a recorded
//! transcript contains. Used for deterministic dry runs and audits of past
//! runs; it never invents a candidate or a score.

use super::error::ReplayError;
use super::transcript::{Transcript, TranscriptHypothesis, TranscriptTurn};
use async_trait::async_trait;
use discovery_application::{
    CollaboratorError, CollaboratorPort, GenerationContext, HypothesisProbe, ProposedHypothesis,
    RubricContext, Verdict,
};
use discovery_domain::{Candidate, Feedback, HypothesisId};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

pub struct ReplayCollaborator {
    turns: Mutex<HashMap<String, VecDeque<TranscriptTurn>>>,
    /// Turn whose candidate was handed out and awaits scoring, per phase
    pending: Mutex<HashMap<String, TranscriptTurn>>,
    strategies: HashMap<String, Vec<TranscriptHypothesis>>,
    cursors: Mutex<HashMap<String, StrategyCursor>>,
}

/// Recorded proposals are consumed in order across phase attempts.
#[derive(Debug, Default)]
struct StrategyCursor {
    next: usize,
    /// attempt -> index of its first recorded proposal
    offsets: HashMap<u32, usize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ReplayCollaborator {
    pub fn new(transcript: Transcript) -> Self {
        let turns = transcript
            .phases
            .into_iter()
            .map(|(phase, turns)| (phase, VecDeque::from(turns)))
            .collect();
        Self {
            turns: Mutex::new(turns),
            pending: Mutex::new(HashMap::new()),
            strategies: transcript.strategies,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        let transcript: Transcript = serde_json::from_str(json)?;
        if transcript.is_empty() {
            return Err(ReplayError::Empty);
        }
        Ok(Self::new(transcript))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ReplayError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Turns not yet replayed for `phase`.
    pub fn remaining_turns(&self, phase: &str) -> usize {
        lock(&self.turns).get(phase).map_or(0, VecDeque::len)
    }

    fn recorded_hypothesis(
        &self,
        probe: &HypothesisProbe,
        attempt: u32,
    ) -> Option<&TranscriptHypothesis> {
        let offset = *lock(&self.cursors)
            .get(&probe.strategy)?
            .offsets
            .get(&attempt)?;
        self.strategies
            .get(&probe.strategy)?
            .iter()
            .skip(offset)
            .enumerate()
            .find(|(i, _)| HypothesisId::for_proposal(&probe.strategy, i + 1) == probe.id)
            .map(|(_, h)| h)
    }
}

#[async_trait]
impl CollaboratorPort for ReplayCollaborator {
    async fn generate(
        &self,
        context: &GenerationContext,
        _prior_feedback: Option<&Feedback>,
    ) -> Result<Candidate, CollaboratorError> {
        let phase = context.phase_id.as_str();
        let turn = lock(&self.turns)
            .get_mut(phase)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| CollaboratorError::Exhausted(format!("phase {}", phase)))?;
        debug!(phase, iteration = context.iteration, "Replaying generation");

        let Some(candidate) = turn.candidate.clone() else {
            let message = turn
                .error
                .unwrap_or_else(|| "recorded generation failure".to_string());
            return Err(CollaboratorError::GenerationFailed(message));
        };
        lock(&self.pending).insert(phase.to_string(), turn);
        Ok(Candidate::new(candidate))
    }

    async fn score(
        &self,
        _candidate: &Candidate,
        rubric: &RubricContext,
    ) -> Result<Verdict, CollaboratorError> {
        let phase = rubric.phase_id.as_str();
        let turn = lock(&self.pending).remove(phase).ok_or_else(|| {
            CollaboratorError::Other(format!("no replayed candidate awaiting a score in {}", phase))
        })?;
        match turn.score {
            Some(value) => Ok(Verdict {
                value,
                passed: value >= rubric.pass_threshold,
                feedback: turn.feedback,
            }),
            None => Err(CollaboratorError::ScoringFailed(
                turn.error
                    .unwrap_or_else(|| "recorded scoring failure".to_string()),
            )),
        }
    }

    async fn propose_hypotheses(
        &self,
        strategy: &str,
        context: &GenerationContext,
        count: u32,
    ) -> Result<Vec<ProposedHypothesis>, CollaboratorError> {
        let exhausted = || CollaboratorError::Exhausted(format!("strategy {}", strategy));
        let recorded = self.strategies.get(strategy).ok_or_else(exhausted)?;

        let mut cursors = lock(&self.cursors);
        let cursor = cursors.entry(strategy.to_string()).or_default();
        let offset = match cursor.offsets.get(&context.attempt) {
            Some(offset) => *offset,
            None => {
                let offset = cursor.next;
                let taken = recorded.len().saturating_sub(offset).min(count as usize);
                if taken == 0 {
                    return Err(exhausted());
                }
                cursor.next = offset + taken;
                cursor.offsets.insert(context.attempt, offset);
                offset
            }
        };
        debug!(strategy, attempt = context.attempt, offset, "Replaying proposals");

        Ok(recorded
            .iter()
            .skip(offset)
            .take(count as usize)
            .map(|h| ProposedHypothesis {
                payload: Candidate::new(h.payload.clone()),
                // A missing seed score surfaces as an invalid proposal.
                initial_score: h.scores.first().copied().unwrap_or(f64::NAN),
            })
            .collect())
    }

    async fn rescore_hypothesis(
        &self,
        probe: &HypothesisProbe,
        context: &GenerationContext,
    ) -> Result<f64, CollaboratorError> {
        let recorded = self
            .recorded_hypothesis(probe, context.attempt)
            .ok_or_else(|| CollaboratorError::Exhausted(format!("hypothesis {}", probe.id)))?;
        // history holds the seed plus one entry per completed round
        recorded
            .scores
            .get(probe.history.len())
            .copied()
            .ok_or_else(|| {
                CollaboratorError::Exhausted(format!(
                    "hypothesis {} round {}",
                    probe.id, probe.iteration
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_domain::{PhaseId, RunId};
    use serde_json::json;

    const TRANSCRIPT: &str = r#"{
        "phases": {
            "research": [
                {"error": "upstream timeout"},
                {"candidate": {"summary": "draft"}, "error": "judge offline"},
                {"candidate": {"summary": "final"}, "score": 7.5, "feedback": {"hint": "good"}}
            ]
        },
        "strategies": {
            "literature": [
                {"payload": {"claim": "a"}, "scores": [6.0, 7.0]},
                {"payload": {"claim": "b"}, "scores": [5.5]}
            ]
        }
    }"#;

    fn context(phase: &str) -> GenerationContext {
        GenerationContext {
            run_id: RunId::new("run-1"),
            query: "q".to_string(),
            phase_id: PhaseId::new(phase),
            phase_name: phase.to_string(),
            iteration: 1,
            attempt: 1,
            accepted: vec![],
            guidance: None,
        }
    }

    fn rubric(phase: &str) -> RubricContext {
        RubricContext {
            query: "q".to_string(),
            phase_id: PhaseId::new(phase),
            phase_name: phase.to_string(),
            pass_threshold: 7.0,
            iteration: 1,
        }
    }

    #[tokio::test]
    async fn test_replays_turns_in_order() {
        let replay = ReplayCollaborator::from_json(TRANSCRIPT).unwrap();
        let ctx = context("research");

        let err = replay.generate(&ctx, None).await.unwrap_err();
        assert_eq!(
            err,
            CollaboratorError::GenerationFailed("upstream timeout".to_string())
        );

        let draft = replay.generate(&ctx, None).await.unwrap();
        assert_eq!(draft.payload(), &json!({"summary": "draft"}));
        assert!(matches!(
            replay.score(&draft, &rubric("research")).await,
            Err(CollaboratorError::ScoringFailed(_))
        ));

        let final_candidate = replay.generate(&ctx, None).await.unwrap();
        let verdict = replay
            .score(&final_candidate, &rubric("research"))
            .await
            .unwrap();
        assert_eq!(verdict.value, 7.5);
        assert!(verdict.passed);
        assert_eq!(verdict.feedback.hint.as_deref(), Some("good"));

        assert_eq!(replay.remaining_turns("research"), 0);
        assert!(matches!(
            replay.generate(&ctx, None).await,
            Err(CollaboratorError::Exhausted(_))
        ));
    }

    #[tokio::test]
    async fn test_replays_hypothesis_scores() {
        let replay = ReplayCollaborator::from_json(TRANSCRIPT).unwrap();
        let ctx = context("hypothesis");

        let proposed = replay.propose_hypotheses("literature", &ctx, 5).await.unwrap();
        assert_eq!(proposed.len(), 2);
        assert_eq!(proposed[0].initial_score, 6.0);

        let probe = HypothesisProbe {
            id: HypothesisId::for_proposal("literature", 1),
            strategy: "literature".to_string(),
            payload: proposed[0].payload.clone(),
            score: 6.0,
            history: vec![6.0],
            iteration: 2,
        };
        assert_eq!(replay.rescore_hypothesis(&probe, &ctx).await.unwrap(), 7.0);

        let exhausted = HypothesisProbe {
            history: vec![6.0, 7.0],
            iteration: 3,
            ..probe
        };
        assert!(replay.rescore_hypothesis(&exhausted, &ctx).await.is_err());
        assert!(replay.propose_hypotheses("process", &ctx, 2).await.is_err());
    }

    #[tokio::test]
    async fn test_retried_race_consumes_next_proposals() {
        let replay = ReplayCollaborator::from_json(
            r#"{
                "strategies": {
                    "literature": [
                        {"payload": {"claim": "a"}, "scores": [6.0, 6.5]},
                        {"payload": {"claim": "b"}, "scores": [5.5, 5.0]},
                        {"payload": {"claim": "c"}, "scores": [7.0, 9.5]}
                    ]
                }
            }"#,
        )
        .unwrap();
        let first = context("hypothesis");
        let retry = GenerationContext {
            attempt: 2,
            ..first.clone()
        };

        let proposed = replay.propose_hypotheses("literature", &first, 2).await.unwrap();
        assert_eq!(proposed.len(), 2);
        // asking again within the same attempt replays the same proposals
        let again = replay.propose_hypotheses("literature", &first, 2).await.unwrap();
        assert_eq!(again[0].payload, proposed[0].payload);

        let retried = replay.propose_hypotheses("literature", &retry, 2).await.unwrap();
        assert_eq!(retried.len(), 1);
        assert_eq!(retried[0].payload.payload(), &json!({"claim": "c"}));
        assert_eq!(retried[0].initial_score, 7.0);

        let probe = HypothesisProbe {
            id: HypothesisId::for_proposal("literature", 1),
            strategy: "literature".to_string(),
            payload: retried[0].payload.clone(),
            score: 7.0,
            history: vec![7.0],
            iteration: 2,
        };
        assert_eq!(replay.rescore_hypothesis(&probe, &retry).await.unwrap(), 9.5);
        assert_eq!(replay.rescore_hypothesis(&probe, &first).await.unwrap(), 6.5);

        let third = GenerationContext {
            attempt: 3,
            ..first
        };
        assert!(matches!(
            replay.propose_hypotheses("literature", &third, 2).await,
            Err(CollaboratorError::Exhausted(_))
        ));
    }

    #[test]
    fn test_empty_transcript_rejected() {
        assert!(matches!(
            ReplayCollaborator::from_json("{}"),
            Err(ReplayError::Empty)
        ));
        assert!(matches!(
            ReplayCollaborator::from_json("not json"),
            Err(ReplayError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ReplayCollaborator::from_file(dir.path().join("absent.json")),
            Err(ReplayError::Read { .. })
        ));
    }
}
