//! Inbound control surface for running discoveries.
//!
//! The orchestrating task owns its [`DiscoveryRun`]; nothing outside it
//! mutates run state. Requests from the outside reach it through a shared
//! [`ControlBoard`], which hands each pending decision to the waiting task
//! through a oneshot channel.
//!
//! ```text
//! RunControl::respond_to_intervention()          orchestrator (gate)
//!            |                                         |
//!            +----> ControlBoard (slot per id) ---> oneshot rx
//!                       Open -> Resolved                |
//!                                            timeout -> expire()
//! ```
//!
//! Every slot is resolved exactly once. Whoever flips it from `Open` to
//! `Resolved` first wins; later requests get [`ControlAck::AlreadyResolved`].

use crate::use_cases::run_discovery::RunDiscoveryError;
use discovery_domain::{
    DiscoveryRun, FailureReport, FailureResolution, HypothesisId, Intervention,
    InterventionAction, InterventionId, InterventionResponse, PhaseId, ResponseRejection, RunId,
    RunSnapshot,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Result of an accepted control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAck {
    Applied,
    /// The target was already resolved; nothing changed
    AlreadyResolved,
}

/// Invalid control request. Run state is left unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    #[error("Unknown run: {0}")]
    UnknownRun(RunId),

    #[error("Unknown intervention: {0}")]
    UnknownIntervention(InterventionId),

    #[error("Unknown phase: {0}")]
    UnknownPhase(PhaseId),

    #[error("Phase {0} is not waiting for a failure decision")]
    PhaseNotFailed(PhaseId),

    #[error("Intervention {intervention} does not offer {action}")]
    ActionNotOffered {
        intervention: InterventionId,
        action: InterventionAction,
    },

    #[error("Intervention {0} only accepts a hypothesis selection with continue")]
    SelectionNotAllowed(InterventionId),

    #[error("Hypothesis {0} is not selectable")]
    UnknownHypothesis(HypothesisId),

    #[error("Phase {phase} already used its {max} retries")]
    RetryLimitReached { phase: PhaseId, max: u32 },

    #[error("Modified query cannot be empty")]
    EmptyQuery,
}

impl ControlError {
    fn from_rejection(intervention: &InterventionId, rejection: ResponseRejection) -> Self {
        match rejection {
            ResponseRejection::ActionNotOffered(action) => ControlError::ActionNotOffered {
                intervention: intervention.clone(),
                action,
            },
            ResponseRejection::SelectionNotAllowed => {
                ControlError::SelectionNotAllowed(intervention.clone())
            }
            ResponseRejection::UnknownHypothesis(id) => ControlError::UnknownHypothesis(id),
        }
    }
}

enum InterventionSlot {
    Open {
        intervention: Intervention,
        tx: oneshot::Sender<InterventionResponse>,
    },
    Resolved,
}

enum FailureSlot {
    Open {
        report: FailureReport,
        tx: oneshot::Sender<FailureResolution>,
    },
    Resolved,
}

#[derive(Default)]
struct BoardState {
    interventions: HashMap<InterventionId, InterventionSlot>,
    failures: HashMap<PhaseId, FailureSlot>,
}

/// Pending decisions of one run, shared by the run task and its controls.
pub(crate) struct ControlBoard {
    phases: Vec<PhaseId>,
    state: Mutex<BoardState>,
}

impl ControlBoard {
    pub(crate) fn new(phases: Vec<PhaseId>) -> Self {
        Self {
            phases,
            state: Mutex::new(BoardState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, BoardState> {
        // A poisoned board still holds consistent slots: every mutation is a
        // single insert or replace.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ==================== Run task side ====================

    pub(crate) fn open_intervention(
        &self,
        intervention: Intervention,
        tx: oneshot::Sender<InterventionResponse>,
    ) {
        let id = intervention.id.clone();
        self.state()
            .interventions
            .insert(id, InterventionSlot::Open { intervention, tx });
    }

    /// Resolve an open intervention on behalf of the system.
    ///
    /// Returns `false` when a user response got there first; that response
    /// is then waiting in the receiver.
    pub(crate) fn expire_intervention(&self, id: &InterventionId) -> bool {
        let mut state = self.state();
        match state.interventions.get(id) {
            Some(InterventionSlot::Open { .. }) => {
                state
                    .interventions
                    .insert(id.clone(), InterventionSlot::Resolved);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn open_failure(&self, report: FailureReport, tx: oneshot::Sender<FailureResolution>) {
        let phase = report.phase_id.clone();
        self.state()
            .failures
            .insert(phase, FailureSlot::Open { report, tx });
    }

    pub(crate) fn close_failure(&self, phase: &PhaseId) {
        self.state()
            .failures
            .insert(phase.clone(), FailureSlot::Resolved);
    }

    // ==================== Control side ====================

    fn respond_to_intervention(
        &self,
        id: &InterventionId,
        response: InterventionResponse,
    ) -> Result<ControlAck, ControlError> {
        let mut state = self.state();
        let intervention = match state.interventions.get(id) {
            None => return Err(ControlError::UnknownIntervention(id.clone())),
            Some(InterventionSlot::Resolved) => return Ok(ControlAck::AlreadyResolved),
            Some(InterventionSlot::Open { intervention, .. }) => intervention,
        };
        intervention
            .validate_response(&response)
            .map_err(|rejection| ControlError::from_rejection(id, rejection))?;

        match state.interventions.insert(id.clone(), InterventionSlot::Resolved) {
            Some(InterventionSlot::Open { tx, .. }) => {
                // Receiver gone means the run stopped waiting (cancelled).
                let _ = tx.send(response);
                Ok(ControlAck::Applied)
            }
            _ => Ok(ControlAck::AlreadyResolved),
        }
    }

    fn respond_to_failure(
        &self,
        phase: &PhaseId,
        resolution: FailureResolution,
    ) -> Result<ControlAck, ControlError> {
        let mut state = self.state();
        let report = match state.failures.get(phase) {
            None if self.phases.contains(phase) => {
                return Err(ControlError::PhaseNotFailed(phase.clone()));
            }
            None => return Err(ControlError::UnknownPhase(phase.clone())),
            Some(FailureSlot::Resolved) => return Ok(ControlAck::AlreadyResolved),
            Some(FailureSlot::Open { report, .. }) => report,
        };
        match &resolution {
            FailureResolution::RetryPhase if report.retries_remaining == 0 => {
                return Err(ControlError::RetryLimitReached {
                    phase: phase.clone(),
                    max: report.retries_used + report.retries_remaining,
                });
            }
            FailureResolution::ModifyQuery { query } if query.trim().is_empty() => {
                return Err(ControlError::EmptyQuery);
            }
            _ => {}
        }

        match state.failures.insert(phase.clone(), FailureSlot::Resolved) {
            Some(FailureSlot::Open { tx, .. }) => {
                let _ = tx.send(resolution);
                Ok(ControlAck::Applied)
            }
            _ => Ok(ControlAck::AlreadyResolved),
        }
    }

    fn knows_intervention(&self, id: &InterventionId) -> bool {
        self.state().interventions.contains_key(id)
    }
}

/// Cloneable handle for observing and steering one run.
#[derive(Clone)]
pub struct RunControl {
    run_id: RunId,
    board: Arc<ControlBoard>,
    snapshots: watch::Receiver<RunSnapshot>,
    cancel: CancellationToken,
}

impl RunControl {
    pub(crate) fn new(
        run_id: RunId,
        board: Arc<ControlBoard>,
        snapshots: watch::Receiver<RunSnapshot>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            run_id,
            board,
            snapshots,
            cancel,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> RunSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that is notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.snapshots.clone()
    }

    pub fn respond_to_intervention(
        &self,
        id: &InterventionId,
        response: InterventionResponse,
    ) -> Result<ControlAck, ControlError> {
        let ack = self.board.respond_to_intervention(id, response)?;
        debug!(run = %self.run_id, intervention = %id, ?ack, "Intervention response");
        Ok(ack)
    }

    pub fn respond_to_failure(
        &self,
        phase: &PhaseId,
        resolution: FailureResolution,
    ) -> Result<ControlAck, ControlError> {
        let ack = self.board.respond_to_failure(phase, resolution)?;
        debug!(run = %self.run_id, phase = %phase, ?ack, "Failure resolution");
        Ok(ack)
    }

    /// Request cancellation. Takes effect at the next iteration or gate
    /// boundary; an in-flight collaborator call is allowed to finish.
    pub fn cancel(&self) -> ControlAck {
        if self.cancel.is_cancelled() || self.snapshots.borrow().run.status().is_terminal() {
            return ControlAck::AlreadyResolved;
        }
        info!(run = %self.run_id, "Cancellation requested");
        self.cancel.cancel();
        ControlAck::Applied
    }

    fn knows_intervention(&self, id: &InterventionId) -> bool {
        self.board.knows_intervention(id)
    }
}

/// A started run: its control plus the orchestrating task.
pub struct DiscoveryHandle {
    control: RunControl,
    task: JoinHandle<Result<DiscoveryRun, RunDiscoveryError>>,
}

impl DiscoveryHandle {
    pub(crate) fn new(
        control: RunControl,
        task: JoinHandle<Result<DiscoveryRun, RunDiscoveryError>>,
    ) -> Self {
        Self { control, task }
    }

    pub fn run_id(&self) -> &RunId {
        self.control.run_id()
    }

    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    /// Wait for the run to reach a terminal state.
    pub async fn wait(self) -> Result<DiscoveryRun, RunDiscoveryError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(RunDiscoveryError::TaskFailed(e.to_string())),
        }
    }
}

/// Routes control requests to many concurrent runs.
#[derive(Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<RunId, RunControl>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn runs(&self) -> MutexGuard<'_, HashMap<RunId, RunControl>> {
        self.runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, control: RunControl) {
        self.runs().insert(control.run_id().clone(), control);
    }

    pub fn remove(&self, run_id: &RunId) -> Option<RunControl> {
        self.runs().remove(run_id)
    }

    pub fn get(&self, run_id: &RunId) -> Result<RunControl, ControlError> {
        self.runs()
            .get(run_id)
            .cloned()
            .ok_or_else(|| ControlError::UnknownRun(run_id.clone()))
    }

    pub fn run_ids(&self) -> Vec<RunId> {
        let mut ids: Vec<RunId> = self.runs().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn snapshot(&self, run_id: &RunId) -> Result<RunSnapshot, ControlError> {
        Ok(self.get(run_id)?.snapshot())
    }

    pub fn cancel_run(&self, run_id: &RunId) -> Result<ControlAck, ControlError> {
        Ok(self.get(run_id)?.cancel())
    }

    /// Intervention ids are globally unique, so no run id is needed.
    pub fn respond_to_intervention(
        &self,
        id: &InterventionId,
        response: InterventionResponse,
    ) -> Result<ControlAck, ControlError> {
        let control = self
            .runs()
            .values()
            .find(|c| c.knows_intervention(id))
            .cloned()
            .ok_or_else(|| ControlError::UnknownIntervention(id.clone()))?;
        control.respond_to_intervention(id, response)
    }

    pub fn respond_to_failure(
        &self,
        run_id: &RunId,
        phase: &PhaseId,
        resolution: FailureResolution,
    ) -> Result<ControlAck, ControlError> {
        self.get(run_id)?.respond_to_failure(phase, resolution)
    }
}
