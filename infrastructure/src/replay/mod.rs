//! Transcript replay: a [`CollaboratorPort`](discovery_application::CollaboratorPort)
//! backed by a recorded JSON transcript.

mod collaborator;
mod error;
mod transcript;

pub use collaborator::ReplayCollaborator;
pub use error::ReplayError;
pub use transcript::{Transcript, TranscriptHypothesis, TranscriptTurn};
