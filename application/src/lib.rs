//! Application layer for discovery-pipeline
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::DiscoveryConfig;
pub use ports::{
    collaborator::{
        CollaboratorError, CollaboratorPort, GenerationContext, HypothesisProbe,
        ProposedHypothesis, RubricContext, Verdict,
    },
    run_events::{ChannelRunEvents, CompositeRunEvents, NoRunEvents, RunEvent, RunEventNotifier},
};
pub use use_cases::control::{ControlAck, ControlError, DiscoveryHandle, RunControl, RunRegistry};
pub use use_cases::run_discovery::{RunDiscoveryError, RunDiscoveryInput, RunDiscoveryUseCase};
