//! Identifiers used across the discovery pipeline.
//!
//! - [`RunId`] - one end-to-end discovery run
//! - [`PhaseId`] - a stage of the pipeline (`research`, `hypothesis`, ...)
//! - [`InterventionId`] - a human checkpoint instance
//! - [`HypothesisId`] - one competitor in a hypothesis race

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Unique identifier for a discovery run.
    RunId
);

string_id!(
    /// Identifier of a pipeline phase, unique within one run.
    PhaseId
);

string_id!(
    /// Identifier of an intervention instance.
    InterventionId
);

string_id!(
    /// Identifier of a racing hypothesis, unique within one race.
    ///
    /// Built from the proposing strategy and its proposal ordinal,
    /// e.g. `"materials-2"`.
    HypothesisId
);

impl RunId {
    /// Generates a fresh random run id.
    pub fn generate() -> Self {
        Self(format!("run-{}", uuid::Uuid::new_v4().simple()))
    }
}

impl InterventionId {
    /// Generates a fresh random intervention id.
    pub fn generate() -> Self {
        Self(format!("iv-{}", uuid::Uuid::new_v4().simple()))
    }
}

impl HypothesisId {
    /// Id for the `ordinal`-th (1-based) proposal of `strategy`.
    pub fn for_proposal(strategy: &str, ordinal: usize) -> Self {
        Self(format!("{}-{}", strategy, ordinal))
    }
}
