//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod control;
pub mod run_discovery;
