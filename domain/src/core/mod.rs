//! Core domain concepts shared across all subdomains.
//!
//! - [`ids`] - run, phase, intervention and hypothesis identifiers
//! - [`score`] - score bounds reported by the judge
//! - [`error::DomainError`] - domain-level errors

pub mod error;
pub mod ids;
pub mod score;
