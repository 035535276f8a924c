//! Application-level configuration.
//!
//! - [`DiscoveryConfig`] - pipeline phases plus the intervention and recovery policy

pub mod discovery_config;

pub use discovery_config::DiscoveryConfig;
