//! Logging infrastructure: structured run-event logging.
//!
//! Provides [`JsonlRunEventLogger`], a JSONL file writer that implements
//! the [`RunEventNotifier`](discovery_application::RunEventNotifier) port.

mod run_event_logger;

pub use run_event_logger::JsonlRunEventLogger;
