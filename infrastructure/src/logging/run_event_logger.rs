//! JSONL file writer for run events.
//!
//! Each [`RunEvent`] is serialized as a single JSON line carrying its `type`
//! tag plus a `timestamp`, appended to the file via a buffered writer.

use discovery_application::{RunEvent, RunEventNotifier};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Run-event logger that writes one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes on `Drop`.
pub struct JsonlRunEventLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlRunEventLogger {
    /// Create a new logger writing to the given path.
    ///
    /// Creates the file (and parent directories) if they don't exist.
    /// Returns `None` if the file cannot be created.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create event log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match File::create(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not create event log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RunEventNotifier for JsonlRunEventLogger {
    fn notify(&self, event: &RunEvent) {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        let mut record = match serde_json::to_value(event) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => return,
            Err(e) => {
                warn!("Could not serialize {} event: {}", event.event_type(), e);
                return;
            }
        };
        record.insert(
            "timestamp".to_string(),
            serde_json::Value::String(timestamp),
        );

        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
            // JSONL is append-only; flush so a crash keeps every finished line
            let _ = writer.flush();
        }
    }
}

impl Drop for JsonlRunEventLogger {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_domain::{PhaseId, RunId, RunOutcome, RunStatus};

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_writes_one_typed_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.events.jsonl");
        let logger = JsonlRunEventLogger::new(&path).unwrap();
        let run_id = RunId::new("run-1");

        logger.notify(&RunEvent::RunStarted {
            run_id: run_id.clone(),
            query: "perovskite stability".to_string(),
            phases: vec![PhaseId::new("research")],
        });
        logger.notify(&RunEvent::RunFinished {
            run_id,
            status: RunStatus::Completed,
            outcome: Some(RunOutcome::Completed { degraded: false }),
            elapsed_ms: 1200,
        });
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert_eq!(line["run_id"], "run-1");
            assert!(line["timestamp"].is_string());
        }
        assert_eq!(lines[0]["type"], "run_started");
        assert_eq!(lines[0]["query"], "perovskite stability");
        assert_eq!(lines[1]["type"], "run_finished");
        assert_eq!(lines[1]["elapsed_ms"], 1200);
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("logs").join("events.jsonl");
        let logger = JsonlRunEventLogger::new(&path).unwrap();
        assert_eq!(logger.path(), path.as_path());
        assert!(path.exists());
    }

    #[test]
    fn test_returns_none_when_path_is_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(JsonlRunEventLogger::new(dir.path()).is_none());
    }
}
