//! Event-stream sink for run progress records.
//!
//! When `--events-stream-to` names a target, the dispatcher and collaborators
//! emit JSON-lines records there. Targets are a file path, a named pipe path,
//! or a descriptor handle (`fd://1`, `fd://2`).

use crate::error::ConfigError;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// One record on the event stream.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        program: String,
        tool: String,
    },
    RunFinished {
        program: String,
        ok: bool,
    },
    ChatTurn {
        program: String,
        turn: u32,
    },
    ServerStarted {
        address: String,
    },
    ServerStopped,
}

/// Envelope written as one JSON line per event.
#[derive(Debug, Clone, Serialize)]
struct EventEnvelope<'a> {
    run_id: &'a str,
    ts_unix_ms: u64,
    #[serde(flatten)]
    event: &'a RunEvent,
}

enum SinkWriter {
    Stdout,
    Stderr,
    File(std::fs::File),
}

impl SinkWriter {
    fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        match self {
            Self::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(line)?;
                out.write_all(b"\n")?;
                out.flush()
            }
            Self::Stderr => {
                let mut err = io::stderr().lock();
                err.write_all(line)?;
                err.write_all(b"\n")?;
                err.flush()
            }
            Self::File(f) => {
                f.write_all(line)?;
                f.write_all(b"\n")?;
                f.flush()
            }
        }
    }
}

/// Shared writable event sink, cloneable across collaborators.
#[derive(Clone)]
pub struct EventSink {
    run_id: String,
    writer: Arc<Mutex<SinkWriter>>,
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

impl EventSink {
    /// Open a sink for the given target string.
    ///
    /// A failure to open is a fatal configuration error for the invocation;
    /// it is never retried.
    pub fn open(target: &str) -> Result<EventSink, ConfigError> {
        let writer = match target {
            "fd://1" => SinkWriter::Stdout,
            "fd://2" => SinkWriter::Stderr,
            other if other.starts_with("fd://") => {
                return Err(ConfigError::EventSink {
                    target: target.to_string(),
                    source: io::Error::new(
                        io::ErrorKind::Unsupported,
                        "only fd://1 and fd://2 descriptor handles are supported",
                    ),
                });
            }
            // Plain files and named pipes both open through the filesystem.
            path => SinkWriter::File(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| ConfigError::EventSink {
                        target: target.to_string(),
                        source,
                    })?,
            ),
        };
        Ok(EventSink {
            run_id: generate_run_id(),
            writer: Arc::new(Mutex::new(writer)),
        })
    }

    /// Identifier stamped on every record from this invocation.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Emit one event as a JSON line. Write failures are logged, not fatal:
    /// the event stream is diagnostics, not the program result.
    pub fn emit(&self, event: &RunEvent) {
        let envelope = EventEnvelope {
            run_id: &self.run_id,
            ts_unix_ms: now_unix_millis(),
            event,
        };
        let line = match serde_json::to_vec(&envelope) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize run event");
                return;
            }
        };
        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        if let Err(e) = writer.write_line(&line) {
            tracing::warn!(error = %e, "failed to write run event");
        }
    }
}

fn generate_run_id() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("run-{hex}")
}

fn now_unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn open_file_target_and_emit_json_lines() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("events.jsonl");
        let sink = EventSink::open(path.to_str().expect("utf-8 path")).expect("open sink");

        sink.emit(&RunEvent::RunStarted {
            program: "demo".into(),
            tool: "greet".into(),
        });
        sink.emit(&RunEvent::RunFinished {
            program: "demo".into(),
            ok: true,
        });

        let raw = fs::read_to_string(&path).expect("read events");
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).expect("json line");
        assert_eq!(first["type"], "run_started");
        assert_eq!(first["run_id"], sink.run_id());
        assert!(first["ts_unix_ms"].as_u64().is_some());
    }

    #[test]
    fn unsupported_descriptor_is_config_error() {
        let err = EventSink::open("fd://7").unwrap_err();
        assert!(err.to_string().contains("fd://7"), "got: {err}");
    }

    #[test]
    fn unopenable_path_is_config_error() {
        let err = EventSink::open("/nonexistent-dir/events.jsonl").unwrap_err();
        assert!(
            err.to_string().starts_with("opening event stream"),
            "got: {err}"
        );
    }

    #[test]
    fn run_ids_are_unique_per_sink() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("events.jsonl");
        let a = EventSink::open(path.to_str().expect("utf-8 path")).expect("open sink");
        let b = EventSink::open(path.to_str().expect("utf-8 path")).expect("open sink");
        assert_ne!(a.run_id(), b.run_id());
    }
}
