/*!
 * Structured event logging.
 *
 * The pipeline emits `{event, payload}` records for everything an operator
 * would want to audit after a run: chat-call failures, parse failures,
 * count mismatches, untranslated detections, judge failures, retry attempts
 * and exhausted retries. Records are appended as JSON lines; the sink can
 * also collect in memory (for tests) or be disabled entirely.
 */

use serde_json::{Value, json};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

enum Sink {
    Disabled,
    File(Mutex<File>),
    Memory(Mutex<Vec<Value>>),
}

/// Structured event sink.
pub struct EventLog {
    sink: Sink,
    path: Option<PathBuf>,
}

impl EventLog {
    /// A sink that drops everything.
    pub fn disabled() -> Self {
        Self {
            sink: Sink::Disabled,
            path: None,
        }
    }

    /// Append events to a JSONL file, creating parent directories as needed.
    pub fn to_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory: {:?}", parent))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file: {:?}", path))?;
        Ok(Self {
            sink: Sink::File(Mutex::new(file)),
            path: Some(path),
        })
    }

    /// Collect events in memory; used by tests.
    pub fn in_memory() -> Self {
        Self {
            sink: Sink::Memory(Mutex::new(Vec::new())),
            path: None,
        }
    }

    /// Path of the backing file, when there is one.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a warning-level event.
    pub fn warn(&self, event: &str, payload: Value) {
        self.write("warn", event, payload);
    }

    /// Record an error-level event.
    pub fn error(&self, event: &str, payload: Value) {
        self.write("error", event, payload);
    }

    /// Collected events; empty unless this is a memory sink.
    pub fn entries(&self) -> Vec<Value> {
        match &self.sink {
            Sink::Memory(entries) => entries.lock().map(|e| e.clone()).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn write(&self, level: &str, event: &str, payload: Value) {
        let entry = json!({
            "timestamp": chrono::Local::now().to_rfc3339(),
            "level": level,
            "event": event,
            "data": payload,
        });
        match &self.sink {
            Sink::Disabled => {}
            Sink::File(file) => {
                if let Ok(mut file) = file.lock() {
                    // A failed log write must never fail the pipeline
                    let _ = writeln!(file, "{entry}");
                }
            }
            Sink::Memory(entries) => {
                if let Ok(mut entries) = entries.lock() {
                    entries.push(entry);
                }
            }
        }
    }
}
