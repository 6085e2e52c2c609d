//! Run event log as JSON lines inside the run folder.
//!
//! Bring-up writes `<base>/orchestrate.jsonl` recording what was created and
//! which command went to which pane, so a run folder explains how it was
//! started long after the tmux session is gone.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use tracing::debug;

use crate::error::{LaunchError, LaunchResult};

pub const RUN_LOG_FILE: &str = "orchestrate.jsonl";

/// A structured event in the run log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// RFC 3339 timestamp.
    pub timestamp: String,
    #[serde(flatten)]
    pub event: LogEvent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum LogEvent {
    RunFolderCreated {
        run_identifier: String,
        base_path: String,
        instances: Vec<String>,
    },
    AcquisitionConfigStaged { source: String, destination: String },
    ConfigMaterialized {
        document: String,
        input_file: String,
        log_file: String,
    },
    PaneCreated { role: String, pane: String },
    CommandSent {
        role: String,
        pane: String,
        command: String,
    },
    SessionReady { session: String },
}

/// Append-only writer for the run log.
pub struct RunLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl RunLog {
    /// Open (or create) the log at `path`, appending to existing content.
    pub fn new(path: &Path) -> LaunchResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LaunchError::io(format!("failed to create log directory: {}", parent.display()), e)
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| LaunchError::io(format!("failed to open log file: {}", path.display()), e))?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn in_run_folder(base_path: &Path) -> LaunchResult<Self> {
        Self::new(&base_path.join(RUN_LOG_FILE))
    }

    pub fn log(&self, event: LogEvent) -> LaunchResult<()> {
        let entry = LogEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            event,
        };

        let json = serde_json::to_string(&entry).map_err(|e| {
            LaunchError::io("failed to serialize log entry", std::io::Error::other(e))
        })?;

        debug!(event = %json, "run log");

        let write_err = |e: std::io::Error| LaunchError::io(format!("failed to write {}", self.path.display()), e);
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| write_err(std::io::Error::other("run log writer poisoned")))?;
        writeln!(writer, "{json}").map_err(write_err)?;
        writer.flush().map_err(write_err)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_entry_serializes_with_tag_and_data() {
        let entry = LogEntry {
            timestamp: "2026-10-18T09:00:00+00:00".to_string(),
            event: LogEvent::PaneCreated {
                role: "monitor-a".to_string(),
                pane: "%2".to_string(),
            },
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"event\":\"pane_created\""));
        assert!(json.contains("\"data\":{\"role\":\"monitor-a\",\"pane\":\"%2\"}"));
        assert!(json.contains("\"timestamp\":\"2026-10-18T09:00:00+00:00\""));
    }

    #[test]
    fn write_and_read_log_file() {
        let tmp = tempfile::tempdir().unwrap();
        let log = RunLog::in_run_folder(tmp.path()).unwrap();
        assert_eq!(log.path(), tmp.path().join(RUN_LOG_FILE));

        log.log(LogEvent::RunFolderCreated {
            run_identifier: "42".to_string(),
            base_path: "/data/000042".to_string(),
            instances: vec!["daq00".to_string(), "daq01".to_string()],
        })
        .unwrap();
        log.log(LogEvent::CommandSent {
            role: "acquisition-a".to_string(),
            pane: "%0".to_string(),
            command: "cd /data/000042/daq00 && wavedump WaveDumpConfig_USB0.txt".to_string(),
        })
        .unwrap();
        log.log(LogEvent::SessionReady {
            session: "caen_daq".to_string(),
        })
        .unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        for line in &lines {
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            let ts = parsed["timestamp"].as_str().unwrap();
            assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
        }
        assert!(lines[0].contains("\"event\":\"run_folder_created\""));
        assert!(lines[1].contains("\"event\":\"command_sent\""));
        assert!(lines[2].contains("\"event\":\"session_ready\""));
    }

    #[test]
    fn appends_to_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("append.jsonl");

        for session in ["first", "second"] {
            let log = RunLog::new(&path).unwrap();
            log.log(LogEvent::SessionReady {
                session: session.to_string(),
            })
            .unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
