use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

use super::{LogEnvelope, LogEvent};

#[derive(Debug, Error)]
pub enum LogSinkError {
    #[error("failed to open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write log line: {0}")]
    Write(#[from] std::io::Error),

    #[error("failed to serialize log event: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Line format of the run log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// The plain human-readable message, one per line.
    #[default]
    Text,
    /// One JSON object per line with an RFC 3339 timestamp.
    Json,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    timestamp: String,
    #[serde(flatten)]
    event: &'a LogEvent,
}

impl LogFormat {
    /// Render one envelope as a single line, without the trailing newline.
    pub fn render(&self, envelope: &LogEnvelope) -> Result<String, LogSinkError> {
        match self {
            LogFormat::Text => Ok(envelope.event.to_string()),
            LogFormat::Json => Ok(serde_json::to_string(&JsonLine {
                timestamp: envelope.timestamp.to_rfc3339(),
                event: &envelope.event,
            })?),
        }
    }
}

/// Destination for run log lines
///
/// Only the `LogWriter` task calls into a sink, so implementations see
/// appends strictly one at a time.
pub trait LogSink: Send + Sync {
    /// Append one event as a single line
    fn append(&self, envelope: &LogEnvelope) -> Result<(), LogSinkError>;

    /// Flush anything buffered
    fn flush(&self) -> Result<(), LogSinkError> {
        Ok(())
    }
}

/// Append-only log file
pub struct FileLogSink {
    path: PathBuf,
    format: LogFormat,
    file: Mutex<LineWriter<File>>,
}

impl FileLogSink {
    /// Open (creating if needed) `path` in append mode
    pub fn open(path: impl AsRef<Path>, format: LogFormat) -> Result<Self, LogSinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LogSinkError::Open {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            format,
            file: Mutex::new(LineWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLogSink {
    fn append(&self, envelope: &LogEnvelope) -> Result<(), LogSinkError> {
        let line = self.format.render(envelope)?;
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), LogSinkError> {
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::ConversionMode;
    use tempfile::TempDir;

    fn found(count: usize) -> LogEnvelope {
        LogEnvelope::new(LogEvent::FilesFound {
            count,
            mode: ConversionMode::McaToLinear,
            source_dir: "/world/region".to_string(),
        })
    }

    #[test]
    fn test_text_sink_appends() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("conversion_log.txt");
        std::fs::write(&path, "earlier run\n").unwrap();

        let sink = FileLogSink::open(&path, LogFormat::Text).unwrap();
        sink.append(&found(2)).unwrap();
        sink.append(&found(5)).unwrap();
        sink.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "earlier run\nFound 2 region files to convert\nFound 5 region files to convert\n"
        );
    }

    #[test]
    fn test_json_sink_writes_one_object_per_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("run.jsonl");

        let sink = FileLogSink::open(&path, LogFormat::Json).unwrap();
        sink.append(&found(3)).unwrap();
        sink.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["type"], "files_found");
        assert_eq!(value["count"], 3);
        assert!(chrono::DateTime::parse_from_rfc3339(value["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_open_failure() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing-dir").join("log.txt");

        let err = FileLogSink::open(&path, LogFormat::Text).err().unwrap();
        assert!(matches!(err, LogSinkError::Open { .. }));
    }

    #[test]
    fn test_format_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            format: LogFormat,
        }
        let w: Wrapper = toml::from_str("format = \"json\"").unwrap();
        assert_eq!(w.format, LogFormat::Json);
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }
}
