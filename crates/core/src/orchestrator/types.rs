//! Types for the conversion orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::converter::{ConversionMode, ConverterError, MAX_COMPRESSION_LEVEL, MIN_COMPRESSION_LEVEL};
use crate::runlog::LogEvent;

use super::config::available_workers;
use super::progress::BatchRun;

/// Compression level used when the caller does not pick one.
pub const DEFAULT_COMPRESSION_LEVEL: u8 = 6;

/// Errors that prevent a run from starting.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("source directory not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("source is not a directory: {path}")]
    SourceNotDirectory { path: PathBuf },

    #[error("source directory is not readable: {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("destination is not a directory: {path}")]
    DestinationNotDirectory { path: PathBuf },

    #[error("destination directory cannot be created: {path}: {source}")]
    DestinationUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("destination directory is read-only: {path}")]
    DestinationReadOnly { path: PathBuf },

    #[error("worker count must be at least 1, got {0}")]
    InvalidWorkerCount(usize),

    #[error("compression level must be between 1 and 22, got {0}")]
    InvalidCompressionLevel(u8),

    #[error("converter unavailable: {0}")]
    ConverterUnavailable(#[from] ConverterError),

    /// A previous run's workers are still alive.
    #[error("a conversion run is already in progress")]
    RunInProgress,

    /// The supervising task died before producing a summary.
    #[error("conversion run aborted: {0}")]
    RunAborted(String),
}

/// Inputs of one conversion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParams {
    pub source_dir: PathBuf,
    pub destination_dir: PathBuf,
    pub mode: ConversionMode,
    pub compression_level: u8,
    pub worker_count: usize,
    pub logging_enabled: bool,
}

impl RunParams {
    /// Params with the default level, one worker per CPU and logging off.
    pub fn new(
        source_dir: impl Into<PathBuf>,
        destination_dir: impl Into<PathBuf>,
        mode: ConversionMode,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            destination_dir: destination_dir.into(),
            mode,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            worker_count: available_workers(),
            logging_enabled: false,
        }
    }

    pub fn with_compression_level(mut self, level: u8) -> Self {
        self.compression_level = level;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.worker_count = workers;
        self
    }

    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    /// Check every configuration rule and resolve both directories to
    /// absolute paths. Creates the destination directory if it is missing.
    pub async fn validate(self) -> Result<Self, OrchestratorError> {
        if self.worker_count == 0 {
            return Err(OrchestratorError::InvalidWorkerCount(self.worker_count));
        }
        if !(MIN_COMPRESSION_LEVEL..=MAX_COMPRESSION_LEVEL).contains(&self.compression_level) {
            return Err(OrchestratorError::InvalidCompressionLevel(
                self.compression_level,
            ));
        }

        let source_dir = validate_source(&self.source_dir).await?;
        let destination_dir = validate_destination(&self.destination_dir).await?;

        Ok(Self {
            source_dir,
            destination_dir,
            ..self
        })
    }
}

async fn validate_source(path: &Path) -> Result<PathBuf, OrchestratorError> {
    let meta = tokio::fs::metadata(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            OrchestratorError::SourceNotFound {
                path: path.to_path_buf(),
            }
        } else {
            OrchestratorError::SourceUnreadable {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;
    if !meta.is_dir() {
        return Err(OrchestratorError::SourceNotDirectory {
            path: path.to_path_buf(),
        });
    }

    // Opening the listing is the only portable readability check.
    tokio::fs::read_dir(path)
        .await
        .map_err(|source| OrchestratorError::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        })?;

    tokio::fs::canonicalize(path)
        .await
        .map_err(|source| OrchestratorError::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        })
}

async fn validate_destination(path: &Path) -> Result<PathBuf, OrchestratorError> {
    let unavailable = |source| OrchestratorError::DestinationUnavailable {
        path: path.to_path_buf(),
        source,
    };

    match tokio::fs::metadata(path).await {
        Ok(meta) if !meta.is_dir() => {
            return Err(OrchestratorError::DestinationNotDirectory {
                path: path.to_path_buf(),
            })
        }
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::create_dir_all(path).await.map_err(unavailable)?;
            tracing::info!(path = %path.display(), "Created destination directory");
        }
        Err(e) => return Err(unavailable(e)),
    }

    check_writable(path)?;
    tokio::fs::canonicalize(path).await.map_err(unavailable)
}

/// Create and drop a hidden file in `path` to confirm it accepts writes.
fn check_writable(path: &Path) -> Result<(), OrchestratorError> {
    tempfile::Builder::new()
        .prefix(".regionconv-write-check")
        .tempfile_in(path)
        .map(drop)
        .map_err(|e| {
            tracing::debug!(path = %path.display(), error = %e, "Destination is not writable");
            OrchestratorError::DestinationReadOnly {
                path: path.to_path_buf(),
            }
        })
}

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Enumerating,
    Running,
    Completed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Cancelled)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Enumerating => "enumerating",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Final account of a run, delivered exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub total: u64,
    pub processed: u64,
    pub converted: u64,
    /// Includes failed files.
    pub skipped: u64,
    pub failed: u64,
    pub cancelled: bool,
    /// Why the source directory could not be listed, if it could not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enumeration_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn from_snapshot(run: &BatchRun) -> Self {
        Self {
            run_id: run.run_id,
            total: run.total_count,
            processed: run.processed_count,
            converted: run.converted_count,
            skipped: run.skipped_count,
            failed: run.failed_count,
            cancelled: run.cancelled,
            enumeration_error: run.enumeration_error.clone(),
            started_at: run.started_at,
            ended_at: run.ended_at.unwrap_or_else(Utc::now),
        }
    }

    /// The listing succeeded and matched no files.
    pub fn is_empty(&self) -> bool {
        self.total == 0 && self.enumeration_error.is_none()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(error) = &self.enumeration_error {
            return write!(f, "Could not list source directory: {}", error);
        }
        if self.is_empty() && !self.cancelled {
            return f.write_str("No files found to convert");
        }
        let verb = if self.cancelled { "cancelled" } else { "complete" };
        write!(
            f,
            "Conversion {}: {} region files converted, {} region files skipped",
            verb, self.converted, self.skipped
        )
    }
}

/// Event delivered to the caller while a run progresses.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A new counters snapshot.
    Progress(BatchRun),
    /// A human-readable log line.
    Log(LogEvent),
    /// The run ended. Always the last event.
    Finished(RunSummary),
}
