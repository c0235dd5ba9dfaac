use serde::{Deserialize, Serialize};
use std::fmt;

use crate::converter::{ConversionMode, SkipReason};

/// Run log event types
///
/// `Display` yields the human-readable line written by the text format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    FilesFound {
        count: usize,
        mode: ConversionMode,
        source_dir: String,
    },
    NoFilesFound {
        mode: ConversionMode,
        source_dir: String,
    },
    EnumerationFailed {
        source_dir: String,
        error: String,
    },
    FileConverted {
        source: String,
        destination: String,
    },
    FileSkipped {
        source: String,
        reason: SkipReason,
    },
    FileFailed {
        source: String,
        error: String,
    },
    RunCompleted {
        converted: u64,
        skipped: u64,
        failed: u64,
    },
    RunCancelled {
        converted: u64,
        skipped: u64,
        failed: u64,
    },
}

impl LogEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::FilesFound { .. } => "files_found",
            Self::NoFilesFound { .. } => "no_files_found",
            Self::EnumerationFailed { .. } => "enumeration_failed",
            Self::FileConverted { .. } => "file_converted",
            Self::FileSkipped { .. } => "file_skipped",
            Self::FileFailed { .. } => "file_failed",
            Self::RunCompleted { .. } => "run_completed",
            Self::RunCancelled { .. } => "run_cancelled",
        }
    }

    /// Source file this event is about, if any
    pub fn source(&self) -> Option<&str> {
        match self {
            Self::FileConverted { source, .. }
            | Self::FileSkipped { source, .. }
            | Self::FileFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether this event ends the run's log
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NoFilesFound { .. } | Self::RunCompleted { .. } | Self::RunCancelled { .. }
        )
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FilesFound { count, .. } => {
                write!(f, "Found {} region files to convert", count)
            }
            Self::NoFilesFound { .. } => f.write_str("No files found to convert"),
            Self::EnumerationFailed { source_dir, error } => {
                write!(f, "Failed to list {}: {}", source_dir, error)
            }
            Self::FileConverted {
                source,
                destination,
            } => write!(f, "Converted {} -> {}", source, destination),
            Self::FileSkipped { source, reason } => write!(f, "Skipped {} ({})", source, reason),
            Self::FileFailed { source, error } => write!(f, "Failed {}: {}", source, error),
            Self::RunCompleted {
                converted, skipped, ..
            } => write!(
                f,
                "Conversion complete: {} region files converted, {} region files skipped",
                converted, skipped
            ),
            Self::RunCancelled {
                converted, skipped, ..
            } => write!(
                f,
                "Conversion cancelled: {} region files converted, {} region files skipped",
                converted, skipped
            ),
        }
    }
}
