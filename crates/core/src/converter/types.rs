//! Types for the converter module.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Lowest accepted compression level.
pub const MIN_COMPRESSION_LEVEL: u8 = 1;

/// Highest accepted compression level.
pub const MAX_COMPRESSION_LEVEL: u8 = 22;

/// Direction of a conversion between the two region container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversionMode {
    /// Anvil `.mca` region files to `.linear`.
    #[serde(rename = "mca2linear")]
    McaToLinear,
    /// `.linear` region files back to Anvil `.mca`.
    #[serde(rename = "linear2mca")]
    LinearToMca,
}

impl ConversionMode {
    /// Extension (without dot) of files this mode reads.
    pub fn source_extension(&self) -> &'static str {
        match self {
            ConversionMode::McaToLinear => "mca",
            ConversionMode::LinearToMca => "linear",
        }
    }

    /// Extension (without dot) of files this mode writes.
    pub fn target_extension(&self) -> &'static str {
        match self {
            ConversionMode::McaToLinear => "linear",
            ConversionMode::LinearToMca => "mca",
        }
    }

    /// Whether the compression level affects the output.
    pub fn uses_compression_level(&self) -> bool {
        matches!(self, ConversionMode::McaToLinear)
    }

    /// The literal glob this mode enumerates, e.g. `*.mca`.
    pub fn source_glob(&self) -> String {
        format!("*.{}", self.source_extension())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionMode::McaToLinear => "mca2linear",
            ConversionMode::LinearToMca => "linear2mca",
        }
    }
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown conversion mode.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown conversion mode '{0}' (expected mca2linear or linear2mca)")]
pub struct ParseModeError(pub String);

impl FromStr for ConversionMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mca2linear" => Ok(ConversionMode::McaToLinear),
            "linear2mca" => Ok(ConversionMode::LinearToMca),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}

/// One file to convert.
///
/// Only constructed through [`WorkItem::new`], which guarantees the source
/// extension matches the mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    source_path: PathBuf,
    mode: ConversionMode,
    destination_dir: PathBuf,
    compression_level: u8,
}

impl WorkItem {
    /// Creates a work item, or `None` if the source does not carry the
    /// extension implied by `mode`.
    pub fn new(
        source_path: PathBuf,
        mode: ConversionMode,
        destination_dir: PathBuf,
        compression_level: u8,
    ) -> Option<Self> {
        let ext = source_path.extension().and_then(|e| e.to_str())?;
        if ext != mode.source_extension() {
            return None;
        }
        Some(Self {
            source_path,
            mode,
            destination_dir,
            compression_level,
        })
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn mode(&self) -> ConversionMode {
        self.mode
    }

    pub fn destination_dir(&self) -> &Path {
        &self.destination_dir
    }

    pub fn compression_level(&self) -> u8 {
        self.compression_level
    }

    /// Source file name with the extension swapped for the target format.
    pub fn destination_file_name(&self) -> PathBuf {
        // Region stems contain dots (`r.-1.2`), so `with_extension` would eat a coordinate.
        let mut name = OsString::from(self.source_path.file_stem().unwrap_or_default());
        name.push(".");
        name.push(self.mode.target_extension());
        PathBuf::from(name)
    }

    /// Final output path inside the destination directory.
    pub fn destination_path(&self) -> PathBuf {
        self.destination_dir.join(self.destination_file_name())
    }

    /// Hidden scratch path the codec writes to before the output is renamed
    /// into place. Keeps the target extension so tools that sniff it work.
    pub fn partial_path(&self) -> PathBuf {
        let stem = self.source_path.file_stem().unwrap_or_default();
        let mut name = OsString::from(".");
        name.push(stem);
        name.push(".partial.");
        name.push(self.mode.target_extension());
        self.destination_dir.join(name)
    }

    /// File name of the source for log lines.
    pub fn display_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.source_path.display().to_string())
    }
}

/// Result of a successful codec call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertedFile {
    /// Where the output was written.
    pub output_path: PathBuf,
    /// Size of the output in bytes.
    pub output_size_bytes: u64,
    /// Wall time of the conversion in milliseconds.
    pub duration_ms: u64,
}

/// Why an item was skipped instead of converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Cancellation was signalled before the item started.
    Cancelled,
    /// The destination exists and is newer than the source.
    UpToDate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Cancelled => f.write_str("cancelled"),
            SkipReason::UpToDate => f.write_str("destination is up to date"),
        }
    }
}

/// Terminal status of one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Converted { destination: PathBuf },
    Skipped { reason: SkipReason },
    Failed { error: String },
}

/// Result of processing one work item, produced once per item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub source_path: PathBuf,
    pub status: OutcomeStatus,
}

impl ConversionOutcome {
    pub fn converted(source_path: PathBuf, destination: PathBuf) -> Self {
        Self {
            source_path,
            status: OutcomeStatus::Converted { destination },
        }
    }

    pub fn skipped(source_path: PathBuf, reason: SkipReason) -> Self {
        Self {
            source_path,
            status: OutcomeStatus::Skipped { reason },
        }
    }

    pub fn failed(source_path: PathBuf, error: impl Into<String>) -> Self {
        Self {
            source_path,
            status: OutcomeStatus::Failed {
                error: error.into(),
            },
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self.status, OutcomeStatus::Converted { .. })
    }

    /// Error detail, present only for failed items.
    pub fn error_detail(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}
