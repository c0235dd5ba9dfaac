//! Error types for the converter module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while converting one file.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// Codec program not found.
    #[error("converter program not found: {path}")]
    ProgramNotFound { path: PathBuf },

    /// Input file not found.
    #[error("input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The codec ran but reported failure.
    #[error("conversion failed: {reason}")]
    ConversionFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// The codec exited cleanly but produced no output.
    #[error("converter produced no output at {path}")]
    MissingOutput { path: PathBuf },

    /// Conversion timed out.
    #[error("conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The codec panicked.
    #[error("converter panicked: {0}")]
    Panicked(String),

    /// I/O error during conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConverterError {
    /// Creates a new conversion failed error with stderr output.
    pub fn conversion_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ConversionFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Full human-readable detail, including captured stderr when present.
    pub fn detail(&self) -> String {
        match self {
            Self::ConversionFailed {
                stderr: Some(stderr),
                ..
            } if !stderr.trim().is_empty() => format!("{}: {}", self, stderr.trim()),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_includes_stderr() {
        let err = ConverterError::conversion_failed(
            "exit code 1",
            Some("chunk 12 has a bad length\n".to_string()),
        );
        assert_eq!(
            err.detail(),
            "conversion failed: exit code 1: chunk 12 has a bad length"
        );
    }

    #[test]
    fn test_detail_without_stderr() {
        let err = ConverterError::conversion_failed("exit code 1", None);
        assert_eq!(err.detail(), "conversion failed: exit code 1");

        let err = ConverterError::Timeout { timeout_secs: 30 };
        assert_eq!(err.detail(), "conversion timed out after 30 seconds");
    }
}
