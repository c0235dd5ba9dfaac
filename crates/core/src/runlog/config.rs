use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::LogFormat;

/// Run log settings. The log is only written when a run enables it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Append-only log file.
    #[serde(default = "default_file")]
    pub file: PathBuf,

    #[serde(default)]
    pub format: LogFormat,

    /// Capacity of the channel feeding the log writer.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_file() -> PathBuf {
    PathBuf::from("conversion_log.txt")
}

fn default_buffer_size() -> usize {
    256
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_file(),
            format: LogFormat::default(),
            buffer_size: default_buffer_size(),
        }
    }
}
