//! Configuration for the converter module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the external-program converter.
///
/// `args` is a template; each element may contain the placeholders
/// `{mode}`, `{source}`, `{destination}`, `{destination_dir}` and `{level}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Codec program to run once per file.
    #[serde(default = "default_program")]
    pub program: PathBuf,

    /// Argument template.
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Timeout for a single file in seconds. No timeout when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Maximum bytes of stderr kept for error details.
    #[serde(default = "default_stderr_limit")]
    pub stderr_limit: usize,
}

fn default_program() -> PathBuf {
    PathBuf::from("linear-region-codec")
}

fn default_args() -> Vec<String> {
    ["{mode}", "--level", "{level}", "{source}", "{destination}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_stderr_limit() -> usize {
    4096
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            timeout_secs: None,
            stderr_limit: default_stderr_limit(),
        }
    }
}

impl ConverterConfig {
    /// Creates a config running `program` with the given argument template.
    pub fn with_program(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            ..Default::default()
        }
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConverterConfig::default();
        assert_eq!(config.program, PathBuf::from("linear-region-codec"));
        assert!(config.args.iter().any(|a| a == "{source}"));
        assert!(config.args.iter().any(|a| a == "{destination}"));
        assert!(config.timeout_secs.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = ConverterConfig::with_program(
            "/usr/local/bin/regiontool",
            vec!["{source}".to_string(), "{destination}".to_string()],
        )
        .with_timeout(120);

        assert_eq!(config.program, PathBuf::from("/usr/local/bin/regiontool"));
        assert_eq!(config.args.len(), 2);
        assert_eq!(config.timeout_secs, Some(120));
    }

    #[test]
    fn test_deserialize_partial() {
        let toml = r#"
            program = "python3"
            args = ["linear.py", "{mode}", "{source}", "{destination}"]
        "#;
        let config: ConverterConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.program, PathBuf::from("python3"));
        assert_eq!(config.args[0], "linear.py");
        assert_eq!(config.stderr_limit, 4096);
    }
}
