use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Config file picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "regionconv.toml";

/// Environment variable prefix; nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "REGIONCONV_";

fn figment(path: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    figment(Some(path))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load `path` if given, else `regionconv.toml` when present, else defaults.
/// Environment overrides apply in every case.
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = path {
        return load_config(path);
    }

    let fallback = Path::new(DEFAULT_CONFIG_FILE);
    if fallback.exists() {
        tracing::debug!("Using {}", DEFAULT_CONFIG_FILE);
        return load_config(fallback);
    }

    figment(None)
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runlog::LogFormat;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[orchestrator]
default_workers = 4

[converter]
program = "/opt/codec/linear"
timeout_secs = 60

[logging]
format = "json"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.orchestrator.default_workers, Some(4));
        assert_eq!(config.converter.program, PathBuf::from("/opt/codec/linear"));
        assert_eq!(config.converter.timeout_secs, Some(60));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_config_from_str_empty_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert!(config.orchestrator.skip_up_to_date);
        assert_eq!(config.logging.file, PathBuf::from("conversion_log.txt"));
    }

    #[test]
    fn test_load_config_from_str_bad_type() {
        let toml = r#"
[orchestrator]
outcome_buffer = "lots"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config(Path::new("/nonexistent/regionconv.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[converter]
program = "python3"
args = ["linear.py", "{{mode}}", "{{source}}", "{{destination}}"]

[logging]
file = "/var/log/regionconv.log"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.converter.program, PathBuf::from("python3"));
        assert_eq!(config.converter.args[1], "{mode}");
        assert_eq!(config.logging.file, PathBuf::from("/var/log/regionconv.log"));
        assert_eq!(config.logging.buffer_size, 256);
    }
}
