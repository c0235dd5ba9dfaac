use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Converter program is set and any timeout is non-zero
/// - Channel buffers are non-zero
/// - An explicit default worker count is non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Converter validation
    if config.converter.program.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "converter.program cannot be empty".to_string(),
        ));
    }
    if config.converter.timeout_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "converter.timeout_secs cannot be 0 (omit it to disable the timeout)".to_string(),
        ));
    }

    // Orchestrator validation
    if config.orchestrator.outcome_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.outcome_buffer cannot be 0".to_string(),
        ));
    }
    if config.orchestrator.default_workers == Some(0) {
        return Err(ConfigError::ValidationError(
            "orchestrator.default_workers cannot be 0".to_string(),
        ));
    }

    // Logging validation
    if config.logging.buffer_size == 0 {
        return Err(ConfigError::ValidationError(
            "logging.buffer_size cannot be 0".to_string(),
        ));
    }

    Ok(())
}
