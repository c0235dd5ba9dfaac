use serde::{Deserialize, Serialize};

use crate::converter::ConverterConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::runlog::LoggingConfig;

/// Root configuration
///
/// Every section is optional; a missing section takes its defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}
