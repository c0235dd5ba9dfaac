pub mod config;
pub mod converter;
pub mod orchestrator;
pub mod runlog;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError,
};
pub use converter::{
    CommandConverter, ConversionMode, ConversionOutcome, ConverterConfig, ConverterError,
    OutcomeStatus, SingleFileConverter, SkipReason, WorkItem,
};
pub use orchestrator::{
    BatchRun, BatchRunHandle, CancellationToken, ConversionOrchestrator, OrchestratorConfig,
    OrchestratorError, ProgressAggregator, RunEvent, RunParams, RunState, RunSummary,
};
pub use runlog::{FileLogSink, LogEvent, LogFormat, LogSink, LogSinkError, LoggingConfig};
