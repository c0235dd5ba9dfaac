//! Batch conversion orchestrator.
//!
//! A run moves through `Idle -> Enumerating -> Running -> Completed | Cancelled`:
//! - **Enumeration**: one non-recursive listing of the source directory
//! - **Dispatch**: a fixed pool of `worker_count` workers, each item converted once
//! - **Aggregation**: outcomes flow over a channel into a single task that owns
//!   the counters, the run log and the caller's event stream

mod cancel;
mod config;
mod discovery;
mod progress;
mod runner;
mod types;

pub use cancel::CancellationToken;
pub use config::{available_workers, OrchestratorConfig};
pub use discovery::{discover_work_items, is_up_to_date};
pub use progress::{BatchRun, ProgressAggregator};
pub use runner::{BatchRunHandle, ConversionOrchestrator};
pub use types::{
    OrchestratorError, RunEvent, RunParams, RunState, RunSummary, DEFAULT_COMPRESSION_LEVEL,
};
