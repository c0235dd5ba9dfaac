//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the conversion orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Worker count used when the caller does not pick one.
    /// Unset means one worker per logical CPU.
    #[serde(default)]
    pub default_workers: Option<usize>,

    /// Skip files whose destination exists and is newer than the source.
    #[serde(default = "default_skip_up_to_date")]
    pub skip_up_to_date: bool,

    /// Capacity of the channel carrying outcomes from workers to the
    /// aggregation task.
    #[serde(default = "default_outcome_buffer")]
    pub outcome_buffer: usize,
}

fn default_skip_up_to_date() -> bool {
    true
}

fn default_outcome_buffer() -> usize {
    64
}

/// One worker per logical CPU, never fewer than one.
pub fn available_workers() -> usize {
    num_cpus::get().max(1)
}

impl OrchestratorConfig {
    /// Worker count to use when the caller does not override it.
    pub fn worker_count(&self) -> usize {
        self.default_workers
            .filter(|&n| n > 0)
            .unwrap_or_else(available_workers)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_workers: None,
            skip_up_to_date: default_skip_up_to_date(),
            outcome_buffer: default_outcome_buffer(),
        }
    }
}
