//! Testing utilities and mock implementations.
//!
//! This module provides doubles for the two collaborators of the
//! orchestrator, allowing batch runs to be tested without a real codec or
//! log file.
//!
//! # Example
//!
//! ```rust,ignore
//! use regionconv_core::testing::{MemoryLogSink, MockConverter};
//!
//! let converter = Arc::new(MockConverter::new());
//! let sink = Arc::new(MemoryLogSink::new());
//! let orchestrator = ConversionOrchestrator::new(config, logging, converter.clone())
//!     .with_log_sink(sink.clone());
//! ```

mod memory_log_sink;
mod mock_converter;

pub use memory_log_sink::MemoryLogSink;
pub use mock_converter::MockConverter;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    /// Write `count` fake region files named `r.<i>.0.<ext>` into `dir`.
    pub fn region_files(dir: &Path, ext: &str, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.join(format!("r.{}.0.{}", i, ext));
                std::fs::write(&path, format!("region {}", i)).expect("write region fixture");
                path
            })
            .collect()
    }
}
