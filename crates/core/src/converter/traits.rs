//! Trait definitions for the converter module.

use async_trait::async_trait;

use super::error::ConverterError;
use super::types::{ConvertedFile, WorkItem};

/// Converts a single region file between container formats.
///
/// Implementations must not touch shared mutable state: the orchestrator
/// calls `convert` concurrently from every worker.
#[async_trait]
pub trait SingleFileConverter: Send + Sync {
    /// Returns the name of this converter implementation.
    fn name(&self) -> &str;

    /// Validates that the converter is properly configured and ready.
    async fn validate(&self) -> Result<(), ConverterError>;

    /// Converts `item.source_path()` into `item.destination_path()`.
    ///
    /// On error no file may be left at the destination path.
    async fn convert(&self, item: &WorkItem) -> Result<ConvertedFile, ConverterError>;
}
