//! Converter module for translating single region files.
//!
//! This module provides the `SingleFileConverter` trait, the work item and
//! outcome types shared with the orchestrator, and `CommandConverter`, which
//! delegates the byte-level codec to an external program.
//!
//! # Example
//!
//! ```ignore
//! use regionconv_core::converter::{CommandConverter, ConversionMode, ConverterConfig, SingleFileConverter, WorkItem};
//!
//! let converter = CommandConverter::new(ConverterConfig::default());
//! converter.validate().await?;
//!
//! let item = WorkItem::new(
//!     PathBuf::from("/world/region/r.0.0.mca"),
//!     ConversionMode::McaToLinear,
//!     PathBuf::from("/world/linear"),
//!     6,
//! )
//! .expect("mca source");
//!
//! let result = converter.convert(&item).await?;
//! println!("Wrote {} bytes in {} ms", result.output_size_bytes, result.duration_ms);
//! ```

mod command;
mod config;
mod error;
mod traits;
mod types;

pub use command::CommandConverter;
pub use config::ConverterConfig;
pub use error::ConverterError;
pub use traits::SingleFileConverter;
pub use types::{
    ConversionMode, ConversionOutcome, ConvertedFile, OutcomeStatus, ParseModeError, SkipReason,
    WorkItem, MAX_COMPRESSION_LEVEL, MIN_COMPRESSION_LEVEL,
};
