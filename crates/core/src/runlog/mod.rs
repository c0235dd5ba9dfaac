//! Append-only run log.
//!
//! Events flow from any task through a cloneable [`LogHandle`] into a single
//! [`LogWriter`], which owns the [`LogSink`]. Sink failures are traced and
//! never reach the conversion path.

mod config;
mod events;
mod handle;
mod sink;
mod writer;

pub use config::LoggingConfig;
pub use events::*;
pub use handle::*;
pub use sink::*;
pub use writer::*;
