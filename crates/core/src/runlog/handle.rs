use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::LogEvent;

/// Envelope wrapping a log event with the time it was emitted
#[derive(Debug, Clone)]
pub struct LogEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: LogEvent,
}

impl LogEnvelope {
    pub fn new(event: LogEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Handle for emitting run log events
///
/// This is cheaply cloneable and can be shared across tasks.
/// Events are sent through an async channel to be written by the LogWriter,
/// so only one task ever touches the sink.
#[derive(Clone)]
pub struct LogHandle {
    tx: mpsc::Sender<LogEnvelope>,
}

impl LogHandle {
    pub fn new(tx: mpsc::Sender<LogEnvelope>) -> Self {
        Self { tx }
    }

    /// Emit a log event, waiting for buffer space
    ///
    /// If the writer is gone the error is traced and the caller carries on.
    pub async fn emit(&self, event: LogEvent) {
        if let Err(e) = self.tx.send(LogEnvelope::new(event)).await {
            tracing::error!("Failed to emit run log event: {}", e);
        }
    }
}
