use std::sync::Arc;

use tokio::sync::mpsc;

use super::{LogEnvelope, LogHandle, LogSink};

/// Background task that receives log events and appends them to the sink
pub struct LogWriter {
    rx: mpsc::Receiver<LogEnvelope>,
    sink: Arc<dyn LogSink>,
}

impl LogWriter {
    pub fn new(rx: mpsc::Receiver<LogEnvelope>, sink: Arc<dyn LogSink>) -> Self {
        Self { rx, sink }
    }

    /// Run the writer, consuming events until every handle is dropped
    ///
    /// Returns the number of lines written. Sink errors are traced and the
    /// writer keeps draining.
    pub async fn run(mut self) -> u64 {
        tracing::debug!("Run log writer started");
        let mut written = 0;

        while let Some(envelope) = self.rx.recv().await {
            match self.sink.append(&envelope) {
                Ok(()) => written += 1,
                Err(e) => tracing::warn!(
                    event_type = envelope.event.event_type(),
                    "Failed to write run log line: {}",
                    e
                ),
            }
        }

        if let Err(e) = self.sink.flush() {
            tracing::warn!("Failed to flush run log: {}", e);
        }

        tracing::debug!(lines = written, "Run log writer shutting down");
        written
    }
}

/// Create a complete run log system
///
/// Returns:
/// - `LogHandle` - for emitting events (clone this to share across tasks)
/// - `LogWriter` - spawn this as a background task with `tokio::spawn(writer.run())`
pub fn create_log_system(sink: Arc<dyn LogSink>, buffer_size: usize) -> (LogHandle, LogWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let handle = LogHandle::new(tx);
    let writer = LogWriter::new(rx, sink);
    (handle, writer)
}
