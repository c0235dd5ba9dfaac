//! In-memory run log sink for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::runlog::{LogEnvelope, LogEvent, LogSink, LogSinkError};

/// Log sink that keeps every appended envelope in memory.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<LogEnvelope>>,
    fail_writes: AtomicBool,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every append fail, as a full disk would.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.lock().iter().map(|e| e.event.clone()).collect()
    }

    /// Appended events rendered as text lines.
    pub fn lines(&self) -> Vec<String> {
        self.lock().iter().map(|e| e.event.to_string()).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEnvelope>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LogSink for MemoryLogSink {
    fn append(&self, envelope: &LogEnvelope) -> Result<(), LogSinkError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LogSinkError::Write(std::io::Error::other(
                "simulated write failure",
            )));
        }
        self.lock().push(envelope.clone());
        Ok(())
    }
}
