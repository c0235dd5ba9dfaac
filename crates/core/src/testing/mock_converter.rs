//! Mock converter for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::converter::{ConvertedFile, ConverterError, SingleFileConverter, WorkItem};

/// Mock implementation of the SingleFileConverter trait.
///
/// Provides controllable behavior for testing:
/// - Track converted items for assertions
/// - Fail or panic on chosen file names
/// - Simulate slow conversions
/// - Measure how many conversions ran at once
///
/// Clones share all state, so a test can keep one clone while the
/// orchestrator owns another.
///
/// # Example
///
/// ```rust,ignore
/// use regionconv_core::testing::MockConverter;
///
/// let converter = MockConverter::new();
/// converter.fail_on("r.0.1.mca").await;
/// converter.set_conversion_duration(Duration::from_millis(20)).await;
///
/// // Run a batch...
///
/// assert_eq!(converter.call_count().await, 3);
/// ```
#[derive(Debug, Clone)]
pub struct MockConverter {
    /// Items passed to `convert`, in call order.
    calls: Arc<RwLock<Vec<WorkItem>>>,
    /// When each source's `convert` call began. Recorded before the first
    /// await so it is ordered with the caller's cancellation check.
    started: Arc<Mutex<HashMap<PathBuf, Instant>>>,
    /// File names whose conversion returns an error.
    failing: Arc<RwLock<HashSet<String>>>,
    /// File names whose conversion panics.
    panicking: Arc<RwLock<HashSet<String>>>,
    /// If set, the next conversion fails with this error.
    next_error: Arc<RwLock<Option<ConverterError>>>,
    /// Simulated conversion duration in milliseconds.
    conversion_duration_ms: Arc<RwLock<u64>>,
    /// Whether successful conversions copy the source to the destination.
    write_outputs: Arc<RwLock<bool>>,
    /// Whether `validate` reports the codec missing.
    unavailable: Arc<RwLock<bool>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for MockConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConverter {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            started: Arc::new(Mutex::new(HashMap::new())),
            failing: Arc::new(RwLock::new(HashSet::new())),
            panicking: Arc::new(RwLock::new(HashSet::new())),
            next_error: Arc::new(RwLock::new(None)),
            conversion_duration_ms: Arc::new(RwLock::new(0)),
            write_outputs: Arc::new(RwLock::new(false)),
            unavailable: Arc::new(RwLock::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get all items passed to `convert`.
    pub async fn recorded_calls(&self) -> Vec<WorkItem> {
        self.calls.read().await.clone()
    }

    /// Get the number of `convert` calls.
    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// When the conversion of `source` began, if it was ever called.
    pub fn started_at(&self, source: &Path) -> Option<Instant> {
        self.started
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(source)
            .copied()
    }

    /// Make conversions of the file named `file_name` fail.
    pub async fn fail_on(&self, file_name: impl Into<String>) {
        self.failing.write().await.insert(file_name.into());
    }

    /// Make conversions of the file named `file_name` panic.
    pub async fn panic_on(&self, file_name: impl Into<String>) {
        self.panicking.write().await.insert(file_name.into());
    }

    /// Configure the next conversion to fail with the given error.
    pub async fn set_next_error(&self, error: ConverterError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set the simulated conversion duration.
    pub async fn set_conversion_duration(&self, duration: Duration) {
        *self.conversion_duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Copy source bytes to the destination on success.
    pub async fn set_write_outputs(&self, write: bool) {
        *self.write_outputs.write().await = write;
    }

    /// Make `validate` fail as if the codec were missing.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    /// Highest number of conversions observed running at once.
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn take_error(&self) -> Option<ConverterError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl SingleFileConverter for MockConverter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        if *self.unavailable.read().await {
            return Err(ConverterError::ProgramNotFound {
                path: PathBuf::from("mock-codec"),
            });
        }
        Ok(())
    }

    async fn convert(&self, item: &WorkItem) -> Result<ConvertedFile, ConverterError> {
        self.started
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(item.source_path().to_path_buf(), Instant::now());
        self.calls.write().await.push(item.clone());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let duration_ms = *self.conversion_duration_ms.read().await;
        if duration_ms > 0 {
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let name = item.display_name();
        if self.panicking.read().await.contains(&name) {
            panic!("mock panic converting {}", name);
        }
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        if self.failing.read().await.contains(&name) {
            return Err(ConverterError::conversion_failed(
                "mock failure",
                Some(format!("cannot convert {}", name)),
            ));
        }

        let output_path = item.destination_path();
        let mut output_size_bytes = 0;
        if *self.write_outputs.read().await {
            let data = tokio::fs::read(item.source_path()).await?;
            tokio::fs::write(&output_path, &data).await?;
            output_size_bytes = data.len() as u64;
        }

        Ok(ConvertedFile {
            output_path,
            output_size_bytes,
            duration_ms,
        })
    }
}
