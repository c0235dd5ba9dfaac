//! Conversion orchestrator implementation.
//!
//! One run is driven by a supervisor task:
//! - Enumeration: lists the source directory once
//! - Dispatch: a fixed pool of workers pulls items from a shared queue
//! - Aggregation: workers send outcomes over a channel; only the supervisor
//!   touches the counters and the run log

use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::converter::{
    ConversionOutcome, ConverterError, OutcomeStatus, SingleFileConverter, SkipReason, WorkItem,
};
use crate::runlog::{create_log_system, FileLogSink, LogEvent, LogHandle, LogSink, LoggingConfig};

use super::cancel::CancellationToken;
use super::config::OrchestratorConfig;
use super::discovery::{discover_work_items, is_up_to_date};
use super::progress::{BatchRun, ProgressAggregator};
use super::types::{OrchestratorError, RunEvent, RunParams, RunSummary};

type WorkQueue = Arc<Mutex<VecDeque<WorkItem>>>;

/// Clears the active-run flag when the supervisor ends, including by panic.
struct RunGuard {
    active: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Drives batch conversions of a region directory.
///
/// At most one run is active per orchestrator; a new run is refused until the
/// previous run's workers have been joined.
pub struct ConversionOrchestrator<C>
where
    C: SingleFileConverter + 'static,
{
    config: OrchestratorConfig,
    logging: LoggingConfig,
    converter: Arc<C>,
    log_sink: Option<Arc<dyn LogSink>>,
    active: Arc<AtomicBool>,
}

impl<C> ConversionOrchestrator<C>
where
    C: SingleFileConverter + 'static,
{
    pub fn new(config: OrchestratorConfig, logging: LoggingConfig, converter: Arc<C>) -> Self {
        Self {
            config,
            logging,
            converter,
            log_sink: None,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use `sink` instead of the configured log file when a run enables logging.
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Whether a run's supervisor is still alive.
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start a run in the background and return its handle.
    ///
    /// Configuration errors are returned before any task is spawned. Progress
    /// is available through [`BatchRunHandle::subscribe`]; use
    /// [`run_with_events`](Self::run_with_events) for the log line stream.
    pub async fn run(&self, params: RunParams) -> Result<BatchRunHandle, OrchestratorError> {
        self.start(params, None).await
    }

    /// Like [`run`](Self::run), also returning the stream of progress, log
    /// and finish events. The stream is unbounded: drain it, or drop the
    /// receiver to stop buffering.
    pub async fn run_with_events(
        &self,
        params: RunParams,
    ) -> Result<(BatchRunHandle, mpsc::UnboundedReceiver<RunEvent>), OrchestratorError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = self.start(params, Some(events_tx)).await?;
        Ok((handle, events_rx))
    }

    async fn start(
        &self,
        params: RunParams,
        events: Option<mpsc::UnboundedSender<RunEvent>>,
    ) -> Result<BatchRunHandle, OrchestratorError> {
        if self.active.swap(true, Ordering::SeqCst) {
            warn!("Refusing to start a run while another is active");
            return Err(OrchestratorError::RunInProgress);
        }
        let guard = RunGuard {
            active: Arc::clone(&self.active),
        };

        // The destination directory is only created once the run is claimed
        // and the converter is ready.
        self.converter.validate().await?;
        let params = params.validate().await?;

        let run_id = Uuid::new_v4();
        let token = CancellationToken::new();
        let aggregator = ProgressAggregator::new(run_id);
        let progress = aggregator.subscribe();
        let (log, log_writer) = if params.logging_enabled {
            self.start_log().unzip()
        } else {
            (None, None)
        };

        info!(
            %run_id,
            source = %params.source_dir.display(),
            destination = %params.destination_dir.display(),
            mode = %params.mode,
            level = params.compression_level,
            workers = params.worker_count,
            converter = self.converter.name(),
            "Starting conversion run"
        );

        let supervisor = Supervisor {
            params,
            config: self.config.clone(),
            converter: Arc::clone(&self.converter),
            token: token.clone(),
            aggregator,
            events,
            log,
            log_writer,
        };
        let task = tokio::spawn(supervisor.run(guard));

        Ok(BatchRunHandle {
            run_id,
            token,
            progress,
            task,
        })
    }

    fn start_log(&self) -> Option<(LogHandle, JoinHandle<u64>)> {
        let sink: Arc<dyn LogSink> = match &self.log_sink {
            Some(sink) => Arc::clone(sink),
            None => match FileLogSink::open(&self.logging.file, self.logging.format) {
                Ok(sink) => {
                    info!("Logging enabled. Log file: {}", self.logging.file.display());
                    Arc::new(sink)
                }
                Err(e) => {
                    warn!("Run log disabled for this run: {}", e);
                    return None;
                }
            },
        };

        let (handle, writer) = create_log_system(sink, self.logging.buffer_size.max(1));
        Some((handle, tokio::spawn(writer.run())))
    }
}

/// Caller's view of one run.
///
/// Dropping the handle detaches from the run; it still finishes in the
/// background.
pub struct BatchRunHandle {
    run_id: Uuid,
    token: CancellationToken,
    progress: watch::Receiver<BatchRun>,
    task: JoinHandle<RunSummary>,
}

impl BatchRunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Latest published counters.
    pub fn snapshot(&self) -> BatchRun {
        self.progress.borrow().clone()
    }

    /// Receiver woken on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<BatchRun> {
        self.progress.clone()
    }

    /// Request cooperative cancellation. Returns true for the first request.
    pub fn cancel(&self) -> bool {
        self.token.signal()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to end and return its summary.
    pub async fn wait(self) -> Result<RunSummary, OrchestratorError> {
        self.task
            .await
            .map_err(|e| OrchestratorError::RunAborted(e.to_string()))
    }
}

struct Supervisor<C>
where
    C: SingleFileConverter + 'static,
{
    params: RunParams,
    config: OrchestratorConfig,
    converter: Arc<C>,
    token: CancellationToken,
    aggregator: ProgressAggregator,
    events: Option<mpsc::UnboundedSender<RunEvent>>,
    log: Option<LogHandle>,
    log_writer: Option<JoinHandle<u64>>,
}

impl<C> Supervisor<C>
where
    C: SingleFileConverter + 'static,
{
    async fn run(mut self, guard: RunGuard) -> RunSummary {
        self.publish(self.aggregator.set_enumerating());

        let source_dir = self.params.source_dir.display().to_string();
        let items = discover_work_items(
            &self.params.source_dir,
            self.params.mode,
            &self.params.destination_dir,
            self.params.compression_level,
        )
        .await;

        match items {
            Ok(items) if items.is_empty() => {
                info!(source = %source_dir, glob = %self.params.mode.source_glob(), "No files found to convert");
                self.emit(LogEvent::NoFilesFound {
                    mode: self.params.mode,
                    source_dir,
                })
                .await;
            }
            Ok(items) => {
                info!(count = items.len(), "Found region files to convert");
                self.emit(LogEvent::FilesFound {
                    count: items.len(),
                    mode: self.params.mode,
                    source_dir,
                })
                .await;
                self.publish(self.aggregator.begin(items.len() as u64));
                self.dispatch(items).await;
            }
            Err(e) => {
                error!(source = %source_dir, error = %e, "Failed to enumerate source directory");
                self.publish(self.aggregator.fail_enumeration(e.to_string()));
                self.emit(LogEvent::EnumerationFailed {
                    source_dir,
                    error: e.to_string(),
                })
                .await;
            }
        }

        self.finish(guard).await
    }

    async fn dispatch(&mut self, items: Vec<WorkItem>) {
        let queue: WorkQueue = Arc::new(Mutex::new(items.into()));
        let (outcome_tx, mut outcome_rx) = mpsc::channel(self.config.outcome_buffer.max(1));

        let mut workers = JoinSet::new();
        for worker_id in 0..self.params.worker_count {
            workers.spawn(worker_loop(
                worker_id,
                Arc::clone(&queue),
                Arc::clone(&self.converter),
                self.token.clone(),
                self.config.skip_up_to_date,
                outcome_tx.clone(),
            ));
        }
        drop(outcome_tx);
        debug!(workers = self.params.worker_count, "Worker pool started");

        while let Some(outcome) = outcome_rx.recv().await {
            self.record(outcome).await;
        }

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!("Conversion worker exited abnormally: {}", e);
            }
        }
        debug!("Worker pool torn down");

        // Items stranded by workers that died still get exactly one outcome.
        let stranded: Vec<WorkItem> = queue.lock().await.drain(..).collect();
        for item in stranded {
            self.record(ConversionOutcome::failed(
                item.source_path().to_path_buf(),
                "no worker left to process this file",
            ))
            .await;
        }
    }

    async fn record(&mut self, outcome: ConversionOutcome) {
        let snapshot = self.aggregator.record_outcome(&outcome);
        let source = outcome.source_path.display().to_string();

        let event = match outcome.status {
            OutcomeStatus::Converted { destination } => {
                debug!(source = %source, destination = %destination.display(), "Converted");
                LogEvent::FileConverted {
                    source,
                    destination: destination.display().to_string(),
                }
            }
            OutcomeStatus::Skipped { reason } => {
                debug!(source = %source, %reason, "Skipped");
                LogEvent::FileSkipped { source, reason }
            }
            OutcomeStatus::Failed { error } => {
                warn!(source = %source, error = %error, "Conversion failed");
                LogEvent::FileFailed { source, error }
            }
        };

        self.emit(event).await;
        self.publish(snapshot);
    }

    async fn finish(mut self, guard: RunGuard) -> RunSummary {
        let cancelled = self.token.is_set();
        let counted = self.aggregator.snapshot();

        if counted.total_count > 0 {
            let event = if cancelled {
                LogEvent::RunCancelled {
                    converted: counted.converted_count,
                    skipped: counted.skipped_count,
                    failed: counted.failed_count,
                }
            } else {
                LogEvent::RunCompleted {
                    converted: counted.converted_count,
                    skipped: counted.skipped_count,
                    failed: counted.failed_count,
                }
            };
            self.emit(event).await;
        }

        // The log file is complete before anyone learns the run ended.
        self.log.take();
        if let Some(writer) = self.log_writer.take() {
            match writer.await {
                Ok(lines) => debug!(lines, "Run log closed"),
                Err(e) => warn!("Run log writer failed: {}", e),
            }
        }

        drop(guard);

        let snapshot = self.aggregator.finish(cancelled);
        let summary = RunSummary::from_snapshot(&snapshot);
        info!(
            run_id = %summary.run_id,
            converted = summary.converted,
            skipped = summary.skipped,
            failed = summary.failed,
            cancelled = summary.cancelled,
            duration_ms = summary.duration_ms(),
            "{}",
            summary
        );

        self.publish(snapshot);
        self.send(RunEvent::Finished(summary.clone()));
        summary
    }

    async fn emit(&self, event: LogEvent) {
        if let Some(log) = &self.log {
            log.emit(event.clone()).await;
        }
        self.send(RunEvent::Log(event));
    }

    fn publish(&self, snapshot: BatchRun) {
        self.send(RunEvent::Progress(snapshot));
    }

    /// A dropped receiver only means nobody is listening any more.
    fn send(&self, event: RunEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

async fn worker_loop<C>(
    worker_id: usize,
    queue: WorkQueue,
    converter: Arc<C>,
    token: CancellationToken,
    skip_up_to_date: bool,
    outcomes: mpsc::Sender<ConversionOutcome>,
) where
    C: SingleFileConverter + 'static,
{
    loop {
        let Some(item) = queue.lock().await.pop_front() else {
            break;
        };
        let source = item.source_path().to_path_buf();

        let up_to_date = !token.is_set() && skip_up_to_date && is_up_to_date(&item).await;

        // Checked again after the up-to-date lookup yields, right before the codec.
        let outcome = if up_to_date {
            ConversionOutcome::skipped(source, SkipReason::UpToDate)
        } else if token.is_set() {
            ConversionOutcome::skipped(source, SkipReason::Cancelled)
        } else {
            convert_one(converter.as_ref(), &item).await
        };

        if outcomes.send(outcome).await.is_err() {
            warn!(worker_id, "Outcome channel closed, stopping worker");
            break;
        }
    }
    debug!(worker_id, "Worker finished");
}

/// Convert one item, turning errors and panics into a failed outcome.
async fn convert_one<C>(converter: &C, item: &WorkItem) -> ConversionOutcome
where
    C: SingleFileConverter + ?Sized,
{
    let source = item.source_path().to_path_buf();
    match AssertUnwindSafe(converter.convert(item)).catch_unwind().await {
        Ok(Ok(converted)) => ConversionOutcome::converted(source, converted.output_path),
        Ok(Err(e)) => ConversionOutcome::failed(source, e.detail()),
        Err(panic) => ConversionOutcome::failed(
            source,
            ConverterError::Panicked(panic_message(panic.as_ref())).detail(),
        ),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::ConversionMode;
    use crate::testing::MockConverter;
    use std::path::PathBuf;

    fn item(name: &str) -> WorkItem {
        WorkItem::new(
            PathBuf::from("/in").join(name),
            ConversionMode::McaToLinear,
            PathBuf::from("/out"),
            6,
        )
        .unwrap()
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");

        let boxed: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[test]
    fn test_run_guard_clears_flag() {
        let active = Arc::new(AtomicBool::new(true));
        {
            let _guard = RunGuard {
                active: Arc::clone(&active),
            };
        }
        assert!(!active.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_convert_one_maps_errors_and_panics() {
        let converter = MockConverter::new();
        converter.fail_on("r.1.0.mca").await;
        converter.panic_on("r.2.0.mca").await;

        let ok = convert_one(&converter, &item("r.0.0.mca")).await;
        assert_eq!(
            ok.status,
            OutcomeStatus::Converted {
                destination: PathBuf::from("/out/r.0.0.linear")
            }
        );

        let failed = convert_one(&converter, &item("r.1.0.mca")).await;
        assert!(failed.error_detail().unwrap().contains("mock failure"));

        let panicked = convert_one(&converter, &item("r.2.0.mca")).await;
        assert!(panicked.error_detail().unwrap().contains("converter panicked"));
    }

    #[tokio::test]
    async fn test_worker_skips_everything_once_cancelled() {
        let converter = Arc::new(MockConverter::new());
        let queue: WorkQueue = Arc::new(Mutex::new(
            vec![item("r.0.0.mca"), item("r.0.1.mca")].into(),
        ));
        let token = CancellationToken::new();
        token.signal();
        let (tx, mut rx) = mpsc::channel(4);

        worker_loop(0, queue, Arc::clone(&converter), token, false, tx).await;

        let mut outcomes = Vec::new();
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.status
            == OutcomeStatus::Skipped {
                reason: SkipReason::Cancelled
            }));
        assert!(converter.recorded_calls().await.is_empty());
    }
}
