//! Run counters and their single point of mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::converter::{ConversionOutcome, OutcomeStatus};

use super::types::RunState;

/// Aggregate state of one run.
///
/// `skipped_count` includes failed files, so
/// `converted_count + skipped_count == processed_count` in every snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRun {
    pub run_id: Uuid,
    pub state: RunState,
    pub total_count: u64,
    pub processed_count: u64,
    pub converted_count: u64,
    pub skipped_count: u64,
    /// Subset of `skipped_count` that failed rather than being passed over.
    pub failed_count: u64,
    pub cancelled: bool,
    /// Set when the source directory could not be listed.
    pub enumeration_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl BatchRun {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            state: RunState::Idle,
            total_count: 0,
            processed_count: 0,
            converted_count: 0,
            skipped_count: 0,
            failed_count: 0,
            cancelled: false,
            enumeration_error: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Completion percentage; an empty batch reports 0.
    pub fn percent(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.processed_count as f64 / self.total_count as f64 * 100.0
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Owns the run counters and publishes every change as a snapshot.
///
/// All mutation happens inside `watch::Sender::send_modify`, so readers
/// never observe a half-applied update.
pub struct ProgressAggregator {
    tx: watch::Sender<BatchRun>,
}

impl ProgressAggregator {
    pub fn new(run_id: Uuid) -> Self {
        let (tx, _rx) = watch::channel(BatchRun::new(run_id));
        Self { tx }
    }

    /// Receiver woken on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<BatchRun> {
        self.tx.subscribe()
    }

    /// Consistent point-in-time copy of the counters.
    pub fn snapshot(&self) -> BatchRun {
        self.tx.borrow().clone()
    }

    pub fn set_enumerating(&self) -> BatchRun {
        self.update(|run| run.state = RunState::Enumerating)
    }

    /// Record the batch size and enter `Running`.
    pub fn begin(&self, total: u64) -> BatchRun {
        self.update(|run| {
            run.total_count = total;
            run.state = RunState::Running;
        })
    }

    /// Record that listing the source directory failed. The batch stays empty.
    pub fn fail_enumeration(&self, error: impl Into<String>) -> BatchRun {
        let error = error.into();
        self.update(|run| run.enumeration_error = Some(error))
    }

    /// Count one outcome. Outcomes beyond the batch size are dropped.
    pub fn record_outcome(&self, outcome: &ConversionOutcome) -> BatchRun {
        self.update(|run| {
            if run.processed_count >= run.total_count {
                tracing::warn!(
                    source = %outcome.source_path.display(),
                    "Outcome received after every item was counted"
                );
                return;
            }
            run.processed_count += 1;
            match &outcome.status {
                OutcomeStatus::Converted { .. } => run.converted_count += 1,
                OutcomeStatus::Skipped { .. } => run.skipped_count += 1,
                OutcomeStatus::Failed { .. } => {
                    run.skipped_count += 1;
                    run.failed_count += 1;
                }
            }
        })
    }

    /// Enter the terminal state. `Cancelled` is only reachable from `Running`.
    pub fn finish(&self, cancelled: bool) -> BatchRun {
        self.update(|run| {
            let cancelled = cancelled && run.state == RunState::Running;
            run.cancelled = cancelled;
            run.state = if cancelled {
                RunState::Cancelled
            } else {
                RunState::Completed
            };
            run.ended_at = Some(Utc::now());
        })
    }

    fn update(&self, f: impl FnOnce(&mut BatchRun)) -> BatchRun {
        let mut snapshot = None;
        self.tx.send_modify(|run| {
            if run.state.is_terminal() {
                return;
            }
            f(run);
            snapshot = Some(run.clone());
        });
        snapshot.unwrap_or_else(|| self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::SkipReason;
    use std::path::PathBuf;

    fn converted() -> ConversionOutcome {
        ConversionOutcome::converted(PathBuf::from("/a.mca"), PathBuf::from("/a.linear"))
    }

    #[test]
    fn test_counts_each_status() {
        let agg = ProgressAggregator::new(Uuid::new_v4());
        agg.begin(3);

        agg.record_outcome(&converted());
        agg.record_outcome(&ConversionOutcome::skipped(
            "/b.mca".into(),
            SkipReason::UpToDate,
        ));
        let snap = agg.record_outcome(&ConversionOutcome::failed("/c.mca".into(), "boom"));

        assert_eq!(snap.processed_count, 3);
        assert_eq!(snap.converted_count, 1);
        assert_eq!(snap.skipped_count, 2);
        assert_eq!(snap.failed_count, 1);
        assert_eq!(snap.converted_count + snap.skipped_count, snap.processed_count);
        assert_eq!(snap.percent(), 100.0);
    }

    #[test]
    fn test_processed_never_exceeds_total() {
        let agg = ProgressAggregator::new(Uuid::new_v4());
        agg.begin(1);

        agg.record_outcome(&converted());
        let snap = agg.record_outcome(&converted());

        assert_eq!(snap.processed_count, 1);
        assert_eq!(snap.total_count, 1);
    }

    #[test]
    fn test_empty_batch_percent_is_zero() {
        let agg = ProgressAggregator::new(Uuid::new_v4());
        let snap = agg.begin(0);
        assert_eq!(snap.percent(), 0.0);
    }

    #[test]
    fn test_cancelled_only_from_running() {
        let agg = ProgressAggregator::new(Uuid::new_v4());
        agg.set_enumerating();
        let snap = agg.finish(true);
        assert_eq!(snap.state, RunState::Completed);
        assert!(!snap.cancelled);

        let agg = ProgressAggregator::new(Uuid::new_v4());
        agg.begin(4);
        let snap = agg.finish(true);
        assert_eq!(snap.state, RunState::Cancelled);
        assert!(snap.cancelled);
        assert!(snap.ended_at.is_some());
    }

    #[test]
    fn test_terminal_state_is_final() {
        let agg = ProgressAggregator::new(Uuid::new_v4());
        agg.begin(2);
        agg.finish(false);

        let snap = agg.record_outcome(&converted());
        assert_eq!(snap.processed_count, 0);
        assert_eq!(snap.state, RunState::Completed);

        let snap = agg.finish(true);
        assert_eq!(snap.state, RunState::Completed);
    }

    #[test]
    fn test_enumeration_failure_is_kept_in_snapshot() {
        let agg = ProgressAggregator::new(Uuid::new_v4());
        agg.set_enumerating();
        agg.fail_enumeration("permission denied");
        let snap = agg.finish(false);

        assert_eq!(snap.state, RunState::Completed);
        assert_eq!(snap.total_count, 0);
        assert_eq!(snap.enumeration_error.as_deref(), Some("permission denied"));
    }

    #[tokio::test]
    async fn test_subscribers_see_every_update() {
        let agg = ProgressAggregator::new(Uuid::new_v4());
        let mut rx = agg.subscribe();

        agg.begin(2);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().state, RunState::Running);

        agg.record_outcome(&converted());
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().processed_count, 1);
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_counts() {
        let agg = std::sync::Arc::new(ProgressAggregator::new(Uuid::new_v4()));
        agg.begin(10_000);

        let reader = {
            let rx = agg.subscribe();
            std::thread::spawn(move || {
                for _ in 0..10_000 {
                    let snap = rx.borrow().clone();
                    assert_eq!(snap.converted_count + snap.skipped_count, snap.processed_count);
                    assert!(snap.processed_count <= snap.total_count);
                }
            })
        };

        for i in 0..10_000 {
            if i % 3 == 0 {
                agg.record_outcome(&ConversionOutcome::failed("/x.mca".into(), "bad"));
            } else {
                agg.record_outcome(&converted());
            }
        }
        reader.join().unwrap();
    }
}
