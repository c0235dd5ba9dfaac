//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Level-triggered stop signal shared by the caller and every worker of one run.
///
/// Once set it stays set; each run gets a fresh token, so nothing ever
/// resets one.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Idempotent; returns true only for the call that set it.
    pub fn signal(&self) -> bool {
        let first = !self.flag.swap(true, Ordering::AcqRel);
        if first {
            tracing::info!("Cancellation requested");
        }
        first
    }

    /// Wait-free read of the flag.
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_is_idempotent() {
        let token = CancellationToken::new();
        assert!(!token.is_set());

        assert!(token.signal());
        assert!(!token.signal());
        assert!(!token.signal());
        assert!(token.is_set());
    }

    #[test]
    fn test_clones_share_flag() {
        let token = CancellationToken::new();
        let worker_view = token.clone();

        token.signal();
        assert!(worker_view.is_set());
    }

    #[test]
    fn test_signal_from_another_thread() {
        let token = CancellationToken::new();
        let remote = token.clone();

        std::thread::spawn(move || {
            remote.signal();
        })
        .join()
        .unwrap();

        assert!(token.is_set());
    }
}
