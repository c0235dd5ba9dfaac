use indicatif::{ProgressBar, ProgressStyle};

use regionconv_core::{BatchRun, RunState};

const BAR_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}";

/// Status text shown next to the bar.
pub fn progress_message(run: &BatchRun) -> String {
    match run.state {
        RunState::Idle | RunState::Enumerating => "looking for region files".to_string(),
        _ => format!(
            "{} converted, {} skipped",
            run.converted_count, run.skipped_count
        ),
    }
}

/// Live progress bar on stderr with log lines printed above it.
pub struct ProgressRenderer {
    bar: ProgressBar,
}

impl ProgressRenderer {
    pub fn new(enabled: bool) -> Self {
        let bar = if enabled {
            let style = ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> ");
            ProgressBar::new(0).with_style(style)
        } else {
            ProgressBar::hidden()
        };
        Self { bar }
    }

    pub fn update(&self, run: &BatchRun) {
        self.bar.set_length(run.total_count);
        self.bar.set_position(run.processed_count);
        self.bar.set_message(progress_message(run));
    }

    /// Print a log line without tearing the bar.
    pub fn line(&self, message: &str) {
        // A hidden bar (quiet, or stderr is not a terminal) swallows println.
        if self.bar.is_hidden() {
            eprintln!("{}", message);
        } else {
            self.bar.println(message);
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(state: RunState, total: u64, processed: u64) -> BatchRun {
        // Nil run id; only the counters matter here.
        let mut run = BatchRun::new(Default::default());
        run.state = state;
        run.total_count = total;
        run.processed_count = processed;
        run.converted_count = processed;
        run
    }

    #[test]
    fn test_progress_message_running() {
        let mut snapshot = run(RunState::Running, 4, 2);
        snapshot.converted_count = 1;
        snapshot.skipped_count = 1;
        assert_eq!(progress_message(&snapshot), "1 converted, 1 skipped");
    }

    #[test]
    fn test_progress_message_enumerating() {
        let message = progress_message(&run(RunState::Enumerating, 0, 0));
        assert_eq!(message, "looking for region files");
    }

    #[test]
    fn test_update_tracks_counters() {
        let renderer = ProgressRenderer::new(false);
        renderer.update(&run(RunState::Running, 10, 3));
        assert_eq!(renderer.bar.length(), Some(10));
        assert_eq!(renderer.bar.position(), 3);
        assert_eq!(renderer.bar.message(), "3 converted, 0 skipped");

        renderer.update(&run(RunState::Completed, 10, 10));
        assert_eq!(renderer.bar.position(), 10);
        renderer.finish();
        assert!(renderer.bar.is_finished());
    }
}
