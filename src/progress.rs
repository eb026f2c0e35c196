//! Progress reporting for long-running build stages.
//!
//! The core algorithms never write to the terminal or the logger while they
//! run; they report through a [`Progress`] observer supplied by the caller.

/// Observer for build stages such as fetching, parsing and deduplication.
///
/// All methods default to doing nothing.
pub trait Progress {
    /// A stage is starting with `total` units of work (0 when unknown).
    fn on_start(&self, _stage: &str, _total: usize) {}

    /// `done` of `total` units are complete.
    fn on_advance(&self, _stage: &str, _done: usize, _total: usize) {}

    /// A stage finished.
    fn on_finish(&self, _stage: &str, _summary: &str) {}
}

/// Discards all progress events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {}

/// Forwards progress events to the `log` facade.
///
/// Advances are logged at debug level every `step` units; starts and
/// finishes at info level.
#[derive(Debug, Clone, Copy)]
pub struct LogProgress {
    step: usize,
}

impl LogProgress {
    /// Log an advance every `step` units (a step of 0 is treated as 1).
    pub fn new(step: usize) -> Self {
        Self { step: step.max(1) }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(100_000)
    }
}

impl Progress for LogProgress {
    fn on_start(&self, stage: &str, total: usize) {
        if total > 0 {
            log::info!("{}: starting ({} items)", stage, total);
        } else {
            log::info!("{}: starting", stage);
        }
    }

    fn on_advance(&self, stage: &str, done: usize, total: usize) {
        if done % self.step == 0 {
            log::debug!("{}: {}/{}", stage, done, total);
        }
    }

    fn on_finish(&self, stage: &str, summary: &str) {
        log::info!("{}: {}", stage, summary);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every event for assertions.
    #[derive(Default)]
    pub(crate) struct RecordingProgress {
        pub events: Mutex<Vec<String>>,
    }

    impl Progress for RecordingProgress {
        fn on_start(&self, stage: &str, total: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("start {} {}", stage, total));
        }

        fn on_advance(&self, stage: &str, done: usize, total: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("advance {} {}/{}", stage, done, total));
        }

        fn on_finish(&self, stage: &str, summary: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("finish {} {}", stage, summary));
        }
    }

    #[test]
    fn test_log_progress_step_floor() {
        let progress = LogProgress::new(0);
        assert_eq!(progress.step, 1);
        progress.on_advance("dedup", 3, 10);
    }

    #[test]
    fn test_no_progress_is_silent() {
        let progress = NoProgress;
        progress.on_start("fetch", 0);
        progress.on_finish("fetch", "done");
    }
}
