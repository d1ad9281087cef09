//! Synthetic timed progress producer.
//!
//! Link and note creation have no byte stream to measure, so their items
//! get fixed-interval progress increments up to a ceiling while the backend
//! round-trip is in flight. The same [`ProgressSink`] contract as the true
//! byte-level reporter; 100 is only ever reported on terminal success.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;

use vitrine_core::{defaults, ProgressSink};

/// Configuration for the synthetic ticker.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Milliseconds between ticks.
    pub tick_ms: u64,
    /// Increment per tick.
    pub step: u8,
    /// Highest value reported while in flight.
    pub ceiling: u8,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            tick_ms: defaults::SYNTHETIC_TICK_MS,
            step: defaults::SYNTHETIC_TICK_STEP,
            ceiling: defaults::SYNTHETIC_CEILING_PCT,
        }
    }
}

/// Handle to a running synthetic progress ticker.
///
/// Must be settled with [`finish`](Self::finish) or
/// [`abandon`](Self::abandon); dropping the handle stops the ticker
/// without a final report.
pub struct SyntheticProgress {
    task: JoinHandle<()>,
    sink: Arc<dyn ProgressSink>,
}

impl SyntheticProgress {
    /// Start ticking progress into `sink`.
    pub fn start(sink: Arc<dyn ProgressSink>, config: SyntheticConfig) -> Self {
        let task_sink = sink.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(config.tick_ms.max(1)));
            // First tick fires immediately; skip it so 0→step takes one period.
            ticker.tick().await;
            let mut pct: u8 = 0;
            while pct < config.ceiling {
                ticker.tick().await;
                pct = pct.saturating_add(config.step).min(config.ceiling);
                task_sink.report(pct);
            }
        });
        Self { task, sink }
    }

    /// Terminal success: stop ticking and report 100.
    pub fn finish(self) {
        self.task.abort();
        self.sink.report(100);
    }

    /// Terminal failure: stop ticking without a final report.
    pub fn abandon(self) {
        self.task.abort();
    }
}

impl Drop for SyntheticProgress {
    fn drop(&mut self) {
        self.task.abort();
    }
}
