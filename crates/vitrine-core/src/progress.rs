//! Progress reporting.
//!
//! Uploads report progress through a single [`ProgressSink`] contract with
//! two producers behind it: a true byte-level reporter (file extraction)
//! and a synthetic timed reporter (link/note creation). The last report
//! before terminal success must be 100.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Consumer of progress updates for one upload item.
///
/// Implementations must tolerate arbitrary cadence. Values above 100 are
/// clamped by [`MonotonicSink`]; producers should already stay in range.
pub trait ProgressSink: Send + Sync {
    /// Report progress as an integer percentage 0–100.
    fn report(&self, pct: u8);
}

impl<F> ProgressSink for F
where
    F: Fn(u8) + Send + Sync,
{
    fn report(&self, pct: u8) {
        self(pct)
    }
}

/// Wrapper enforcing the per-item monotonicity guarantee.
///
/// Out-of-order or duplicate reports are dropped; a report only reaches the
/// inner sink if it is strictly greater than everything seen so far.
pub struct MonotonicSink<S> {
    inner: S,
    last: AtomicU8,
}

impl<S: ProgressSink> MonotonicSink<S> {
    /// Wrap a sink, starting from 0.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            last: AtomicU8::new(0),
        }
    }

    /// The highest percentage reported so far.
    pub fn last(&self) -> u8 {
        self.last.load(Ordering::Relaxed)
    }
}

impl<S: ProgressSink> ProgressSink for MonotonicSink<S> {
    fn report(&self, pct: u8) {
        let pct = pct.min(100);
        let prev = self.last.fetch_max(pct, Ordering::Relaxed);
        if pct > prev {
            self.inner.report(pct);
        }
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for Arc<S> {
    fn report(&self, pct: u8) {
        (**self).report(pct)
    }
}
