//! Bounded concurrency runner.
//!
//! Admission-controlled executor limiting how many submitted async
//! operations run at once. Each submission takes its queue position
//! synchronously inside [`submit`](BoundedRunner::submit), so excess
//! submissions are admitted in strict FIFO order no matter how their
//! wrapper tasks get scheduled; a completing task (success or failure)
//! hands its slot directly to the oldest waiter. There is no priority and
//! no cancellation of admitted tasks.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::trace;

use vitrine_core::{defaults, Error, Result};

use crate::lock;

/// Future returned by [`BoundedRunner::submit`].
///
/// Resolves with exactly the submitted task's result. If the task is lost
/// (runtime shutdown mid-flight), resolves with `Error::Internal`.
pub struct SubmittedTask<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Future for SubmittedTask<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|recv| match recv {
            Ok(result) => result,
            Err(_) => Err(Error::Internal(
                "submitted task dropped without a result".into(),
            )),
        })
    }
}

/// Slot accounting: free slots plus the ordered waiter queue. A submission
/// either takes a free slot or appends its go-signal, in one locked step.
struct AdmissionState {
    available: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// Admission-controlled async executor.
///
/// Cheaply cloneable; clones share the same admission bound. Safe to call
/// [`submit`](Self::submit) reentrantly from within a running task — the
/// inner submission queues and is admitted once a slot frees up.
#[derive(Clone)]
pub struct BoundedRunner {
    state: Arc<Mutex<AdmissionState>>,
    in_flight: Arc<AtomicUsize>,
    limit: usize,
}

impl BoundedRunner {
    /// Create a runner admitting at most `limit` concurrent tasks.
    ///
    /// A limit of 0 is treated as 1.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            state: Arc::new(Mutex::new(AdmissionState {
                available: limit,
                waiters: VecDeque::new(),
            })),
            in_flight: Arc::new(AtomicUsize::new(0)),
            limit,
        }
    }

    /// Submit a task for bounded execution.
    ///
    /// The returned future resolves/rejects identically to the task. One
    /// task's failure never blocks or cancels others. Queue position is
    /// fixed before this method returns, so call order is admission order.
    pub fn submit<F, T>(&self, task: F) -> SubmittedTask<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let admission = {
            let mut state = lock(&self.state);
            if state.available > 0 {
                state.available -= 1;
                None
            } else {
                let (go_tx, go_rx) = oneshot::channel();
                state.waiters.push_back(go_tx);
                Some(go_rx)
            }
        };

        let runner = self.clone();
        tokio::spawn(async move {
            if let Some(go) = admission {
                // The go sender lives in the waiter queue until a
                // completing task fires it; an error here means the queue
                // was torn down with the runner.
                if go.await.is_err() {
                    let _ = tx.send(Err(Error::Internal("runner closed".into())));
                    return;
                }
            }
            runner.in_flight.fetch_add(1, Ordering::SeqCst);
            trace!("task admitted");

            let result = task.await;

            runner.in_flight.fetch_sub(1, Ordering::SeqCst);
            runner.release_slot();
            // Receiver may have been dropped by a caller ignoring the result.
            let _ = tx.send(result);
        });

        SubmittedTask { rx }
    }

    /// Hand the freed slot to the oldest live waiter, or bank it.
    fn release_slot(&self) {
        let mut state = lock(&self.state);
        while let Some(waiter) = state.waiters.pop_front() {
            if waiter.send(()).is_ok() {
                return;
            }
        }
        state.available += 1;
    }

    /// Number of tasks currently executing (admitted, not queued).
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// The configured admission limit.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for BoundedRunner {
    fn default() -> Self {
        Self::new(defaults::RUNNER_MAX_CONCURRENT)
    }
}
