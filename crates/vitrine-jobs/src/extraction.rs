//! Background byte-extraction dispatcher.
//!
//! Converts a file handle into its raw byte payload off the async runtime:
//! a single long-lived worker thread owns all blocking file I/O and streams
//! correlated responses back over a channel. The worker context is lazily
//! created on first use, explicitly disposable, and recreated after a
//! context-level fault.
//!
//! Correlation protocol: request `{ item_id, path }` → responses
//! `Progress { item_id, pct }*` then `Done { item_id, bytes }` or
//! `ItemFailed { item_id, error }`. At most one outstanding response per
//! item id. A per-item error rejects only that item's future; the worker
//! context dying rejects every pending future and clears the queue.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use vitrine_core::{defaults, Error, ProgressSink, Result, UploadItemId};

use crate::lock;

/// Request posted to the worker thread.
enum WorkerRequest {
    Extract {
        item_id: UploadItemId,
        path: PathBuf,
    },
    Shutdown,
    /// Test hook: stall the worker so later requests stay queued.
    #[cfg(test)]
    Stall(std::time::Duration),
    /// Test hook: simulate a context-level crash (exit without responding).
    #[cfg(test)]
    Die,
}

/// Response streamed back from the worker thread, correlated by item id.
enum WorkerResponse {
    Progress { item_id: UploadItemId, pct: u8 },
    Done { item_id: UploadItemId, bytes: Vec<u8> },
    ItemFailed { item_id: UploadItemId, error: String },
}

/// One pending extraction awaiting its correlated response.
struct PendingExtraction {
    done: oneshot::Sender<Result<Vec<u8>>>,
    progress: Option<Arc<dyn ProgressSink>>,
}

/// Live worker context: the request channel plus the epoch that ties it to
/// its pump task, so one context's death can never tear down its successor.
struct WorkerContext {
    req_tx: std_mpsc::Sender<WorkerRequest>,
    epoch: u64,
}

struct DispatcherShared {
    pending: Mutex<HashMap<UploadItemId, PendingExtraction>>,
    ctx: Mutex<Option<WorkerContext>>,
    epoch: AtomicU64,
}

/// Byte-extraction dispatcher. Exactly one worker context per instance.
///
/// Cheaply cloneable; clones share the same worker context and pending map.
#[derive(Clone)]
pub struct ExtractionDispatcher {
    shared: Arc<DispatcherShared>,
}

impl Default for ExtractionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionDispatcher {
    /// Create a dispatcher. The worker context is spawned on first use.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(DispatcherShared {
                pending: Mutex::new(HashMap::new()),
                ctx: Mutex::new(None),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Extract the raw bytes of `path`, reporting progress along the way.
    ///
    /// Resolves once the worker posts the correlated `Done` message. A
    /// duplicate outstanding item id is rejected with `InvalidInput`; a
    /// read failure rejects with `Io`; a worker-context fault rejects with
    /// `Worker` (as it does every other pending extraction).
    pub async fn extract(
        &self,
        item_id: UploadItemId,
        path: PathBuf,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<Vec<u8>> {
        let (done_tx, done_rx) = oneshot::channel();
        {
            let mut pending = lock(&self.shared.pending);
            if pending.contains_key(&item_id) {
                return Err(Error::InvalidInput(format!(
                    "extraction already pending for item {item_id}"
                )));
            }
            pending.insert(
                item_id,
                PendingExtraction {
                    done: done_tx,
                    progress,
                },
            );
        }

        match self.ensure_context() {
            Ok((req_tx, epoch)) => {
                if req_tx.send(WorkerRequest::Extract { item_id, path }).is_err() {
                    // Worker died between spawn and send; everything pending
                    // (including this item) is failed here.
                    fault(&self.shared, epoch, "extraction worker context unavailable");
                }
            }
            Err(e) => {
                lock(&self.shared.pending).remove(&item_id);
                return Err(e);
            }
        }

        done_rx
            .await
            .map_err(|_| Error::Worker("extraction context terminated".into()))?
    }

    /// Dispose the worker context.
    ///
    /// Pending extractions are rejected; the next [`extract`](Self::extract)
    /// call lazily creates a fresh context.
    pub fn dispose(&self) {
        let ctx = lock(&self.shared.ctx).take();
        if let Some(ctx) = ctx {
            let _ = ctx.req_tx.send(WorkerRequest::Shutdown);
            info!("Extraction worker context disposed");
        }
        fail_all_pending(&self.shared, "extraction dispatcher disposed");
    }

    /// Whether a worker context currently exists.
    pub fn is_active(&self) -> bool {
        lock(&self.shared.ctx).is_some()
    }

    /// Number of extractions awaiting their correlated response.
    pub fn pending_count(&self) -> usize {
        lock(&self.shared.pending).len()
    }

    /// Get the live context's sender, spawning the worker thread and its
    /// response pump if none exists.
    fn ensure_context(&self) -> Result<(std_mpsc::Sender<WorkerRequest>, u64)> {
        let mut ctx = lock(&self.shared.ctx);
        if let Some(ctx) = ctx.as_ref() {
            return Ok((ctx.req_tx.clone(), ctx.epoch));
        }

        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let (req_tx, req_rx) = std_mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();

        thread::Builder::new()
            .name("vitrine-extract".into())
            .spawn(move || worker_loop(req_rx, resp_tx))
            .map_err(|e| Error::Worker(format!("failed to spawn worker context: {e}")))?;

        tokio::spawn(pump_responses(self.shared.clone(), resp_rx, epoch));

        debug!(epoch, "Extraction worker context created");
        *ctx = Some(WorkerContext {
            req_tx: req_tx.clone(),
            epoch,
        });
        Ok((req_tx, epoch))
    }

    #[cfg(test)]
    fn send_test_request(&self, req: WorkerRequest) {
        let (req_tx, _) = self.ensure_context().expect("worker context");
        let _ = req_tx.send(req);
    }
}

/// Tear down the context identified by `epoch` (if still current) and
/// reject every pending extraction. Stale epochs are ignored so a dead
/// context can never clobber its replacement.
fn fault(shared: &Arc<DispatcherShared>, epoch: u64, reason: &str) {
    {
        let mut ctx = lock(&shared.ctx);
        match ctx.as_ref() {
            Some(current) if current.epoch == epoch => {
                *ctx = None;
            }
            _ => return,
        }
    }
    warn!(epoch, reason, "Extraction worker context fault");
    fail_all_pending(shared, reason);
}

fn fail_all_pending(shared: &Arc<DispatcherShared>, reason: &str) {
    let drained: Vec<PendingExtraction> = {
        let mut pending = lock(&shared.pending);
        pending.drain().map(|(_, entry)| entry).collect()
    };
    for entry in drained {
        let _ = entry.done.send(Err(Error::Worker(reason.to_string())));
    }
}

/// Async-side pump: resolves pending extractions by correlation id.
async fn pump_responses(
    shared: Arc<DispatcherShared>,
    mut resp_rx: mpsc::UnboundedReceiver<WorkerResponse>,
    epoch: u64,
) {
    while let Some(resp) = resp_rx.recv().await {
        match resp {
            WorkerResponse::Progress { item_id, pct } => {
                let pending = lock(&shared.pending);
                if let Some(entry) = pending.get(&item_id) {
                    if let Some(sink) = &entry.progress {
                        sink.report(pct);
                    }
                }
            }
            WorkerResponse::Done { item_id, bytes } => {
                if let Some(entry) = lock(&shared.pending).remove(&item_id) {
                    let _ = entry.done.send(Ok(bytes));
                }
            }
            WorkerResponse::ItemFailed { item_id, error } => {
                debug!(item_id = %item_id, error = %error, "Extraction failed for item");
                if let Some(entry) = lock(&shared.pending).remove(&item_id) {
                    let _ = entry.done.send(Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        error,
                    ))));
                }
            }
        }
    }
    // Channel closed: the worker thread exited. A graceful dispose already
    // cleared the context, making this a no-op.
    fault(&shared, epoch, "extraction worker context terminated");
}

/// Worker thread: blocking reads, chunked so progress stays monotonic.
fn worker_loop(
    req_rx: std_mpsc::Receiver<WorkerRequest>,
    resp_tx: mpsc::UnboundedSender<WorkerResponse>,
) {
    while let Ok(req) = req_rx.recv() {
        match req {
            WorkerRequest::Shutdown => break,
            #[cfg(test)]
            WorkerRequest::Stall(duration) => thread::sleep(duration),
            #[cfg(test)]
            WorkerRequest::Die => return,
            WorkerRequest::Extract { item_id, path } => {
                let report = |pct| {
                    let _ = resp_tx.send(WorkerResponse::Progress { item_id, pct });
                };
                match read_in_chunks(&path, report) {
                    Ok(bytes) => {
                        let _ = resp_tx.send(WorkerResponse::Done { item_id, bytes });
                    }
                    Err(e) => {
                        let _ = resp_tx.send(WorkerResponse::ItemFailed {
                            item_id,
                            error: e.to_string(),
                        });
                    }
                }
            }
        }
    }
}

/// Read a file in fixed-size chunks, reporting percentage at chunk
/// boundaries. Always reports 100 before returning success.
fn read_in_chunks(path: &Path, mut report: impl FnMut(u8)) -> std::io::Result<Vec<u8>> {
    let mut file = std::fs::File::open(path)?;
    let total = file.metadata()?.len();
    let mut bytes = Vec::with_capacity(total as usize);
    let mut buf = vec![0u8; defaults::EXTRACT_CHUNK_BYTES];
    let mut last_pct = 0u8;

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&buf[..n]);
        let pct = if total == 0 {
            100
        } else {
            ((bytes.len() as u64 * 100) / total).min(100) as u8
        };
        if pct > last_pct {
            last_pct = pct;
            report(pct);
        }
    }
    if last_pct < 100 {
        report(100);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use uuid::Uuid;
    use vitrine_core::MonotonicSink;

    fn item(ordinal: u32) -> UploadItemId {
        UploadItemId::new(Uuid::new_v4(), ordinal)
    }

    fn temp_file(contents: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(contents)
            .unwrap();
        (dir, path)
    }

    fn recording_sink() -> (Arc<std::sync::Mutex<Vec<u8>>>, Arc<dyn ProgressSink>) {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let sink: Arc<dyn ProgressSink> = Arc::new(MonotonicSink::new(move |pct: u8| {
            log_clone.lock().unwrap().push(pct)
        }));
        (log, sink)
    }

    #[tokio::test]
    async fn test_extract_returns_file_bytes() {
        let dispatcher = ExtractionDispatcher::new();
        let (_dir, path) = temp_file(b"hello, gallery");

        let bytes = dispatcher.extract(item(0), path, None).await.unwrap();
        assert_eq!(bytes, b"hello, gallery");
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_extract_reports_100_before_done() {
        let dispatcher = ExtractionDispatcher::new();
        let (_dir, path) = temp_file(&vec![7u8; 1000]);
        let (log, sink) = recording_sink();

        dispatcher.extract(item(0), path, Some(sink)).await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.last().copied(), Some(100));
        // Monotonic.
        assert!(log.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_extract_empty_file() {
        let dispatcher = ExtractionDispatcher::new();
        let (_dir, path) = temp_file(b"");
        let (log, sink) = recording_sink();

        let bytes = dispatcher.extract(item(0), path, Some(sink)).await.unwrap();
        assert!(bytes.is_empty());
        assert_eq!(*log.lock().unwrap(), vec![100]);
    }

    #[tokio::test]
    async fn test_missing_file_fails_only_that_item() {
        let dispatcher = ExtractionDispatcher::new();
        let (_dir, good_path) = temp_file(b"ok");

        let bad = dispatcher.extract(item(0), PathBuf::from("/nonexistent/x.bin"), None);
        let good = dispatcher.extract(item(1), good_path, None);

        let (bad, good) = tokio::join!(bad, good);
        assert!(matches!(bad.unwrap_err(), Error::Io(_)));
        assert_eq!(good.unwrap(), b"ok");
        // Context survived the per-item error.
        assert!(dispatcher.is_active());
    }

    #[tokio::test]
    async fn test_duplicate_item_id_rejected() {
        let dispatcher = ExtractionDispatcher::new();
        let (_dir, path) = temp_file(b"data");
        let id = item(0);

        // Stall the worker so the first extraction stays pending.
        dispatcher.send_test_request(WorkerRequest::Stall(Duration::from_millis(50)));
        let first = {
            let dispatcher = dispatcher.clone();
            let path = path.clone();
            tokio::spawn(async move { dispatcher.extract(id, path, None).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = dispatcher.extract(id, path, None).await;
        assert!(matches!(second.unwrap_err(), Error::InvalidInput(_)));

        assert_eq!(first.await.unwrap().unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_context_fault_rejects_all_pending_then_reinitializes() {
        let dispatcher = ExtractionDispatcher::new();
        let (_dir, path) = temp_file(b"payload");

        // Queue: stall, die, then two extractions that will never be served.
        dispatcher.send_test_request(WorkerRequest::Stall(Duration::from_millis(50)));
        dispatcher.send_test_request(WorkerRequest::Die);

        let a = dispatcher.extract(item(0), path.clone(), None);
        let b = dispatcher.extract(item(1), path.clone(), None);
        let (a, b) = tokio::join!(a, b);

        assert!(matches!(a.unwrap_err(), Error::Worker(_)));
        assert!(matches!(b.unwrap_err(), Error::Worker(_)));
        assert_eq!(dispatcher.pending_count(), 0);
        assert!(!dispatcher.is_active());

        // A fresh context is created lazily and works.
        let bytes = dispatcher.extract(item(2), path, None).await.unwrap();
        assert_eq!(bytes, b"payload");
        assert!(dispatcher.is_active());
    }

    #[tokio::test]
    async fn test_dispose_then_reuse() {
        let dispatcher = ExtractionDispatcher::new();
        let (_dir, path) = temp_file(b"abc");

        dispatcher.extract(item(0), path.clone(), None).await.unwrap();
        assert!(dispatcher.is_active());

        dispatcher.dispose();
        assert!(!dispatcher.is_active());

        let bytes = dispatcher.extract(item(1), path, None).await.unwrap();
        assert_eq!(bytes, b"abc");
    }

    #[tokio::test]
    async fn test_concurrent_extractions_correlate_correctly() {
        let dispatcher = ExtractionDispatcher::new();
        let dir = tempfile::tempdir().unwrap();

        let mut futures = Vec::new();
        for i in 0..8u32 {
            let path = dir.path().join(format!("f{i}"));
            let contents = vec![i as u8; (i as usize + 1) * 10];
            std::fs::write(&path, &contents).unwrap();
            let dispatcher = dispatcher.clone();
            futures.push(async move {
                let bytes = dispatcher.extract(item(i), path, None).await.unwrap();
                (i, bytes)
            });
        }

        for (i, bytes) in futures::future::join_all(futures).await {
            assert_eq!(bytes, vec![i as u8; (i as usize + 1) * 10]);
        }
    }

    #[test]
    fn test_read_in_chunks_missing_path() {
        let result = read_in_chunks(Path::new("/definitely/not/here"), |_| {});
        assert!(result.is_err());
    }
}
