//! End-to-end upload pipeline scenarios over an in-memory store and a
//! scriptable backend.

use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::oneshot;
use uuid::Uuid;

use vitrine_cache::ViewCache;
use vitrine_core::{
    CreateEntityRequest, EntityId, EntitySummary, Error, IdempotencyKey, Location, RemoteApi,
    Result, UploadEvent, ViewKey,
};
use vitrine_db::UploadQueue;
use vitrine_jobs::{Uploader, UploaderConfig};

/// Backend double recording created names. Creates whose name contains
/// "reject" fail; an optional gate holds the next create in flight.
struct MockBackend {
    created: Mutex<Vec<String>>,
    next_id: AtomicI64,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl MockBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            created: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            gate: Mutex::new(None),
        })
    }

    fn gate_next_create(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    fn created_names(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteApi for MockBackend {
    async fn create(&self, req: CreateEntityRequest) -> Result<EntitySummary> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(rx) = gate {
            let _ = rx.await;
        }
        if req.name.contains("reject") {
            return Err(Error::Backend("create rejected".into()));
        }
        self.created.lock().unwrap().push(req.name.clone());
        Ok(EntitySummary {
            id: EntityId::new(self.next_id.fetch_add(1, Ordering::SeqCst)),
            kind: req.kind,
            name: req.name,
            location: req.location,
            size_bytes: req.bytes.as_ref().map(|b| b.len() as u64),
            created_at_utc: Utc::now(),
        })
    }

    async fn move_entities(
        &self,
        _ids: &[EntityId],
        _to: Location,
        _key: IdempotencyKey,
    ) -> Result<Vec<EntitySummary>> {
        Ok(Vec::new())
    }

    async fn delete_entities(&self, _ids: &[EntityId], _key: IdempotencyKey) -> Result<()> {
        Ok(())
    }

    async fn rename(&self, _id: EntityId, name: &str) -> Result<EntitySummary> {
        Err(Error::Internal(format!("unexpected rename to {name}")))
    }

    async fn list(&self, _view: ViewKey, _offset: i64, _limit: i64) -> Result<Vec<EntitySummary>> {
        Ok(Vec::new())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn uploader_with(api: Arc<MockBackend>) -> Uploader {
    init_tracing();
    let queue = UploadQueue::open_in_memory().await.unwrap();
    let cache = ViewCache::new(api);
    Uploader::new(queue, cache)
}

fn write_files(dir: &tempfile::TempDir, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.path().join(name);
            std::fs::write(&path, vec![0u8; 1024]).unwrap();
            path
        })
        .collect()
}

/// Drain events until the given batch finishes.
async fn wait_for_batch(
    rx: &mut tokio::sync::broadcast::Receiver<UploadEvent>,
    batch_id: Uuid,
) -> Vec<UploadEvent> {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("batch never finished")
            .expect("event bus closed");
        let done = matches!(event, UploadEvent::BatchFinished { batch_id: id } if id == batch_id);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

#[tokio::test]
async fn batch_of_files_completes_and_clears_queue() {
    let api = MockBackend::new();
    let uploader = uploader_with(api.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(&dir, &["a.bin", "b.bin", "c.bin"]);

    let mut rx = uploader.events().subscribe();
    let batch = uploader
        .submit_files(paths, Location::Unfiled)
        .await
        .unwrap();
    let events = wait_for_batch(&mut rx, batch).await;

    let completed = events
        .iter()
        .filter(|e| matches!(e, UploadEvent::ItemCompleted { .. }))
        .count();
    assert_eq!(completed, 3);

    let mut names = api.created_names();
    names.sort();
    assert_eq!(names, vec!["a.bin", "b.bin", "c.bin"]);

    assert!(uploader.batch_complete(batch));
    assert_eq!(uploader.batch_progress(batch), 100);
    let counts = uploader.batch_counts(batch);
    assert_eq!(counts.succeeded, 3);
    assert_eq!(counts.failed, 0);

    // Terminal success retired every durable record.
    assert!(uploader.recover().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_item_leaves_siblings_and_its_record_intact() {
    let api = MockBackend::new();
    let uploader = uploader_with(api.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(&dir, &["a.bin", "reject-me.bin", "c.bin"]);

    let mut rx = uploader.events().subscribe();
    let batch = uploader
        .submit_files(paths, Location::Unfiled)
        .await
        .unwrap();
    let events = wait_for_batch(&mut rx, batch).await;

    // Siblings succeeded around the failure.
    let mut names = api.created_names();
    names.sort();
    assert_eq!(names, vec!["a.bin", "c.bin"]);
    let failed: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            UploadEvent::ItemFailed { item_id, .. } => Some(*item_id),
            _ => None,
        })
        .collect();
    assert_eq!(failed.len(), 1);

    let counts = uploader.batch_counts(batch);
    assert_eq!(counts.succeeded, 2);
    assert_eq!(counts.failed, 1);
    assert!(uploader.batch_complete(batch));

    // The failed item's record survives for retry/discard, and nothing else.
    let pending = uploader.recover().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].item_id, failed[0]);

    uploader.discard(failed[0]).await.unwrap();
    assert!(uploader.recover().await.unwrap().is_empty());
}

#[tokio::test]
async fn extraction_failure_mid_batch_spares_siblings() {
    init_tracing();
    let api = MockBackend::new();
    let queue = UploadQueue::open_in_memory().await.unwrap();
    let cache = ViewCache::new(api.clone());
    // Limit 1 keeps items 2 and 3 queued while item 1 is in flight.
    let config = UploaderConfig::default().with_max_concurrent(1);
    let uploader = Uploader::with_config(queue, cache, config);

    let dir = tempfile::tempdir().unwrap();
    let blocker_path = write_files(&dir, &["blocker.bin"]);
    let paths = write_files(&dir, &["a.bin", "b.bin", "c.bin"]);
    let doomed = paths[1].clone();

    // A gated single-item batch occupies the one permit, so the whole
    // second batch stays queued behind it.
    let release = api.gate_next_create();
    let mut rx = uploader.events().subscribe();
    let blocker = uploader
        .submit_files(blocker_path, Location::Unfiled)
        .await
        .unwrap();
    // Extraction reports 100 once the blocker is inside its gated create,
    // holding the permit.
    while uploader.batch_progress(blocker) < 100 {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let batch = uploader
        .submit_files(paths, Location::Unfiled)
        .await
        .unwrap();
    // The second file disappears before any of the batch is admitted.
    std::fs::remove_file(&doomed).unwrap();
    release.send(()).unwrap();
    // The batch's own finish necessarily trails all of its item events.
    let events = wait_for_batch(&mut rx, batch).await;

    let failed: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            UploadEvent::ItemFailed { item_id, .. } => Some(*item_id),
            _ => None,
        })
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].ordinal, 1);

    let mut names = api.created_names();
    names.sort();
    assert_eq!(names, vec!["a.bin", "blocker.bin", "c.bin"]);
    let counts = uploader.batch_counts(batch);
    assert_eq!(counts.succeeded, 2);
    assert_eq!(counts.failed, 1);

    // Only the failed item's durable record remains.
    let pending = uploader.recover().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].item_id, failed[0]);
}

#[tokio::test]
async fn aggregate_completion_waits_for_every_item() {
    let api = MockBackend::new();
    let uploader = uploader_with(api.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(&dir, &["slow.bin"]);

    // Hold the single item's create in flight.
    let release = api.gate_next_create();
    let batch = uploader
        .submit_files(paths, Location::Unfiled)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!uploader.batch_complete(batch));
    // Extraction finished, so the durable record is still present with the
    // item mid-flight.
    assert_eq!(uploader.recover().await.unwrap().len(), 1);

    let mut rx = uploader.events().subscribe();
    release.send(()).unwrap();
    wait_for_batch(&mut rx, batch).await;

    assert!(uploader.batch_complete(batch));
    assert!(uploader.recover().await.unwrap().is_empty());
}

#[tokio::test]
async fn link_upload_reports_monotonic_progress_ending_at_100() {
    init_tracing();
    let api = MockBackend::new();
    let queue = UploadQueue::open_in_memory().await.unwrap();
    let cache = ViewCache::new(api.clone());
    // Slow the backend down via the gate so synthetic ticks get to run.
    let release = api.gate_next_create();
    let config = UploaderConfig::default().with_synthetic(vitrine_jobs::SyntheticConfig {
        tick_ms: 5,
        step: 30,
        ceiling: 90,
    });
    let uploader = Uploader::with_config(queue, cache, config);

    let mut rx = uploader.events().subscribe();
    let batch = uploader
        .submit_link("https://example.com/clip", Location::Unfiled)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    release.send(()).unwrap();
    let events = wait_for_batch(&mut rx, batch).await;

    let pcts: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            UploadEvent::ItemProgress { pct, .. } => Some(*pct),
            _ => None,
        })
        .collect();
    assert!(!pcts.is_empty());
    assert!(pcts.windows(2).all(|w| w[0] < w[1]), "regressed: {pcts:?}");
    assert_eq!(pcts.last().copied(), Some(100));
    assert_eq!(api.created_names(), vec!["https://example.com/clip"]);
    assert!(uploader.recover().await.unwrap().is_empty());
}

#[tokio::test]
async fn note_upload_creates_note_entity() {
    let api = MockBackend::new();
    let uploader = uploader_with(api.clone()).await;

    let mut rx = uploader.events().subscribe();
    let batch = uploader
        .submit_note("remember the tripod", Location::Folder(EntityId::new(3)))
        .await
        .unwrap();
    wait_for_batch(&mut rx, batch).await;

    assert_eq!(api.created_names(), vec!["remember the tripod"]);
    assert_eq!(uploader.batch_counts(batch).succeeded, 1);
}

#[tokio::test]
async fn invalid_submissions_enter_nothing() {
    let api = MockBackend::new();
    let uploader = uploader_with(api.clone()).await;

    assert!(matches!(
        uploader.submit_files(Vec::new(), Location::Unfiled).await,
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        uploader
            .submit_files(vec![PathBuf::from("/nonexistent/x.bin")], Location::Unfiled)
            .await,
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        uploader.submit_link("ftp://example.com", Location::Unfiled).await,
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        uploader.submit_note("   ", Location::Unfiled).await,
        Err(Error::InvalidInput(_))
    ));

    // Nothing was persisted or sent.
    assert!(uploader.recover().await.unwrap().is_empty());
    assert!(api.created_names().is_empty());
}
