//! Upload pipeline.
//!
//! Wires the bounded runner, the extraction dispatcher, the durable queue,
//! the view cache, and the session aggregator into one ingestion path.
//! Every submission is validated before anything enters the pipeline, then
//! persisted to the durable queue before byte extraction starts, so a
//! crash mid-flight leaves a recoverable record rather than a lost upload.
//!
//! Per-item independence is the core guarantee: one item's failure leaves
//! its siblings running, its queue record in place for retry or discard,
//! and the batch completing normally around it.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vitrine_cache::ViewCache;
use vitrine_core::{
    defaults, CreateEntityRequest, Error, Location, MonotonicSink, PayloadRef, ProgressSink,
    Result, UploadEvent, UploadEventBus, UploadItemId, UploadOutcome,
};
use vitrine_db::{QueuedUpload, UploadQueue};

use crate::extraction::ExtractionDispatcher;
use crate::lock;
use crate::progress::{SyntheticConfig, SyntheticProgress};
use crate::runner::BoundedRunner;
use crate::session::{SessionCounts, UploadSession};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Maximum concurrently processed items across all batches.
    pub max_concurrent: usize,
    /// Synthetic progress cadence for link/note items.
    pub synthetic: SyntheticConfig,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::RUNNER_MAX_CONCURRENT,
            synthetic: SyntheticConfig::default(),
        }
    }
}

impl UploaderConfig {
    /// Build from environment variables, falling back to defaults.
    ///
    /// Recognized: `VITRINE_MAX_CONCURRENT_UPLOADS`,
    /// `VITRINE_SYNTHETIC_TICK_MS`. A variable that is set but does not
    /// parse is a configuration error, not a silent fallback.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(limit) = read_env("VITRINE_MAX_CONCURRENT_UPLOADS")? {
            config.max_concurrent = limit;
        }
        if let Some(tick_ms) = read_env("VITRINE_SYNTHETIC_TICK_MS")? {
            config.synthetic.tick_ms = tick_ms;
        }
        Ok(config)
    }

    pub fn with_max_concurrent(mut self, limit: usize) -> Self {
        self.max_concurrent = limit;
        self
    }

    pub fn with_synthetic(mut self, synthetic: SyntheticConfig) -> Self {
        self.synthetic = synthetic;
        self
    }
}

fn read_env<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid {key}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// The ingestion pipeline front door.
///
/// Cheaply cloneable; clones share the runner, dispatcher, queue, cache,
/// event bus, and session table.
#[derive(Clone)]
pub struct Uploader {
    runner: BoundedRunner,
    dispatcher: ExtractionDispatcher,
    queue: UploadQueue,
    cache: ViewCache,
    events: UploadEventBus,
    sessions: Arc<Mutex<HashMap<Uuid, UploadSession>>>,
    synthetic: SyntheticConfig,
}

impl Uploader {
    /// Create a pipeline over the given durable queue and view cache.
    pub fn new(queue: UploadQueue, cache: ViewCache) -> Self {
        Self::with_config(queue, cache, UploaderConfig::default())
    }

    /// Create a pipeline with explicit configuration.
    pub fn with_config(queue: UploadQueue, cache: ViewCache, config: UploaderConfig) -> Self {
        Self {
            runner: BoundedRunner::new(config.max_concurrent),
            dispatcher: ExtractionDispatcher::new(),
            queue,
            cache,
            events: UploadEventBus::default(),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            synthetic: config.synthetic,
        }
    }

    /// The event bus carrying per-item lifecycle events.
    pub fn events(&self) -> &UploadEventBus {
        &self.events
    }

    // =========================================================================
    // SUBMISSION
    // =========================================================================

    /// Submit one multi-file selection as a batch.
    ///
    /// Every path is validated up front; a missing or unreadable file
    /// rejects the whole submission before anything enters the pipeline.
    /// Returns the batch id once every item is persisted and admitted.
    pub async fn submit_files(&self, paths: Vec<PathBuf>, location: Location) -> Result<Uuid> {
        if paths.is_empty() {
            return Err(Error::InvalidInput("no files selected".into()));
        }
        let mut payloads = Vec::with_capacity(paths.len());
        for path in paths {
            let meta = tokio::fs::metadata(&path).await.map_err(|e| {
                Error::InvalidInput(format!("unreadable file {}: {e}", path.display()))
            })?;
            if !meta.is_file() {
                return Err(Error::InvalidInput(format!(
                    "not a regular file: {}",
                    path.display()
                )));
            }
            payloads.push(PayloadRef::File {
                path,
                size_bytes: meta.len(),
            });
        }
        self.submit_batch(payloads, location).await
    }

    /// Submit a single link.
    pub async fn submit_link(&self, url: &str, location: Location) -> Result<Uuid> {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::InvalidInput(format!("malformed link URL: {url}")));
        }
        self.submit_batch(vec![PayloadRef::Link { url: url.into() }], location)
            .await
    }

    /// Submit a single note.
    pub async fn submit_note(&self, text: &str, location: Location) -> Result<Uuid> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("note text is empty".into()));
        }
        self.submit_batch(vec![PayloadRef::Note { text: text.into() }], location)
            .await
    }

    /// Persist and admit a validated batch.
    async fn submit_batch(&self, payloads: Vec<PayloadRef>, location: Location) -> Result<Uuid> {
        let batch_id = Uuid::new_v4();
        let mut session = UploadSession::new(batch_id);
        let items: Vec<(UploadItemId, PayloadRef)> = payloads
            .into_iter()
            .enumerate()
            .map(|(ordinal, payload)| (UploadItemId::new(batch_id, ordinal as u32), payload))
            .collect();
        for (item_id, _) in &items {
            session.add_item(*item_id);
        }
        lock(&self.sessions).insert(batch_id, session);

        info!(batch_id = %batch_id, entity_count = items.len(), "Upload batch submitted");

        let mut drivers = Vec::with_capacity(items.len());
        for (item_id, payload) in items {
            // Durable record first, so a crash between here and extraction
            // leaves the item recoverable.
            if let Err(e) = self.queue.enqueue(item_id, &payload, 0).await {
                warn!(item_id = %item_id, error = %e, "Enqueue failed, item not admitted");
                self.settle_failure(item_id, &e);
                continue;
            }
            drivers.push(self.drive_item(item_id, payload, location));
        }

        let events = self.events.clone();
        tokio::spawn(async move {
            join_all(drivers).await;
            events.emit(UploadEvent::BatchFinished { batch_id });
            debug!(batch_id = %batch_id, "Upload batch finished");
        });

        Ok(batch_id)
    }

    /// Spawn the full lifecycle of one item; the returned handle resolves
    /// when the item is terminal.
    fn drive_item(
        &self,
        item_id: UploadItemId,
        payload: PayloadRef,
        location: Location,
    ) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            this.events.emit(UploadEvent::ItemStarted {
                item_id,
                kind: payload.entity_kind(),
            });
            let sink = this.progress_sink(item_id);

            let task = {
                let this = this.clone();
                let payload = payload.clone();
                async move { this.process_item(item_id, payload, location, sink).await }
            };
            // Admission happens inside the runner; this await is the queue.
            match this.runner.submit(task).await {
                Ok(entity) => {
                    this.settle_success(item_id).await;
                    this.events
                        .emit(UploadEvent::ItemCompleted { item_id, entity });
                }
                Err(e) => {
                    warn!(item_id = %item_id, error = %e, "Upload item failed");
                    this.settle_failure(item_id, &e);
                }
            }
        })
    }

    /// The bounded section of one item's lifecycle: byte acquisition plus
    /// the optimistic create through the cache.
    async fn process_item(
        &self,
        item_id: UploadItemId,
        payload: PayloadRef,
        location: Location,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<vitrine_core::EntitySummary> {
        let name = payload.display_name();
        match payload {
            PayloadRef::File { path, .. } => {
                let bytes = self.dispatcher.extract(item_id, path, Some(sink)).await?;
                self.cache
                    .create_entity(CreateEntityRequest::file(name, location, bytes))
                    .await
            }
            PayloadRef::Link { url } => {
                let ticker = SyntheticProgress::start(sink, self.synthetic.clone());
                let result = self
                    .cache
                    .create_entity(CreateEntityRequest::note(name, location, url))
                    .await;
                match &result {
                    Ok(_) => ticker.finish(),
                    Err(_) => ticker.abandon(),
                }
                result
            }
            PayloadRef::Note { text } => {
                let ticker = SyntheticProgress::start(sink, self.synthetic.clone());
                let result = self
                    .cache
                    .create_entity(CreateEntityRequest::note(name, location, text))
                    .await;
                match &result {
                    Ok(_) => ticker.finish(),
                    Err(_) => ticker.abandon(),
                }
                result
            }
        }
    }

    /// Per-item sink fanning progress out to the session table, the event
    /// bus, and (best-effort) the durable queue.
    fn progress_sink(&self, item_id: UploadItemId) -> Arc<dyn ProgressSink> {
        let sessions = self.sessions.clone();
        let events = self.events.clone();
        let queue = self.queue.clone();
        Arc::new(MonotonicSink::new(move |pct: u8| {
            if let Some(session) = lock(&sessions).get_mut(&item_id.batch) {
                session.set_progress(item_id, pct);
            }
            events.emit(UploadEvent::ItemProgress { item_id, pct });
            let queue = queue.clone();
            tokio::spawn(async move {
                queue.update_progress(item_id, pct).await;
            });
        }))
    }

    async fn settle_success(&self, item_id: UploadItemId) {
        // Terminal success retires the durable record; a failure here only
        // costs a redundant recovery entry after restart.
        if let Err(e) = self.queue.dequeue(item_id).await {
            warn!(item_id = %item_id, error = %e, "Dequeue after success failed");
        }
        if let Some(session) = lock(&self.sessions).get_mut(&item_id.batch) {
            session.set_outcome(item_id, UploadOutcome::Succeeded);
        }
    }

    fn settle_failure(&self, item_id: UploadItemId, error: &Error) {
        // Record stays queued for retry or discard.
        if let Some(session) = lock(&self.sessions).get_mut(&item_id.batch) {
            session.set_outcome(item_id, UploadOutcome::Failed);
        }
        self.events.emit(UploadEvent::ItemFailed {
            item_id,
            error: error.to_string(),
        });
    }

    // =========================================================================
    // SESSIONS AND RECOVERY
    // =========================================================================

    /// Aggregate progress of a batch (0 for unknown batches).
    pub fn batch_progress(&self, batch_id: Uuid) -> u8 {
        lock(&self.sessions)
            .get(&batch_id)
            .map(|s| s.aggregate_progress())
            .unwrap_or(0)
    }

    /// Terminal-outcome counts of a batch.
    pub fn batch_counts(&self, batch_id: Uuid) -> SessionCounts {
        lock(&self.sessions)
            .get(&batch_id)
            .map(|s| s.counts())
            .unwrap_or_default()
    }

    /// Whether every item of a batch has settled.
    pub fn batch_complete(&self, batch_id: Uuid) -> bool {
        lock(&self.sessions)
            .get(&batch_id)
            .map(|s| s.is_complete())
            .unwrap_or(false)
    }

    /// Surviving records from earlier runs, for the resumption UI.
    pub async fn recover(&self) -> Result<Vec<QueuedUpload>> {
        self.queue.pending().await
    }

    /// Drop a failed or recovered item's durable record.
    pub async fn discard(&self, item_id: UploadItemId) -> Result<()> {
        self.queue.dequeue(item_id).await?;
        debug!(item_id = %item_id, "Upload record discarded");
        Ok(())
    }
}
