//! Multi-view cache coordinator.
//!
//! Maintains the named, independently-keyed collections of entity
//! summaries the UI renders, and keeps them mutually consistent under
//! optimistic mutations. Every mutating operation follows the same state
//! machine:
//!
//! 1. **Begin** — cancel any in-flight refresh for each touched view and
//!    capture a snapshot of it.
//! 2. **Speculate** — synchronously rewrite the touched views to the
//!    expected outcome, before the backend result is known.
//! 3. **Settle-success** — discard the snapshot, mark the touched views
//!    stale, and spawn a targeted authoritative refresh per view.
//! 4. **Settle-failure** — restore every touched view verbatim from its
//!    snapshot and propagate the backend error.
//!
//! Begin and Speculate run under a single acquisition of the cache lock,
//! so two mutations touching overlapping views serialize their Begin
//! steps: the second always snapshots the first's already-applied
//! speculative state, never a half-applied one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use vitrine_core::{
    defaults, CreateEntityRequest, EntityId, EntityKind, EntitySummary, Error, Location, RemoteApi,
    Result, ViewKey,
};

use crate::views::{Mutation, RefreshHandle, ViewState};

struct CacheInner {
    views: Mutex<HashMap<ViewKey, ViewState>>,
    api: Arc<dyn RemoteApi>,
    refresh_limit: i64,
    /// Negative ids handed to speculative creates until the backend
    /// returns the authoritative id.
    provisional_ids: AtomicI64,
}

/// Cache coordinator over every view the UI renders.
///
/// Cheaply cloneable; clones share the same view state. Views are written
/// only through this coordinator's speculate/settle steps and targeted
/// refreshes — no other component mutates them.
#[derive(Clone)]
pub struct ViewCache {
    inner: Arc<CacheInner>,
}

impl ViewCache {
    /// Create a coordinator over the given backend.
    pub fn new(api: Arc<dyn RemoteApi>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                views: Mutex::new(HashMap::new()),
                api,
                refresh_limit: defaults::REFRESH_PAGE_LIMIT,
                provisional_ids: AtomicI64::new(-1),
            }),
        }
    }

    /// Override the page size used by targeted refreshes.
    pub fn with_refresh_limit(api: Arc<dyn RemoteApi>, limit: i64) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                views: Mutex::new(HashMap::new()),
                api,
                refresh_limit: limit,
                provisional_ids: AtomicI64::new(-1),
            }),
        }
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Current entries of a view (empty if never populated).
    pub async fn entries(&self, view: ViewKey) -> Vec<EntitySummary> {
        self.inner
            .views
            .lock()
            .await
            .get(&view)
            .map(|state| state.entries.clone())
            .unwrap_or_default()
    }

    /// Whether a view's cached contents are a speculative guess or were
    /// never loaded.
    pub async fn is_stale(&self, view: ViewKey) -> bool {
        self.inner
            .views
            .lock()
            .await
            .get(&view)
            .map(|state| state.stale)
            .unwrap_or(true)
    }

    /// Install authoritative contents for a view (initial load, tests).
    pub async fn seed(&self, view: ViewKey, entries: Vec<EntitySummary>) {
        let mut views = self.inner.views.lock().await;
        let state = views.entry(view).or_default();
        state.cancel_refresh();
        state.entries = entries;
        state.stale = false;
    }

    /// Fetch a view from the backend now and install the result.
    pub async fn refresh_now(&self, view: ViewKey) -> Result<Vec<EntitySummary>> {
        let entries = self
            .inner
            .api
            .list(view, defaults::PAGE_OFFSET, self.inner.refresh_limit)
            .await?;
        self.seed(view, entries.clone()).await;
        Ok(entries)
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Create an entity, optimistically inserting a provisional summary
    /// into the view that will render it.
    pub async fn create_entity(&self, req: CreateEntityRequest) -> Result<EntitySummary> {
        if req.name.trim().is_empty() {
            return Err(Error::InvalidInput("entity name is empty".into()));
        }
        let view = match req.kind {
            EntityKind::Folder => ViewKey::Folders,
            _ => ViewKey::for_location(req.location),
        };
        let provisional = EntitySummary {
            id: self.provisional_id(),
            kind: req.kind,
            name: req.name.clone(),
            location: req.location,
            size_bytes: req.bytes.as_ref().map(|b| b.len() as u64),
            created_at_utc: Utc::now(),
        };

        let mut mutation = {
            let mut views = self.inner.views.lock().await;
            let mutation = begin_locked(&mut views, &[view]);
            views.entry(view).or_default().entries.insert(0, provisional);
            mutation
        };

        let start = Instant::now();
        match self.inner.api.create(req).await {
            Ok(summary) => {
                debug!(
                    entity_id = %summary.id,
                    view = %view,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Entity created"
                );
                self.commit(&mut mutation).await;
                Ok(summary)
            }
            Err(e) => {
                warn!(view = %view, error = %e, "Entity create failed, rolling back");
                self.rollback(&mut mutation).await;
                Err(e)
            }
        }
    }

    /// Move entities from a source view to a new location.
    ///
    /// Touches the source and destination views. The speculative write
    /// relocates each entry in a single assignment, so the new location
    /// facet is set and the old one cleared atomically — there is never an
    /// intermediate state with both or neither.
    pub async fn move_entities(
        &self,
        ids: &[EntityId],
        from: ViewKey,
        to: Location,
    ) -> Result<Vec<EntitySummary>> {
        if ids.is_empty() {
            return Err(Error::InvalidInput("no entities to move".into()));
        }
        let dest = ViewKey::for_location(to);

        let mut mutation = {
            let mut views = self.inner.views.lock().await;
            let touched = if from == dest {
                vec![from]
            } else {
                vec![from, dest]
            };
            let mutation = begin_locked(&mut views, &touched);

            let source = views.entry(from).or_default();
            let mut moved = Vec::new();
            source.entries.retain(|entry| {
                if ids.contains(&entry.id) {
                    moved.push(entry.clone());
                    false
                } else {
                    true
                }
            });
            for entry in &mut moved {
                entry.location = to;
            }
            let dest_state = views.entry(dest).or_default();
            for entry in moved.into_iter().rev() {
                dest_state.entries.insert(0, entry);
            }
            mutation
        };

        match self.inner.api.move_entities(ids, to, Uuid::new_v4()).await {
            Ok(summaries) => {
                debug!(entity_count = ids.len(), from = %from, to = %to, "Entities moved");
                self.commit(&mut mutation).await;
                Ok(summaries)
            }
            Err(e) => {
                warn!(from = %from, to = %to, error = %e, "Move failed, rolling back");
                self.rollback(&mut mutation).await;
                Err(e)
            }
        }
    }

    /// Delete entities out of one view.
    pub async fn delete_entities(&self, ids: &[EntityId], from: ViewKey) -> Result<()> {
        if ids.is_empty() {
            return Err(Error::InvalidInput("no entities to delete".into()));
        }
        let mut mutation = {
            let mut views = self.inner.views.lock().await;
            let mutation = begin_locked(&mut views, &[from]);
            views
                .entry(from)
                .or_default()
                .entries
                .retain(|entry| !ids.contains(&entry.id));
            mutation
        };

        match self.inner.api.delete_entities(ids, Uuid::new_v4()).await {
            Ok(()) => {
                debug!(entity_count = ids.len(), from = %from, "Entities deleted");
                self.commit(&mut mutation).await;
                Ok(())
            }
            Err(e) => {
                warn!(from = %from, error = %e, "Delete failed, rolling back");
                self.rollback(&mut mutation).await;
                Err(e)
            }
        }
    }

    /// Delete entities wherever any view currently shows them.
    pub async fn batch_delete(&self, ids: &[EntityId]) -> Result<()> {
        if ids.is_empty() {
            return Err(Error::InvalidInput("no entities to delete".into()));
        }
        let mut mutation = {
            let mut views = self.inner.views.lock().await;
            let touched: Vec<ViewKey> = views
                .iter()
                .filter(|(_, state)| state.entries.iter().any(|e| ids.contains(&e.id)))
                .map(|(view, _)| *view)
                .collect();
            let mutation = begin_locked(&mut views, &touched);
            for view in &touched {
                if let Some(state) = views.get_mut(view) {
                    state.entries.retain(|entry| !ids.contains(&entry.id));
                }
            }
            mutation
        };

        match self.inner.api.delete_entities(ids, Uuid::new_v4()).await {
            Ok(()) => {
                debug!(entity_count = ids.len(), "Batch delete applied");
                self.commit(&mut mutation).await;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Batch delete failed, rolling back");
                self.rollback(&mut mutation).await;
                Err(e)
            }
        }
    }

    /// Rename an entity in every view currently showing it.
    pub async fn rename_entity(&self, id: EntityId, name: &str) -> Result<EntitySummary> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("entity name is empty".into()));
        }
        let mut mutation = {
            let mut views = self.inner.views.lock().await;
            let touched: Vec<ViewKey> = views
                .iter()
                .filter(|(_, state)| state.entries.iter().any(|e| e.id == id))
                .map(|(view, _)| *view)
                .collect();
            let mutation = begin_locked(&mut views, &touched);
            for view in &touched {
                if let Some(state) = views.get_mut(view) {
                    for entry in &mut state.entries {
                        if entry.id == id {
                            entry.name = name.to_string();
                        }
                    }
                }
            }
            mutation
        };

        match self.inner.api.rename(id, name).await {
            Ok(summary) => {
                debug!(entity_id = %id, "Entity renamed");
                self.commit(&mut mutation).await;
                Ok(summary)
            }
            Err(e) => {
                warn!(entity_id = %id, error = %e, "Rename failed, rolling back");
                self.rollback(&mut mutation).await;
                Err(e)
            }
        }
    }

    // =========================================================================
    // SETTLE
    // =========================================================================

    /// Settle-success: discard the snapshot and spawn a targeted
    /// authoritative refresh per touched view. Idempotent.
    pub async fn commit(&self, mutation: &mut Mutation) {
        let Some(snapshots) = mutation.snapshots.take() else {
            return;
        };
        let mut views = self.inner.views.lock().await;
        for view in snapshots.into_keys() {
            let state = views.entry(view).or_default();
            state.stale = true;
            state.cancel_refresh();
            let generation = state.generation;
            let task = tokio::spawn(refresh_view(self.inner.clone(), view, generation));
            state.refresh = Some(RefreshHandle {
                abort: task.abort_handle(),
            });
        }
    }

    /// Settle-failure: restore every touched view verbatim from the held
    /// snapshot. A pure local overwrite — no I/O, cannot fail. Idempotent.
    pub async fn rollback(&self, mutation: &mut Mutation) {
        let Some(snapshots) = mutation.snapshots.take() else {
            return;
        };
        let mut views = self.inner.views.lock().await;
        for (view, entries) in snapshots {
            let state = views.entry(view).or_default();
            state.cancel_refresh();
            state.entries = entries;
        }
    }

    fn provisional_id(&self) -> EntityId {
        EntityId::new(self.inner.provisional_ids.fetch_sub(1, Ordering::SeqCst))
    }
}

/// Begin step, under the already-held cache lock: cancel in-flight
/// refreshes for the touched views and snapshot each one.
fn begin_locked(views: &mut HashMap<ViewKey, ViewState>, touched: &[ViewKey]) -> Mutation {
    let mut snapshots = HashMap::with_capacity(touched.len());
    for view in touched {
        let state = views.entry(*view).or_default();
        state.cancel_refresh();
        snapshots.insert(*view, state.entries.clone());
    }
    Mutation {
        snapshots: Some(snapshots),
    }
}

/// Targeted authoritative refresh for one view.
///
/// Writes only if the view's generation still matches the one captured at
/// spawn time; any intervening Begin has bumped it and this result is
/// discarded.
async fn refresh_view(inner: Arc<CacheInner>, view: ViewKey, generation: u64) {
    let result = inner
        .api
        .list(view, defaults::PAGE_OFFSET, inner.refresh_limit)
        .await;
    let mut views = inner.views.lock().await;
    let Some(state) = views.get_mut(&view) else {
        return;
    };
    if state.generation != generation {
        return;
    }
    match result {
        Ok(entries) => {
            state.entries = entries;
            state.stale = false;
            state.refresh = None;
            debug!(view = %view, "View refreshed from backend");
        }
        Err(e) => {
            // Leave the speculative entries and the stale flag; a later
            // refresh will converge.
            state.refresh = None;
            warn!(view = %view, error = %e, "Authoritative view refresh failed");
        }
    }
}
