//! View state and mutation snapshots.

use std::collections::HashMap;

use tokio::task::AbortHandle;

use vitrine_core::{EntitySummary, ViewKey};

/// Handle to an in-flight authoritative refresh for one view.
pub(crate) struct RefreshHandle {
    pub abort: AbortHandle,
}

/// Cached state of one view.
///
/// `generation` is bumped whenever the view's refresh is cancelled or its
/// entries are authoritatively replaced; a refresh task re-checks its
/// generation under the cache lock before writing, so a cancelled refresh
/// can never clobber a later state.
pub(crate) struct ViewState {
    pub entries: Vec<EntitySummary>,
    /// Set when the cached entries are a speculative guess (or never
    /// loaded) and an authoritative refresh is wanted.
    pub stale: bool,
    pub generation: u64,
    pub refresh: Option<RefreshHandle>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            stale: true,
            generation: 0,
            refresh: None,
        }
    }
}

impl ViewState {
    /// Cancel any in-flight refresh so it can never write into this view.
    pub fn cancel_refresh(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.refresh.take() {
            handle.abort.abort();
        }
    }
}

/// One in-flight mutation's snapshot bundle.
///
/// Captured at Begin, owned exclusively by the mutation, and consumed
/// exactly once by Settle (commit discards it, rollback restores from it).
/// Settling an already-settled mutation is a no-op.
pub struct Mutation {
    pub(crate) snapshots: Option<HashMap<ViewKey, Vec<EntitySummary>>>,
}

impl Mutation {
    /// Whether this mutation has already settled.
    pub fn is_settled(&self) -> bool {
        self.snapshots.is_none()
    }

    /// The views this mutation touched.
    pub fn touched(&self) -> Vec<ViewKey> {
        self.snapshots
            .as_ref()
            .map(|s| s.keys().copied().collect())
            .unwrap_or_default()
    }

    /// The pre-mutation snapshot of one touched view, if not yet settled.
    pub fn snapshot_of(&self, view: ViewKey) -> Option<&[EntitySummary]> {
        self.snapshots
            .as_ref()
            .and_then(|s| s.get(&view))
            .map(|entries| entries.as_slice())
    }
}
