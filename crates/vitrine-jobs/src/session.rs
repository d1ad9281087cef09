//! Upload session aggregator.
//!
//! Groups the items submitted in one user gesture (one multi-file
//! selection, one link, one note) under a batch identifier and exposes
//! aggregate progress for display. Pure bookkeeping; no I/O.

use std::collections::HashMap;

use uuid::Uuid;

use vitrine_core::{UploadItemId, UploadOutcome};

/// Per-member state tracked by a session.
#[derive(Debug, Clone, Copy)]
struct MemberState {
    progress_pct: u8,
    outcome: UploadOutcome,
}

/// Terminal-outcome counts for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionCounts {
    pub pending: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// One logical upload session: a batch of concurrently in-flight items.
#[derive(Debug, Clone)]
pub struct UploadSession {
    batch_id: Uuid,
    members: HashMap<UploadItemId, MemberState>,
}

impl UploadSession {
    /// Create an empty session for a batch.
    pub fn new(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            members: HashMap::new(),
        }
    }

    /// The batch identifier this session tracks.
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// Register a member item at 0% pending.
    pub fn add_item(&mut self, item_id: UploadItemId) {
        self.members.insert(
            item_id,
            MemberState {
                progress_pct: 0,
                outcome: UploadOutcome::Pending,
            },
        );
    }

    /// Update a member's progress. Clamped to 0–100 and monotonic per item;
    /// unknown items are ignored.
    pub fn set_progress(&mut self, item_id: UploadItemId, pct: u8) {
        if let Some(member) = self.members.get_mut(&item_id) {
            member.progress_pct = member.progress_pct.max(pct.min(100));
        }
    }

    /// Record a member's outcome. A successful item implies 100% progress.
    pub fn set_outcome(&mut self, item_id: UploadItemId, outcome: UploadOutcome) {
        if let Some(member) = self.members.get_mut(&item_id) {
            member.outcome = outcome;
            if outcome == UploadOutcome::Succeeded {
                member.progress_pct = 100;
            }
        }
    }

    /// Number of member items.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the session has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Aggregate progress: arithmetic mean of member progress percentages.
    /// An empty session reports 0.
    pub fn aggregate_progress(&self) -> u8 {
        if self.members.is_empty() {
            return 0;
        }
        let sum: u32 = self.members.values().map(|m| m.progress_pct as u32).sum();
        (sum / self.members.len() as u32) as u8
    }

    /// True only when every member has reached a terminal outcome.
    pub fn is_complete(&self) -> bool {
        !self.members.is_empty() && self.members.values().all(|m| m.outcome.is_terminal())
    }

    /// Terminal-outcome counts for display.
    pub fn counts(&self) -> SessionCounts {
        let mut counts = SessionCounts::default();
        for member in self.members.values() {
            match member.outcome {
                UploadOutcome::Pending => counts.pending += 1,
                UploadOutcome::Succeeded => counts.succeeded += 1,
                UploadOutcome::Failed => counts.failed += 1,
            }
        }
        counts
    }
}
