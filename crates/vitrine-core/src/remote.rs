//! Remote backend collaborator trait.
//!
//! The gallery backend is an external actor-style API assumed to expose
//! idempotent create/move/delete/rename operations returning authoritative
//! results. The client passes a fresh idempotency key with every mutation
//! so a retry after a client-observed timeout is safe.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::id::EntityId;
use crate::models::{EntityKind, EntitySummary, Location, ViewKey};

/// Client-generated idempotency key, one per mutation attempt.
pub type IdempotencyKey = Uuid;

/// Request for creating a new entity.
#[derive(Debug, Clone)]
pub struct CreateEntityRequest {
    pub kind: EntityKind,
    pub name: String,
    pub location: Location,
    /// Raw byte payload (file uploads).
    pub bytes: Option<Vec<u8>>,
    /// Inline content (link URL or note text).
    pub content: Option<String>,
    pub idempotency_key: IdempotencyKey,
}

impl CreateEntityRequest {
    /// Request for a file upload carrying its extracted bytes.
    pub fn file(name: impl Into<String>, location: Location, bytes: Vec<u8>) -> Self {
        Self {
            kind: EntityKind::File,
            name: name.into(),
            location,
            bytes: Some(bytes),
            content: None,
            idempotency_key: Uuid::new_v4(),
        }
    }

    /// Request for a note created from inline content (note text or link URL).
    pub fn note(name: impl Into<String>, location: Location, content: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Note,
            name: name.into(),
            location,
            bytes: None,
            content: Some(content.into()),
            idempotency_key: Uuid::new_v4(),
        }
    }

    /// Request for a new folder.
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Folder,
            name: name.into(),
            location: Location::Unfiled,
            bytes: None,
            content: None,
            idempotency_key: Uuid::new_v4(),
        }
    }
}

/// The backend collaborator contract.
///
/// All mutations are idempotent per [`IdempotencyKey`]; list operations
/// return authoritative view contents with offset/limit pagination.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Create an entity and return its authoritative summary.
    async fn create(&self, req: CreateEntityRequest) -> Result<EntitySummary>;

    /// Move entities to a new location; returns post-move summaries.
    async fn move_entities(
        &self,
        ids: &[EntityId],
        to: Location,
        key: IdempotencyKey,
    ) -> Result<Vec<EntitySummary>>;

    /// Delete entities.
    async fn delete_entities(&self, ids: &[EntityId], key: IdempotencyKey) -> Result<()>;

    /// Rename an entity; returns the post-rename summary.
    async fn rename(&self, id: EntityId, name: &str) -> Result<EntitySummary>;

    /// List the authoritative contents of one view.
    async fn list(&self, view: ViewKey, offset: i64, limit: i64) -> Result<Vec<EntitySummary>>;
}
