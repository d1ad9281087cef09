//! # vitrine-cache
//!
//! Multi-view cache coordinator for the vitrine gallery client.
//!
//! This crate provides:
//! - Named, independently cached views of backend entity summaries
//! - Snapshot-guarded optimistic (speculative) mutations
//! - Rollback-on-failure with byte-for-byte restore
//! - Targeted, generation-checked authoritative refreshes
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vitrine_cache::ViewCache;
//! use vitrine_core::{EntityId, Location, ViewKey};
//!
//! let cache = ViewCache::new(api);
//! cache.refresh_now(ViewKey::Unfiled).await?;
//!
//! // UI reflects the move instantly; the cache reconciles with the
//! // backend afterwards, or rolls back if the call fails.
//! cache
//!     .move_entities(&[EntityId::new(7)], ViewKey::Unfiled, Location::Folder(EntityId::new(2)))
//!     .await?;
//! ```

pub mod coordinator;
mod views;

// Re-export core types
pub use vitrine_core::*;

pub use coordinator::ViewCache;
pub use views::Mutation;
