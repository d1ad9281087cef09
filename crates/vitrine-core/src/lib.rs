//! # vitrine-core
//!
//! Core types, traits, and abstractions for the vitrine gallery client.
//!
//! This crate provides the foundational data structures and trait
//! definitions that the other vitrine crates depend on: exact-precision
//! entity identifiers, domain models, the error type, the remote backend
//! contract, progress reporting, and the upload event bus.

pub mod defaults;
pub mod error;
pub mod events;
pub mod id;
pub mod logging;
pub mod models;
pub mod progress;
pub mod remote;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::{UploadEvent, UploadEventBus};
pub use id::{EntityId, UploadItemId};
pub use models::{
    EntityKind, EntitySummary, Location, PayloadRef, UploadOutcome, ViewKey,
};
pub use progress::{MonotonicSink, ProgressSink};
pub use remote::{CreateEntityRequest, IdempotencyKey, RemoteApi};
