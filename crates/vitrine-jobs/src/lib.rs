//! # vitrine-jobs
//!
//! Background upload processing for the vitrine gallery client.
//!
//! This crate provides:
//! - Admission-controlled concurrent upload execution
//! - Off-runtime byte extraction with per-item progress
//! - Synthetic timed progress for payloads with no byte stream
//! - Per-batch session aggregation and lifecycle events
//!
//! ## Example
//!
//! ```ignore
//! use vitrine_jobs::{Uploader, UploaderConfig};
//! use vitrine_cache::ViewCache;
//! use vitrine_core::{Location, UploadEvent};
//! use vitrine_db::UploadQueue;
//!
//! let queue = UploadQueue::open("uploads.db").await?;
//! let cache = ViewCache::new(api);
//! let uploader = Uploader::with_config(queue, cache, UploaderConfig::from_env()?);
//!
//! // Resume anything left over from the previous run.
//! for record in uploader.recover().await? {
//!     println!("recoverable: {}", record.item_id);
//! }
//!
//! let mut events = uploader.events().subscribe();
//! let batch = uploader.submit_files(paths, Location::Unfiled).await?;
//! while let Ok(event) = events.recv().await {
//!     if let UploadEvent::BatchFinished { batch_id } = event {
//!         if batch_id == batch {
//!             break;
//!         }
//!     }
//! }
//! ```

use std::sync::{Mutex, MutexGuard};

pub mod extraction;
pub mod pipeline;
pub mod progress;
pub mod runner;
pub mod session;

/// Lock helper tolerant of poisoning (every guarded section is a plain
/// insert/remove, so the data stays consistent).
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// Re-export core types
pub use vitrine_core::*;

pub use extraction::ExtractionDispatcher;
pub use pipeline::{Uploader, UploaderConfig};
pub use progress::{SyntheticConfig, SyntheticProgress};
pub use runner::{BoundedRunner, SubmittedTask};
pub use session::{SessionCounts, UploadSession};
