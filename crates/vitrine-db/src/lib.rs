//! # vitrine-db
//!
//! Durable local store for the vitrine upload queue.
//!
//! This crate provides:
//! - SQLite-backed persistence of in-flight upload records
//! - Best-effort progress checkpointing
//! - Startup recovery scan for resumable/cleanable items
//!
//! ## Example
//!
//! ```rust,ignore
//! use vitrine_db::UploadQueue;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let queue = UploadQueue::open("uploads.db").await?;
//!
//!     for record in queue.pending().await? {
//!         println!("mid-flight from last session: {}", record.item_id);
//!     }
//!     Ok(())
//! }
//! ```

pub mod queue;

// Re-export core types
pub use vitrine_core::*;

pub use queue::{QueuedUpload, UploadQueue};
