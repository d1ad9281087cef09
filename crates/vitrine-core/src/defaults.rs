//! Centralized default constants for the vitrine system.
//!
//! **This module is the single source of truth** for all shared default
//! values. Crates reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// CONCURRENCY
// =============================================================================

/// Maximum simultaneously admitted tasks in the bounded runner.
pub const RUNNER_MAX_CONCURRENT: usize = 3;

// =============================================================================
// EXTRACTION
// =============================================================================

/// Chunk size for byte extraction reads; also the progress granularity.
pub const EXTRACT_CHUNK_BYTES: usize = 256 * 1024;

// =============================================================================
// SYNTHETIC PROGRESS
// =============================================================================

/// Tick interval for the synthetic (timed) progress producer.
pub const SYNTHETIC_TICK_MS: u64 = 120;

/// Progress increment per synthetic tick.
pub const SYNTHETIC_TICK_STEP: u8 = 10;

/// Ceiling the synthetic producer climbs to while the request is in flight.
/// The final 100 is only reported on terminal success.
pub const SYNTHETIC_CEILING_PCT: u8 = 90;

// =============================================================================
// EVENTS
// =============================================================================

/// Broadcast capacity for the upload event bus.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// PAGINATION
// =============================================================================

/// Page size used by targeted authoritative view refreshes.
pub const REFRESH_PAGE_LIMIT: i64 = 200;

/// Default page offset.
pub const PAGE_OFFSET: i64 = 0;
