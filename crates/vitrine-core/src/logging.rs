//! Structured logging schema and field name constants for vitrine.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized field names across
//! every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, operation completions |
//! | DEBUG | Decision points, intermediate values |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "jobs", "cache", "db", "pipeline"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
/// Examples: "extract", "enqueue", "move_entities", "refresh"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Upload item id ("<batch>:<ordinal>") being processed.
pub const ITEM_ID: &str = "item_id";

/// Batch (upload session) UUID.
pub const BATCH_ID: &str = "batch_id";

/// Backend entity id being mutated.
pub const ENTITY_ID: &str = "entity_id";

/// View key a cache operation touches.
pub const VIEW: &str = "view";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Current progress percentage (0–100).
pub const PROGRESS_PCT: &str = "progress_pct";

/// Payload byte length.
pub const PAYLOAD_BYTES: &str = "payload_bytes";

/// Number of entities touched by a mutation.
pub const ENTITY_COUNT: &str = "entity_count";
