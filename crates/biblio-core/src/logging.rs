//! Structured logging field name constants for Biblio.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (bulk items, search hits) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → task → sub-calls.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "search", "tasks", "orcid"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "snapshots", "bulk", "reindexer", "hub", "cache"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "update", "search", "flush", "switch_alias"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Dataset or publication id.
pub const RECORD_ID: &str = "record_id";

/// Record kind ("dataset", "publication").
pub const RECORD_KIND: &str = "record_kind";

/// Snapshot id of a record version.
pub const SNAPSHOT_ID: &str = "snapshot_id";

/// Acting user id.
pub const USER_ID: &str = "user_id";

/// Background task id.
pub const TASK_ID: &str = "task_id";

/// Search index or alias name.
pub const INDEX: &str = "index";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search or query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of items in a bulk request.
pub const BATCH_SIZE: &str = "batch_size";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

/// Database table affected.
pub const DB_TABLE: &str = "db_table";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Cache hit indicator.
pub const CACHE_HIT: &str = "cache_hit";
