//! Structured logging field name constants for docmorph.
//!
//! All crates use these constants for consistent structured logging fields so
//! log aggregation can query migrations by the same names everywhere.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | A migration body or storage call failed and the run was aborted |
//! | WARN  | A run was cancelled before completing |
//! | INFO  | Lifecycle events, applied database migrations, sweep summaries |
//! | DEBUG | Chain selection, skipped migrations, configuration choices |
//! | TRACE | Per-document and per-step events |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "migrations", "db", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "locator", "document_runner", "database_runner", "sweep", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "build", "run", "run_all", "append"
pub const OPERATION: &str = "op";

// ─── Migration fields ──────────────────────────────────────────────────────

/// Document type a chain is applied to.
pub const DOCUMENT_TYPE: &str = "document_type";

/// Ledger id of a database migration.
pub const MIGRATION_ID: &str = "migration_id";

/// Version a document or run started from.
pub const FROM_VERSION: &str = "from_version";

/// Version a document or run is moving to.
pub const TO_VERSION: &str = "to_version";

/// Number of migration steps applied.
pub const STEP_COUNT: &str = "steps";

/// Collection being swept.
pub const COLLECTION: &str = "collection";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of migrations applied in a run.
pub const APPLIED_COUNT: &str = "applied";

/// Number of migrations skipped because the ledger already has them.
pub const SKIPPED_COUNT: &str = "skipped";

/// Number of documents examined by a sweep.
pub const SCANNED_COUNT: &str = "scanned";

/// Number of documents rewritten by a sweep.
pub const MIGRATED_COUNT: &str = "migrated";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Whether a run stopped on a cancellation signal.
pub const CANCELLED: &str = "cancelled";
