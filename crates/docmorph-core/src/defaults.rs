//! Centralized default constants for docmorph.
//!
//! All crates reference these constants instead of defining their own magic
//! values.

use crate::version::DocumentVersion;

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Field holding a document's version string.
pub const VERSION_FIELD_NAME: &str = "Version";

/// Baseline for database migration runs when none is configured.
pub const DATABASE_BASELINE: DocumentVersion = DocumentVersion::EMPTY;

// =============================================================================
// STARTUP SWEEP
// =============================================================================

/// Emit a progress event every this many documents during a startup sweep.
pub const SWEEP_PROGRESS_INTERVAL: usize = 1_000;

/// Documents loaded per page during a startup sweep.
pub const SWEEP_PAGE_SIZE: usize = 500;

// =============================================================================
// DATABASE
// =============================================================================

/// Maximum number of connections in the pool.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Minimum number of idle connections kept open.
pub const DB_MIN_CONNECTIONS: u32 = 1;

/// Connection acquire timeout in seconds.
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Idle connection timeout in seconds.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;

/// Maximum connection lifetime in seconds (30 minutes).
pub const DB_MAX_LIFETIME_SECS: u64 = 1800;
