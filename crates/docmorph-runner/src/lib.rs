//! # docmorph-runner
//!
//! Storage-facing migration runs for docmorph: pending database migrations
//! recorded in the ledger, the startup document sweep, and the
//! [`MigrationService`] that wires them together with the interceptor.

pub mod database;
pub mod service;
pub mod signal;
pub mod startup;

pub use database::{DatabaseMigrationRunner, DatabaseRunReport};
pub use service::{MigrationService, StartupReport};
pub use signal::{cancellation, CancelHandle, CancelSignal};
pub use startup::{StartupDocumentMigrationRunner, SweepReport};
