//! Startup document sweep.
//!
//! Brings every stored document of each configured type to the version the
//! running code expects, so reads no longer need to migrate on the fly. Only
//! documents whose contents change are written back. Collections are read a
//! page at a time. Each rewrite is atomic on its own; a sweep that fails part
//! way leaves earlier rewrites in place.

use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};

use docmorph_core::defaults::{SWEEP_PAGE_SIZE, SWEEP_PROGRESS_INTERVAL};
use docmorph_core::{DocumentInterceptor, DocumentStore, Result};

use crate::signal::CancelSignal;

/// What a startup sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Documents examined.
    pub scanned: usize,
    /// Documents rewritten.
    pub migrated: usize,
    /// Collections swept to completion.
    pub collections: usize,
    pub cancelled: bool,
}

/// Sweeps configured collections through the document runner.
#[derive(Debug, Clone)]
pub struct StartupDocumentMigrationRunner {
    interceptor: DocumentInterceptor,
    page_size: usize,
}

impl StartupDocumentMigrationRunner {
    pub fn new(interceptor: DocumentInterceptor) -> Self {
        Self {
            interceptor,
            page_size: SWEEP_PAGE_SIZE,
        }
    }

    /// Load at most `page_size` documents at a time. Zero is treated as one.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sweep every document type that has a collection configured.
    #[instrument(
        skip(self, store, cancel),
        fields(subsystem = "migrations", component = "sweep", op = "run_all")
    )]
    pub async fn run_all(
        &self,
        store: &dyn DocumentStore,
        cancel: &CancelSignal,
    ) -> Result<SweepReport> {
        let start = Instant::now();
        let runner = self.interceptor.runner();
        let mut report = SweepReport::default();

        for (document_type, type_settings) in self.interceptor.settings().document_types() {
            let Some(collection) = type_settings.collection.as_deref() else {
                continue;
            };
            let target = self.interceptor.resolved_version(document_type, None);
            debug!(
                document_type,
                collection,
                to_version = %target,
                page_size = self.page_size,
                "Sweeping collection"
            );

            let mut scanned = 0usize;
            let mut migrated = 0usize;
            loop {
                let page = store.find_page(collection, scanned, self.page_size).await?;
                let last_page = page.len() < self.page_size;

                for stored in page {
                    if cancel.is_cancelled() {
                        warn!(
                            document_type,
                            collection,
                            scanned = report.scanned,
                            migrated = report.migrated,
                            "Startup document sweep cancelled"
                        );
                        report.cancelled = true;
                        return Ok(report);
                    }

                    let mut document = stored.document;
                    let outcome = match runner.run_to(document_type, &mut document, target) {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            error!(
                                document_type,
                                collection,
                                document_id = %stored.id,
                                error = %e,
                                "Startup document migration failed"
                            );
                            return Err(e);
                        }
                    };
                    scanned += 1;
                    report.scanned += 1;

                    if outcome.is_changed() {
                        store.replace(collection, stored.id, document).await?;
                        migrated += 1;
                        report.migrated += 1;
                    }

                    if scanned % SWEEP_PROGRESS_INTERVAL == 0 {
                        debug!(
                            document_type,
                            collection,
                            scanned,
                            migrated,
                            "Startup document sweep progress"
                        );
                    }
                }

                if last_page {
                    break;
                }
            }

            report.collections += 1;
            info!(
                document_type,
                collection,
                scanned,
                migrated,
                "Collection swept"
            );
        }

        info!(
            scanned = report.scanned,
            migrated = report.migrated,
            collections = report.collections,
            duration_ms = start.elapsed().as_millis() as u64,
            "Startup document sweep finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use docmorph_core::{
        Document, DocumentMigrationRunner, DocumentVersion, Error, InMemoryDocumentStore,
        MigrationRegistry, MigrationSettings, MigrationStep,
    };
    use serde_json::json;

    use crate::signal::cancellation;

    fn sweeper(settings: MigrationSettings) -> StartupDocumentMigrationRunner {
        let migrations = MigrationRegistry::new()
            .document(MigrationStep::new("Car", DocumentVersion::new(0, 0, 1), |d| {
                d.rename("Dors", "Door");
                Ok(())
            }))
            .document(MigrationStep::new("Car", DocumentVersion::new(0, 0, 2), |d| {
                if d.get("Door") == Some(&json!("broken")) {
                    return Err(Error::execution("Car@0.0.2", "unreadable door"));
                }
                d.rename("Door", "Doors2");
                Ok(())
            }))
            .build()
            .unwrap();
        let runner = DocumentMigrationRunner::new(migrations.document, "Version");
        StartupDocumentMigrationRunner::new(DocumentInterceptor::new(runner, Arc::new(settings)))
    }

    fn doc(value: serde_json::Value) -> Document {
        Document::try_from(value).unwrap()
    }

    #[tokio::test]
    async fn test_types_without_collection_are_skipped() {
        let sweeper = sweeper(MigrationSettings::new().with_document_type("Car"));
        let store = InMemoryDocumentStore::new();
        store.insert("cars", doc(json!({ "Dors": 1 }))).await.unwrap();

        let report = sweeper.run_all(&store, &CancelSignal::never()).await.unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_failure_keeps_earlier_rewrites() {
        let sweeper = sweeper(MigrationSettings::new().with_collection("Car", "cars"));
        let store = InMemoryDocumentStore::new();
        let first = store.insert("cars", doc(json!({ "Dors": 1 }))).await.unwrap();
        let broken = doc(json!({ "Door": "broken", "Version": "0.0.1" }));
        let second = store.insert("cars", broken.clone()).await.unwrap();

        let result = sweeper.run_all(&store, &CancelSignal::never()).await;
        assert!(matches!(result, Err(Error::MigrationExecution { .. })));

        let rewritten = store.get("cars", first).await.unwrap().unwrap();
        assert_eq!(rewritten.get("Version"), Some(&json!("0.0.2")));
        assert_eq!(store.get("cars", second).await.unwrap(), Some(broken));
    }

    #[tokio::test]
    async fn test_cancelled_sweep_stops_between_documents() {
        let sweeper = sweeper(MigrationSettings::new().with_collection("Car", "cars"));
        let store = InMemoryDocumentStore::new();
        store.insert("cars", doc(json!({ "Dors": 1 }))).await.unwrap();
        let (handle, signal) = cancellation();
        handle.cancel();

        let report = sweeper.run_all(&store, &signal).await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.scanned, 0);
        assert_eq!(report.collections, 0);
    }

    #[tokio::test]
    async fn test_pinned_type_swept_to_pin() {
        let sweeper = sweeper(
            MigrationSettings::new()
                .with_collection("Car", "cars")
                .pin_write_version("Car", DocumentVersion::new(0, 0, 1)),
        );
        let store = InMemoryDocumentStore::new();
        let id = store.insert("cars", doc(json!({ "Dors": 4 }))).await.unwrap();

        let report = sweeper.run_all(&store, &CancelSignal::never()).await.unwrap();
        assert_eq!(report.migrated, 1);
        assert_eq!(
            store.get("cars", id).await.unwrap(),
            Some(doc(json!({ "Door": 4, "Version": "0.0.1" })))
        );
    }

    #[tokio::test]
    async fn test_small_pages_cover_whole_collection() {
        let sweeper =
            sweeper(MigrationSettings::new().with_collection("Car", "cars")).with_page_size(2);
        let store = InMemoryDocumentStore::new();
        for n in 0..5 {
            store.insert("cars", doc(json!({ "Dors": n }))).await.unwrap();
        }
        store
            .insert("cars", doc(json!({ "Version": "0.0.2", "Doors2": 9 })))
            .await
            .unwrap();

        let report = sweeper.run_all(&store, &CancelSignal::never()).await.unwrap();
        assert_eq!(report.scanned, 6);
        assert_eq!(report.migrated, 5);
        assert_eq!(report.collections, 1);
        for stored in store.find_all("cars").await.unwrap() {
            assert_eq!(stored.document.get("Version"), Some(&json!("0.0.2")));
        }
    }
}
