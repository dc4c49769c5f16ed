//! Typed access to a collection through the serialization boundary.

use std::marker::PhantomData;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::interceptor::{DocumentInterceptor, VersionedDocument};
use crate::traits::DocumentStore;

/// A collection of `T` whose reads are migrated and whose writes are stamped.
pub struct VersionedCollection<T> {
    store: Arc<dyn DocumentStore>,
    interceptor: DocumentInterceptor,
    collection: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: VersionedDocument> VersionedCollection<T> {
    /// Open `collection` for `T`. Fails with `Config` when `T` is not
    /// registered with the interceptor's settings.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        interceptor: DocumentInterceptor,
        collection: impl Into<String>,
    ) -> Result<Self> {
        interceptor.ensure_registered::<T>()?;
        Ok(Self {
            store,
            interceptor,
            collection: collection.into(),
            _marker: PhantomData,
        })
    }

    /// Open the collection declared by [`VersionedDocument::COLLECTION`].
    pub fn for_type(store: Arc<dyn DocumentStore>, interceptor: DocumentInterceptor) -> Result<Self> {
        let collection = T::COLLECTION.ok_or_else(|| {
            Error::Config(format!("{} does not declare a collection", T::DOCUMENT_TYPE))
        })?;
        Self::new(store, interceptor, collection)
    }

    pub fn name(&self) -> &str {
        &self.collection
    }

    pub async fn insert(&self, item: &T) -> Result<Uuid> {
        let document = self.interceptor.write(item)?;
        self.store.insert(&self.collection, document).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<T>> {
        match self.store.get(&self.collection, id).await? {
            Some(document) => Ok(Some(self.interceptor.read(document)?)),
            None => Ok(None),
        }
    }

    /// Every item in the collection, each migrated on the way out.
    pub async fn find_all(&self) -> Result<Vec<(Uuid, T)>> {
        self.store
            .find_all(&self.collection)
            .await?
            .into_iter()
            .map(|stored| Ok((stored.id, self.interceptor.read(stored.document)?)))
            .collect()
    }

    pub async fn replace(&self, id: Uuid, item: &T) -> Result<()> {
        let document = self.interceptor.write(item)?;
        self.store.replace(&self.collection, id, document).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        self.store.delete(&self.collection, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::locator::MigrationRegistry;
    use crate::memory::InMemoryDocumentStore;
    use crate::migration::MigrationStep;
    use crate::runner::DocumentMigrationRunner;
    use crate::settings::MigrationSettings;
    use crate::version::DocumentVersion;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Car {
        #[serde(rename = "Door")]
        doors: u32,
    }

    impl VersionedDocument for Car {
        const DOCUMENT_TYPE: &'static str = "Car";
        const COLLECTION: Option<&'static str> = Some("cars");
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Loose {
        name: String,
    }

    impl VersionedDocument for Loose {
        const DOCUMENT_TYPE: &'static str = "Loose";
    }

    fn setup() -> (Arc<InMemoryDocumentStore>, DocumentInterceptor) {
        setup_with(
            MigrationSettings::new()
                .with_runtime_document_migration()
                .with_versioned_type::<Car>(None)
                .unwrap(),
        )
    }

    fn setup_with(settings: MigrationSettings) -> (Arc<InMemoryDocumentStore>, DocumentInterceptor) {
        let migrations = MigrationRegistry::new()
            .document(MigrationStep::new("Car", DocumentVersion::new(0, 0, 1), |d| {
                d.rename("Dors", "Door");
                Ok(())
            }))
            .build()
            .unwrap();
        let runner = DocumentMigrationRunner::new(migrations.document, "Version");
        (
            Arc::new(InMemoryDocumentStore::new()),
            DocumentInterceptor::new(runner, Arc::new(settings)),
        )
    }

    #[tokio::test]
    async fn test_insert_stamps_and_get_reads() {
        let (store, interceptor) = setup();
        let cars = VersionedCollection::<Car>::for_type(store.clone(), interceptor).unwrap();
        assert_eq!(cars.name(), "cars");

        let id = cars.insert(&Car { doors: 4 }).await.unwrap();
        let raw = store.get("cars", id).await.unwrap().unwrap();
        assert_eq!(raw.get("Version"), Some(&json!("0.0.1")));

        assert_eq!(cars.get(id).await.unwrap(), Some(Car { doors: 4 }));
        assert_eq!(cars.get(Uuid::now_v7()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_all_migrates_legacy_documents() {
        let (store, interceptor) = setup();
        let legacy = Document::try_from(json!({ "Dors": 2 })).unwrap();
        store.insert("cars", legacy.clone()).await.unwrap();

        let cars = VersionedCollection::<Car>::new(store.clone(), interceptor, "cars").unwrap();
        let all = cars.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].1, Car { doors: 2 });

        // Reads never write back.
        let raw = store.get("cars", all[0].0).await.unwrap().unwrap();
        assert_eq!(raw, legacy);
    }

    #[tokio::test]
    async fn test_replace_and_delete() {
        let (store, interceptor) = setup();
        let cars = VersionedCollection::<Car>::for_type(store, interceptor).unwrap();
        let id = cars.insert(&Car { doors: 2 }).await.unwrap();

        cars.replace(id, &Car { doors: 5 }).await.unwrap();
        assert_eq!(cars.get(id).await.unwrap(), Some(Car { doors: 5 }));

        assert!(cars.delete(id).await.unwrap());
        assert!(!cars.delete(id).await.unwrap());
        assert!(matches!(
            cars.replace(id, &Car { doors: 1 }).await,
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_for_type_without_collection_fails() {
        let (store, interceptor) = setup();
        assert!(matches!(
            VersionedCollection::<Loose>::for_type(store, interceptor),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_stamps_with_runtime_migration_disabled() {
        let (store, interceptor) = setup_with(
            MigrationSettings::new()
                .with_startup_document_migration()
                .with_versioned_type::<Car>(None)
                .unwrap(),
        );
        let cars = VersionedCollection::<Car>::for_type(store.clone(), interceptor).unwrap();

        let id = cars.insert(&Car { doors: 4 }).await.unwrap();
        let raw = store.get("cars", id).await.unwrap().unwrap();
        assert_eq!(raw, Document::try_from(json!({ "Door": 4, "Version": "0.0.1" })).unwrap());
    }

    #[test]
    fn test_unregistered_type_cannot_open_collection() {
        let (store, interceptor) =
            setup_with(MigrationSettings::new().with_runtime_document_migration());
        assert!(matches!(
            VersionedCollection::<Car>::for_type(store, interceptor),
            Err(Error::Config(_))
        ));
    }
}
