//! Version census of a collection.

use std::collections::BTreeMap;

use docmorph_core::{DocumentVersion, StoredDocument};

/// Documents counted per stored version.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct VersionCensus {
    pub versions: BTreeMap<DocumentVersion, usize>,
    /// Documents with no version field.
    pub missing: usize,
    /// Documents whose version field is not a valid version.
    pub malformed: usize,
}

impl VersionCensus {
    pub fn collect<'a>(
        documents: impl IntoIterator<Item = &'a StoredDocument>,
        version_field: &str,
    ) -> Self {
        let mut census = Self::default();
        for stored in documents {
            match stored.document.version(version_field) {
                Ok(Some(version)) => *census.versions.entry(version).or_default() += 1,
                Ok(None) => census.missing += 1,
                Err(_) => census.malformed += 1,
            }
        }
        census
    }

    pub fn total(&self) -> usize {
        self.versions.values().sum::<usize>() + self.missing + self.malformed
    }
}
