//! Collaborators handed to migration units when they are constructed.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Type-keyed container of shared collaborators.
///
/// Migrations that need a lookup service or similar declare it by asking for
/// it in their factory; the registry resolves it once, at build time.
#[derive(Clone, Default)]
pub struct Services {
    entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collaborator, replacing any previous one of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, service: T) {
        self.entries.insert(TypeId::of::<T>(), Arc::new(service));
    }

    /// Resolve a collaborator.
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|entry| entry.downcast::<T>().ok())
            .ok_or_else(|| {
                Error::Config(format!("no service of type {} was provided", type_name::<T>()))
            })
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
