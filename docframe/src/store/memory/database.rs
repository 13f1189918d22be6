use super::collection::{CollectionState, InMemoryCollection};
use crate::common::{atomic, Atomic, Document, ReadExecutor};
use crate::store::Collection;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory document database used as the reference store.
///
/// Collections are created on first use and live as long as the database.
/// Every handle returned for the same name shares the same documents, and
/// all collection operations are safe to call from worker threads.
///
/// ```rust,ignore
/// let db = InMemoryDatabase::new("analytics");
/// let cities = db.collection("cities");
/// cities.insert_many(vec![doc! { name: "Bern" }])?;
/// ```
#[derive(Clone)]
pub struct InMemoryDatabase {
    inner: Arc<InMemoryDatabaseInner>,
}

impl InMemoryDatabase {
    pub fn new(name: &str) -> InMemoryDatabase {
        InMemoryDatabase {
            inner: Arc::new(InMemoryDatabaseInner {
                name: name.to_string(),
                collections: DashMap::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Handle to a collection, creating an empty one if needed.
    pub fn collection(&self, name: &str) -> Collection {
        let state = self.inner.state(name);
        Collection::new(InMemoryCollection::new(name, state, self.clone()))
    }

    /// Names of collections that currently hold data or indexes.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .collections
            .iter()
            .filter(|entry| entry.value().read_with(|s| s.exists()))
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.inner
            .collections
            .get(name)
            .map_or(false, |state| state.read_with(|s| s.exists()))
    }

    /// Snapshot of all documents of a collection; empty when it doesn't exist.
    pub(crate) fn documents(&self, name: &str) -> Vec<Document> {
        match self.inner.collections.get(name) {
            Some(state) => state.read_with(|s| s.documents().to_vec()),
            None => Vec::new(),
        }
    }
}

struct InMemoryDatabaseInner {
    name: String,
    collections: DashMap<String, Atomic<CollectionState>>,
}

impl InMemoryDatabaseInner {
    fn state(&self, name: &str) -> Atomic<CollectionState> {
        self.collections
            .entry(name.to_string())
            .or_insert_with(|| atomic(CollectionState::default()))
            .value()
            .clone()
    }
}
