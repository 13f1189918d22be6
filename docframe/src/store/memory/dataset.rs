use super::database::InMemoryDatabase;
use crate::doc;
use crate::errors::{ErrorKind, FrameError, FrameResult};
use crate::filter::Filter;
use crate::store::{Collection, DatasetMeta, DatasetStore, ROWS_KIND};
use dashmap::DashMap;
use std::sync::Arc;

/// Dataset registry over an [InMemoryDatabase].
///
/// A dataset `name` is backed by the collection `<name>.datastore`.
#[derive(Clone)]
pub struct InMemoryDatasetStore {
    inner: Arc<InMemoryDatasetStoreInner>,
}

struct InMemoryDatasetStoreInner {
    database: InMemoryDatabase,
    registry: DashMap<String, DatasetMeta>,
}

impl InMemoryDatasetStore {
    pub fn new(database: InMemoryDatabase) -> InMemoryDatasetStore {
        InMemoryDatasetStore {
            inner: Arc::new(InMemoryDatasetStoreInner {
                database,
                registry: DashMap::new(),
            }),
        }
    }

    pub fn database(&self) -> &InMemoryDatabase {
        &self.inner.database
    }

    /// Registered dataset names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.registry.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn collection_name(name: &str) -> String {
        format!("{}.datastore", name)
    }
}

impl DatasetStore for InMemoryDatasetStore {
    fn collection(&self, name: &str) -> FrameResult<Collection> {
        Ok(self.inner.database.collection(&Self::collection_name(name)))
    }

    fn drop_dataset(&self, name: &str, force: bool) -> FrameResult<bool> {
        let collection_name = Self::collection_name(name);
        let registered = self.inner.registry.remove(name).is_some();
        let exists = self.inner.database.has_collection(&collection_name);
        if !registered && !exists {
            if force {
                log::warn!("Dataset {} does not exist, nothing to drop", name);
                return Ok(false);
            }
            log::error!("Dataset {} does not exist", name);
            return Err(FrameError::new(
                &format!("Dataset {} does not exist", name),
                ErrorKind::CollectionNotFound,
            ));
        }
        self.inner.database.collection(&collection_name).drop_collection()?;
        Ok(true)
    }

    fn put(&self, collection: &Collection, name: &str) -> FrameResult<DatasetMeta> {
        let rows = collection.count(&Filter::All)?;
        let meta = DatasetMeta {
            name: name.to_string(),
            kind: ROWS_KIND.to_string(),
            collection: collection.name(),
            attributes: doc! { rows: rows },
        };
        self.inner.registry.insert(name.to_string(), meta.clone());
        log::info!("Registered dataset {} on collection {}", name, meta.collection);
        Ok(meta)
    }

    fn metadata(&self, name: &str) -> FrameResult<Option<DatasetMeta>> {
        Ok(self.inner.registry.get(name).map(|m| m.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn put_and_drop_dataset() {
        let store = InMemoryDatasetStore::new(InMemoryDatabase::new("ds"));
        let coll = store.collection("sales").unwrap();
        coll.insert_many(vec![doc! { x: 1 }, doc! { x: 2 }]).unwrap();
        let meta = store.put(&coll, "sales").unwrap();
        assert_eq!(meta.collection, "sales.datastore");
        assert_eq!(meta.attributes.get("rows").and_then(|v| v.as_i64()), Some(2));
        assert_eq!(store.list(), vec!["sales".to_string()]);

        assert!(store.drop_dataset("sales", false).unwrap());
        assert!(store.metadata("sales").unwrap().is_none());
        assert_eq!(coll.count(&Filter::All).unwrap(), 0);
    }

    #[test]
    fn drop_missing_dataset() {
        let store = InMemoryDatasetStore::new(InMemoryDatabase::new("ds"));
        assert!(!store.drop_dataset("nope", true).unwrap());
        let err = store.drop_dataset("nope", false).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::CollectionNotFound);
    }
}
