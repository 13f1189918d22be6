use crate::common::{Document, Value};
use crate::errors::FrameResult;
use crate::filter::Filter;
use crate::store::{FindOptions, IndexDefinition, Pipeline};
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

/// Contract a document store has to offer for frames to run on it.
///
/// Implementations are shared between worker threads, so every method takes
/// `&self` and errors are reported as store errors (`CollectionNotFound`,
/// `BackendError`) which the frame engine passes through unchanged.
pub trait CollectionProvider: Send + Sync {
    /// Name of the collection within its database.
    fn name(&self) -> String;

    /// Finds documents matching a filter with projection, sort, skip and limit.
    ///
    /// A `near` predicate orders results nearest-first unless the options
    /// carry an explicit sort.
    fn find(&self, filter: &Filter, options: &FindOptions) -> FrameResult<DocumentCursor>;

    /// Returns the first matching document in natural order.
    fn find_one(&self, filter: &Filter) -> FrameResult<Option<Document>> {
        let mut cursor = self.find(filter, &FindOptions::new().limit(1))?;
        cursor.next().transpose()
    }

    /// Counts documents matching a filter.
    fn count(&self, filter: &Filter) -> FrameResult<usize>;

    /// Distinct values of a field in first-seen order of a filtered scan.
    fn distinct(&self, field: &str, filter: &Filter) -> FrameResult<Vec<Value>>;

    /// Runs an aggregation pipeline.
    fn aggregate(&self, pipeline: &Pipeline, allow_disk_use: bool) -> FrameResult<DocumentCursor>;

    /// Creates an index and returns its name. Creating an existing index is a no-op.
    fn create_index(&self, index: &IndexDefinition) -> FrameResult<String>;

    fn list_indexes(&self) -> FrameResult<Vec<IndexDefinition>>;

    /// Inserts documents, assigning `_id` where missing. Returns the count inserted.
    fn insert_many(&self, documents: Vec<Document>) -> FrameResult<usize>;

    /// Removes every document and index of the collection.
    fn drop_collection(&self) -> FrameResult<()>;

    /// Another collection of the same database.
    fn sibling(&self, name: &str) -> FrameResult<Collection>;
}

/// Shared handle to a collection.
///
/// Cloning is cheap; every clone refers to the same underlying collection.
/// Frames hold this handle but never own the collection exclusively.
#[derive(Clone)]
pub struct Collection {
    inner: Arc<dyn CollectionProvider>,
}

impl Collection {
    pub fn new<T: CollectionProvider + 'static>(provider: T) -> Self {
        Collection {
            inner: Arc::new(provider),
        }
    }

    pub fn from_arc(provider: Arc<dyn CollectionProvider>) -> Self {
        Collection { inner: provider }
    }

    /// True when both handles point to the same collection of the same database.
    pub fn same_as(&self, other: &Collection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.name() == other.inner.name()
    }
}

impl Deref for Collection {
    type Target = Arc<dyn CollectionProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Debug for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Collection({})", self.inner.name())
    }
}

/// Forward-only stream of documents returned by find and aggregate.
pub struct DocumentCursor {
    iter: Box<dyn Iterator<Item = FrameResult<Document>> + Send>,
}

impl DocumentCursor {
    pub fn new<I>(iter: I) -> Self
    where
        I: Iterator<Item = FrameResult<Document>> + Send + 'static,
    {
        DocumentCursor {
            iter: Box::new(iter),
        }
    }

    pub fn from_documents(documents: Vec<Document>) -> Self {
        DocumentCursor::new(documents.into_iter().map(Ok))
    }

    /// Drains the cursor, stopping at the first error.
    pub fn collect_documents(self) -> FrameResult<Vec<Document>> {
        self.collect()
    }
}

impl Iterator for DocumentCursor {
    type Item = FrameResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::errors::{ErrorKind, FrameError};

    #[test]
    fn cursor_from_documents() {
        let cursor = DocumentCursor::from_documents(vec![doc! { a: 1 }, doc! { a: 2 }]);
        let docs = cursor.collect_documents().unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn cursor_stops_at_first_error() {
        let items = vec![
            Ok(doc! { a: 1 }),
            Err(FrameError::new("lost connection", ErrorKind::BackendError)),
            Ok(doc! { a: 2 }),
        ];
        let err = DocumentCursor::new(items.into_iter()).collect_documents().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::BackendError);
    }
}
