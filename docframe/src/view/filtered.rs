use crate::common::{Document, Value};
use crate::errors::{ErrorKind, FrameError, FrameResult};
use crate::filter::{Filter, Q};
use crate::store::{Collection, DocumentCursor, FindOptions, IndexDefinition, Pipeline, Stage};
use std::fmt::{Debug, Formatter};

/// A collection with a permanently attached filter.
///
/// Every read merges the caller's filter with the fixed one using AND, so a
/// caller can narrow the view but never widen it. Views always wrap the raw
/// collection; narrowing a view yields a new view over the same collection
/// with the combined filter.
///
/// Document-level writes are refused because it is ambiguous which documents
/// they should target. Mutation goes through aggregation pipelines that write
/// a new collection with `$out`.
///
/// ```rust,ignore
/// let view = FilteredCollection::with_query(collection, &q!(kind = "city"))?;
/// let swiss = view.count(&q!(country = "CH").translate()?)?;
/// ```
#[derive(Clone)]
pub struct FilteredCollection {
    collection: Collection,
    query: Filter,
}

impl FilteredCollection {
    pub fn new(collection: Collection, query: Filter) -> FilteredCollection {
        FilteredCollection { collection, query }
    }

    pub fn with_query(collection: Collection, query: &Q) -> FrameResult<FilteredCollection> {
        Ok(FilteredCollection::new(collection, query.translate()?))
    }

    /// A view that matches every document.
    pub fn unfiltered(collection: Collection) -> FilteredCollection {
        FilteredCollection::new(collection, Filter::All)
    }

    /// A new view over the same collection whose filter also requires `filter`.
    pub fn narrow(&self, filter: Filter) -> FilteredCollection {
        FilteredCollection::new(self.collection.clone(), self.query.clone().and(filter))
    }

    pub fn name(&self) -> String {
        self.collection.name()
    }

    /// The raw collection underneath the view.
    pub fn base(&self) -> &Collection {
        &self.collection
    }

    pub fn query(&self) -> &Filter {
        &self.query
    }

    pub fn is_filtered(&self) -> bool {
        !self.query.is_all()
    }

    fn merged(&self, filter: &Filter) -> Filter {
        self.query.clone().and(filter.clone())
    }

    pub fn find(&self, filter: &Filter, options: &FindOptions) -> FrameResult<DocumentCursor> {
        self.collection.find(&self.merged(filter), options)
    }

    pub fn find_one(&self, filter: &Filter) -> FrameResult<Option<Document>> {
        self.collection.find_one(&self.merged(filter))
    }

    pub fn count(&self, filter: &Filter) -> FrameResult<usize> {
        self.collection.count(&self.merged(filter))
    }

    pub fn distinct(&self, field: &str, filter: &Filter) -> FrameResult<Vec<Value>> {
        self.collection.distinct(field, &self.merged(filter))
    }

    /// Runs `pipeline` behind a leading `$match` on the fixed filter.
    /// Spilling to disk is always allowed.
    pub fn aggregate(&self, pipeline: &Pipeline) -> FrameResult<DocumentCursor> {
        let mut pipeline = pipeline.clone();
        pipeline.prepend(Stage::Match(self.query.clone()));
        self.collection.aggregate(&pipeline, true)
    }

    /// The pipeline [aggregate](Self::aggregate) would send to the store.
    pub fn effective_pipeline(&self, pipeline: &Pipeline) -> Pipeline {
        let mut pipeline = pipeline.clone();
        pipeline.prepend(Stage::Match(self.query.clone()));
        pipeline
    }

    /// Index creation is independent of the filter and passes through.
    pub fn create_index(&self, index: &IndexDefinition) -> FrameResult<String> {
        self.collection.create_index(index)
    }

    pub fn list_indexes(&self) -> FrameResult<Vec<IndexDefinition>> {
        self.collection.list_indexes()
    }

    pub fn insert(&self, _document: Document) -> FrameResult<()> {
        Err(unsupported("insert"))
    }

    pub fn update(&self, _filter: &Filter, _update: &Document) -> FrameResult<()> {
        Err(unsupported("update"))
    }

    pub fn remove(&self, _filter: &Filter) -> FrameResult<()> {
        Err(unsupported("remove"))
    }

    pub fn save(&self, _document: Document) -> FrameResult<()> {
        Err(unsupported("save"))
    }
}

fn unsupported(operation: &str) -> FrameError {
    log::error!("{} is not supported on a filtered collection", operation);
    FrameError::new(
        &format!(
            "{} is not supported on a filtered collection, write through an aggregation pipeline instead",
            operation
        ),
        ErrorKind::UnsupportedOperation,
    )
}

impl Debug for FilteredCollection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "FilteredCollection({}, {})", self.collection.name(), self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryDatabase, Stage};
    use crate::{doc, q, val};

    fn view() -> FilteredCollection {
        let db = InMemoryDatabase::new("view");
        let coll = db.collection("numbers");
        let docs = (0..10).map(|i| doc! { x: (i % 2), y: i }).collect();
        coll.insert_many(docs).unwrap();
        FilteredCollection::with_query(coll, &q!(x = 0)).unwrap()
    }

    #[test]
    fn reads_apply_fixed_filter() {
        let view = view();
        assert_eq!(view.count(&Filter::All).unwrap(), 5);
        assert_eq!(view.base().count(&Filter::All).unwrap(), 10);
        let values = view.distinct("x", &Filter::All).unwrap();
        assert_eq!(values, vec![val!(0)]);
    }

    #[test]
    fn caller_filter_narrows_only() {
        let view = view();
        let wider = q!(x = 1).translate().unwrap();
        assert_eq!(view.count(&wider).unwrap(), 0);
        let narrower = q!(y__gt = 4).translate().unwrap();
        assert_eq!(view.count(&narrower).unwrap(), 2);
    }

    #[test]
    fn narrow_keeps_base_collection() {
        let view = view().narrow(q!(y__lt = 4).translate().unwrap());
        assert_eq!(view.count(&Filter::All).unwrap(), 2);
        assert_eq!(view.name(), "numbers");
    }

    #[test]
    fn aggregate_prepends_match() {
        let view = view();
        let pipeline = Pipeline::new().stage(Stage::Limit(100));
        let effective = view.effective_pipeline(&pipeline);
        assert!(matches!(effective.stages()[0], Stage::Match(_)));
        let docs = view.aggregate(&pipeline).unwrap().collect_documents().unwrap();
        assert_eq!(docs.len(), 5);
    }

    #[test]
    fn legacy_writes_are_unsupported() {
        let view = view();
        for result in [
            view.insert(doc! { x: 0 }),
            view.update(&Filter::All, &doc! { x: 1 }),
            view.remove(&Filter::All),
            view.save(doc! { x: 0 }),
        ] {
            assert_eq!(result.unwrap_err().kind(), &ErrorKind::UnsupportedOperation);
        }
        assert_eq!(view.base().count(&Filter::All).unwrap(), 10);
    }
}
