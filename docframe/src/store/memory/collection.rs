use super::aggregate::run_pipeline;
use super::database::InMemoryDatabase;
use crate::common::{Atomic, Document, ReadExecutor, SortOrder, SortSpec, Value, WriteExecutor, DOC_ID};
use crate::errors::{ErrorKind, FrameError, FrameResult};
use crate::filter::{matches, Filter};
use crate::store::{Collection, CollectionProvider, DocumentCursor, FindOptions, IndexDefinition, Pipeline};
use std::cmp::Ordering;
use std::collections::HashSet;

#[derive(Default)]
pub(crate) struct CollectionState {
    documents: Vec<Document>,
    indexes: Vec<IndexDefinition>,
    exists: bool,
}

impl CollectionState {
    pub(crate) fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub(crate) fn exists(&self) -> bool {
        self.exists
    }
}

fn check_unique(
    indexes: &[IndexDefinition],
    existing: &[Document],
    incoming: &[Document],
) -> FrameResult<()> {
    for index in indexes.iter().filter(|i| i.is_unique()) {
        let key_of = |doc: &Document| -> Vec<Value> {
            index
                .keys()
                .iter()
                .map(|(field, _)| doc.get_path(field).cloned().unwrap_or_default())
                .collect()
        };
        let mut seen: HashSet<Vec<Value>> = existing.iter().map(key_of).collect();
        for doc in incoming {
            if !seen.insert(key_of(doc)) {
                log::error!("Duplicate key for unique index {}", index.name());
                return Err(FrameError::new(
                    &format!("Duplicate key error on index {}", index.name()),
                    ErrorKind::BackendError,
                ));
            }
        }
    }
    Ok(())
}

/// Collection of an [InMemoryDatabase].
pub(crate) struct InMemoryCollection {
    name: String,
    state: Atomic<CollectionState>,
    database: InMemoryDatabase,
}

impl InMemoryCollection {
    pub(crate) fn new(name: &str, state: Atomic<CollectionState>, database: InMemoryDatabase) -> Self {
        InMemoryCollection {
            name: name.to_string(),
            state,
            database,
        }
    }

    /// Matching documents in result order: nearest first for a `near`
    /// predicate, otherwise insertion order.
    fn scan(&self, filter: &Filter) -> Vec<Document> {
        let matched: Vec<Document> = self.state.read_with(|s| {
            s.documents
                .iter()
                .filter(|doc| matches(filter, doc))
                .cloned()
                .collect()
        });
        order_by_distance(filter, matched)
    }
}

/// Sorts documents nearest-first when the filter carries a `near` predicate.
pub(crate) fn order_by_distance(filter: &Filter, documents: Vec<Document>) -> Vec<Document> {
    let Some((field, near)) = filter.near_query() else {
        return documents;
    };
    let mut with_distance: Vec<(f64, Document)> = documents
        .into_iter()
        .map(|doc| {
            let distance = doc
                .get_path(field)
                .and_then(|v| near.distance_within(v))
                .unwrap_or(f64::INFINITY);
            (distance, doc)
        })
        .collect();
    with_distance.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    with_distance.into_iter().map(|(_, doc)| doc).collect()
}

/// Stable multi-key sort; missing fields sort as null, nulls first.
pub(crate) fn sort_documents(documents: &mut [Document], sort: &SortSpec) {
    let null = Value::Null;
    documents.sort_by(|a, b| {
        for (field, order) in sort.keys() {
            let left = a.get_path(field).unwrap_or(&null);
            let right = b.get_path(field).unwrap_or(&null);
            let ordering = match order {
                SortOrder::Ascending => left.cmp(right),
                SortOrder::Descending => right.cmp(left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn project(doc: Document, fields: &[String]) -> Document {
    let mut projected = Document::with_capacity(fields.len() + 1);
    if let Some(id) = doc.get(DOC_ID) {
        projected.put(DOC_ID, id.clone());
    }
    for field in fields {
        if let Some(value) = doc.get_path(field) {
            projected.put(field, value.clone());
        }
    }
    projected
}

/// Assigns a fresh `_id` in front of the document when it has none.
pub(crate) fn with_identity(doc: Document) -> Document {
    if doc.contains_key(DOC_ID) {
        return doc;
    }
    let mut identified = Document::with_capacity(doc.len() + 1);
    identified.put(DOC_ID, uuid::Uuid::new_v4().simple().to_string());
    identified.merge(&doc);
    identified
}

impl CollectionProvider for InMemoryCollection {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn find(&self, filter: &Filter, options: &FindOptions) -> FrameResult<DocumentCursor> {
        let mut documents = self.scan(filter);
        if let Some(sort) = options.sort_spec() {
            sort_documents(&mut documents, sort);
        }

        let skip = options.skip_count().unwrap_or(0);
        let limit = options.limit_count().unwrap_or(usize::MAX);
        let documents: Vec<Document> = documents
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| match options.projection_fields() {
                Some(fields) => project(doc, fields),
                None => doc,
            })
            .collect();

        log::debug!(
            "find on {} with {} returned {} document(s)",
            self.name,
            filter,
            documents.len()
        );
        Ok(DocumentCursor::from_documents(documents))
    }

    fn count(&self, filter: &Filter) -> FrameResult<usize> {
        Ok(self
            .state
            .read_with(|s| s.documents.iter().filter(|doc| matches(filter, doc)).count()))
    }

    fn distinct(&self, field: &str, filter: &Filter) -> FrameResult<Vec<Value>> {
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for doc in self.scan(filter) {
            let items = match doc.get_path(field) {
                Some(Value::Array(items)) => items.clone(),
                Some(value) => vec![value.clone()],
                None => continue,
            };
            for item in items {
                if seen.insert(item.clone()) {
                    values.push(item);
                }
            }
        }
        Ok(values)
    }

    fn aggregate(&self, pipeline: &Pipeline, allow_disk_use: bool) -> FrameResult<DocumentCursor> {
        log::debug!(
            "aggregate on {} (allow_disk_use={}): {}",
            self.name,
            allow_disk_use,
            pipeline
        );
        let input = self.state.read_with(|s| s.documents.clone());
        let output = run_pipeline(input, pipeline, &self.database)?;
        Ok(DocumentCursor::from_documents(output))
    }

    fn create_index(&self, index: &IndexDefinition) -> FrameResult<String> {
        self.state.write_with(|s| {
            if s.indexes.iter().any(|i| i.name() == index.name()) {
                return Ok(index.name().to_string());
            }
            check_unique(std::slice::from_ref(index), &[], &s.documents)?;
            s.indexes.push(index.clone());
            s.exists = true;
            log::debug!("Created index {} on {}", index.name(), self.name);
            Ok(index.name().to_string())
        })
    }

    fn list_indexes(&self) -> FrameResult<Vec<IndexDefinition>> {
        Ok(self.state.read_with(|s| s.indexes.clone()))
    }

    fn insert_many(&self, documents: Vec<Document>) -> FrameResult<usize> {
        let documents: Vec<Document> = documents.into_iter().map(with_identity).collect();
        self.state.write_with(|s| {
            check_unique(&s.indexes, &s.documents, &documents)?;
            let count = documents.len();
            s.documents.extend(documents);
            s.exists = true;
            Ok(count)
        })
    }

    fn drop_collection(&self) -> FrameResult<()> {
        self.state.write_with(|s| {
            s.documents.clear();
            s.indexes.clear();
            s.exists = false;
        });
        log::debug!("Dropped collection {}", self.name);
        Ok(())
    }

    fn sibling(&self, name: &str) -> FrameResult<Collection> {
        Ok(self.database.collection(name))
    }
}
