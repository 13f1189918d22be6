use crate::common::{Document, SortSpec, Value};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The query a frame sends to its collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub collection: String,
    pub projection: Vec<String>,
    /// Fixed filter in native syntax; `{}` when unfiltered.
    pub query: Document,
    pub sort: Option<SortSpec>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
    /// Access path details, present when requested.
    pub explain: Option<Document>,
}

impl Inspection {
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.put("collection", self.collection.as_str());
        doc.put("projection", self.projection.clone());
        doc.put("query", self.query.clone());
        if let Some(sort) = &self.sort {
            let keys: Document = sort
                .keys()
                .iter()
                .map(|(field, order)| (field.clone(), Value::from(order.direction())))
                .collect();
            doc.put("sort", keys);
        }
        doc.put("skip", self.skip);
        doc.put("limit", self.limit);
        doc.put(
            "explain",
            self.explain
                .clone()
                .map(Value::Document)
                .unwrap_or_else(|| Value::from("specify explain=true")),
        );
        doc
    }
}

/// Recorded inspections, shared by every frame it is handed to.
///
/// Unbounded unless created with a capacity; a long-running process that
/// keeps auto-inspection on should bound it or clear it.
#[derive(Clone)]
pub struct InspectCache {
    inner: Arc<InspectCacheInner>,
}

struct InspectCacheInner {
    entries: Mutex<LruCache<u64, Inspection>>,
    sequence: AtomicU64,
}

impl Default for InspectCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InspectCache {
    pub fn new() -> Self {
        Self::from_lru(LruCache::unbounded())
    }

    /// Keeps only the `capacity` most recent inspections.
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self::from_lru(LruCache::new(capacity))
    }

    fn from_lru(entries: LruCache<u64, Inspection>) -> Self {
        InspectCache {
            inner: Arc::new(InspectCacheInner {
                entries: Mutex::new(entries),
                sequence: AtomicU64::new(0),
            }),
        }
    }

    pub fn record(&self, inspection: Inspection) {
        let key = self.inner.sequence.fetch_add(1, Ordering::Relaxed);
        self.inner.entries.lock().put(key, inspection);
    }

    /// Recorded inspections, oldest first.
    pub fn entries(&self) -> Vec<Inspection> {
        let entries = self.inner.entries.lock();
        entries.iter().rev().map(|(_, v)| v.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.entries.lock().clear();
    }
}
