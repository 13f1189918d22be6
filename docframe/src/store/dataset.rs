use crate::common::Document;
use crate::errors::FrameResult;
use crate::store::Collection;

/// Metadata a dataset store returns after registering a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetMeta {
    pub name: String,
    pub kind: String,
    pub collection: String,
    pub attributes: Document,
}

/// Kind recorded for datasets stored as one document per row.
pub const ROWS_KIND: &str = "frame.rows";

/// Named dataset registry that owns collections on behalf of users.
///
/// Only the part needed to persist transform output is modeled: resolving a
/// dataset name to its backing collection, dropping it, and recording a
/// collection under a name.
pub trait DatasetStore: Send + Sync {
    /// Backing collection for a dataset name, created on first use.
    fn collection(&self, name: &str) -> FrameResult<Collection>;

    /// Drops a dataset and its collection. With `force`, a missing dataset is not an error.
    fn drop_dataset(&self, name: &str, force: bool) -> FrameResult<bool>;

    /// Records `collection` as the dataset `name` and returns its metadata.
    fn put(&self, collection: &Collection, name: &str) -> FrameResult<DatasetMeta>;

    fn metadata(&self, name: &str) -> FrameResult<Option<DatasetMeta>>;
}
