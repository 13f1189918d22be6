//! Storage contract consumed by frames, plus an in-memory reference store.
//!
//! [CollectionProvider] is the minimum a document store must offer: find with
//! projection/sort/skip/limit, count, distinct, aggregate, index creation,
//! bulk insert, drop and access to sibling collections. [Pipeline] models the
//! aggregation stages the frame engine emits.

mod collection;
mod dataset;
mod find_options;
mod index;
pub mod memory;
mod pipeline;

pub use collection::*;
pub use dataset::*;
pub use find_options::*;
pub use index::*;
pub use memory::{InMemoryDatabase, InMemoryDatasetStore};
pub use pipeline::*;
