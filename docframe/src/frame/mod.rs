//! Lazy frames and series over document collections.
//!
//! A [Frame] accumulates query state (filter, columns, sort, skip, limit)
//! and resolves it against its collection only when asked for a value. A
//! [Series] is a frame restricted to one column. Both support label and
//! positional indexers, group-by aggregation and, for frames, merges and
//! chunked transforms.

mod cache;
mod capability;
#[allow(clippy::module_inception)]
mod frame;
mod grouper;
mod indexer;
mod merge;
mod series;
pub(crate) mod state;
mod table;

pub use cache::*;
pub use capability::*;
pub use frame::Frame;
pub use grouper::*;
pub use indexer::{IndexSpec, LocIndexer, SeriesIndexer, Slice};
pub use merge::*;
pub use series::*;
pub use table::*;
