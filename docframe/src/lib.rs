#![allow(
    dead_code,
    clippy::module_inception,
    clippy::new_without_default,
)]
//! # docframe - Lazy frames over document collections
//!
//! docframe puts a pandas-like, lazily evaluated frame on top of a document
//! store. Frames never copy the collection; every refinement records a change
//! to the query and the query runs only when a result is asked for.
//!
//! ## Key Features
//!
//! - **Query translation**: `q!(age__gte = 18)` becomes a native filter
//! - **Filtered views**: collections with a fixed, read-only filter
//! - **Indexers**: label based `loc` and positional `iloc` selection
//! - **Grouping**: per-group statistics run as aggregation pipelines
//! - **Merging**: left, inner and right joins into a new collection
//! - **Parallel transforms**: chunked functions over a worker pool
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docframe::frame_builder::FrameBuilder;
//! use docframe::q;
//! use docframe::store::InMemoryDatabase;
//!
//! let db = InMemoryDatabase::new("sales");
//! let frame = FrameBuilder::new().open(db.collection("orders"))?;
//!
//! let big = frame.query(&q!(amount__gte = 100))?;
//! let by_region = big.groupby(&["region"]).sum()?;
//! println!("{}", by_region);
//! ```
//!
//! ## Module Organization
//!
//! - [`common`] - Documents, values and sort specifications
//! - [`errors`] - Error types and result definitions
//! - [`filter`] - Native filters and the `q!` query translator
//! - [`frame`] - Frames, series, indexers, grouping and merging
//! - [`frame_builder`] - Builder for opening frames
//! - [`frame_config`] - Shared frame configuration
//! - [`store`] - Document store abstractions and an in-memory store
//! - [`transform`] - Chunked parallel transforms
//! - [`view`] - Filtered collection views

use std::thread::available_parallelism;

pub mod common;
pub mod errors;
pub mod filter;
pub mod frame;
pub mod frame_builder;
pub mod frame_config;
pub mod store;
pub mod transform;
pub mod view;

/// Returns the number of available CPU cores, or 1 when it cannot be
/// detected.
///
/// # Examples
///
/// ```rust
/// use docframe::get_cpu_count;
///
/// assert!(get_cpu_count() > 0);
/// ```
pub fn get_cpu_count() -> usize {
    available_parallelism()
        .map(|p| p.get())
        .unwrap_or_else(|err| {
            log::warn!("Failed to detect available parallelism: {}. Defaulting to single thread.", err);
            1
        })
}
