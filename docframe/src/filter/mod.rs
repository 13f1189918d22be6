//! Query translation: keyword filters to native predicate trees.
//!
//! Keyword pairs such as `("age__gte", 18)` go through [translate] or the
//! [q!](crate::q) macro and come out as an immutable [Filter]. The same tree
//! is rendered in native syntax for inspection and evaluated by the
//! in-memory store through [matches].

#[allow(clippy::module_inception)]
mod filter;
mod geo;
mod matcher;
mod translator;

pub use filter::*;
pub use geo::*;
pub use matcher::*;
pub use translator::*;
