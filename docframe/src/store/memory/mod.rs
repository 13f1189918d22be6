mod aggregate;
mod collection;
mod database;
mod dataset;

pub use database::*;
pub use dataset::*;
