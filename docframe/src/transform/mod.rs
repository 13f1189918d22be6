//! Chunked parallel transforms.
//!
//! [Frame::transform](crate::frame::Frame::transform) records a user function
//! and its options on a frame. [Frame::persist](crate::frame::Frame::persist)
//! (or resolving the frame) then splits the rows into chunks with a
//! [Chunker], runs the function on each chunk through a [WorkerPool] and
//! writes every chunk's rows to the output collection, stamped with row
//! numbers derived from the chunk index so the global order survives any
//! completion order.

mod chunker;
mod function;
mod options;
mod pool;
mod progress;
mod runner;

pub use chunker::*;
pub use function::*;
pub use options::*;
pub use pool::*;
pub use progress::*;
pub(crate) use runner::{persist, prepare};
