use crate::errors::FrameResult;
use crate::frame::{Frame, InspectCache};
use std::fmt::Debug;

/// Behavior attached to a frame when it is built.
///
/// A frame keeps its capabilities through every refinement and calls them
/// around each resolution. Hooks default to doing nothing.
pub trait FrameCapability: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Called before a frame is resolved. An error aborts the resolution.
    fn before_resolve(&self, _frame: &Frame) -> FrameResult<()> {
        Ok(())
    }

    /// Called after a frame resolved to `rows` rows.
    fn after_resolve(&self, _frame: &Frame, _rows: usize) -> FrameResult<()> {
        Ok(())
    }
}

/// Records an inspection of every resolved frame into a shared cache.
#[derive(Clone)]
pub struct InspectCapability {
    cache: InspectCache,
}

impl InspectCapability {
    pub fn new(cache: InspectCache) -> Self {
        InspectCapability { cache }
    }

    pub fn cache(&self) -> &InspectCache {
        &self.cache
    }
}

impl Debug for InspectCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InspectCapability({} recorded)", self.cache.len())
    }
}

impl FrameCapability for InspectCapability {
    fn name(&self) -> &str {
        "inspect"
    }

    fn after_resolve(&self, frame: &Frame, _rows: usize) -> FrameResult<()> {
        self.cache.record(frame.inspect(true)?);
        Ok(())
    }
}
