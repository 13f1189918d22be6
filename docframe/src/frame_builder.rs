use crate::errors::{FrameError, FrameResult};
use crate::filter::Q;
use crate::frame::{Frame, FrameCapability, InspectCache, InspectCapability};
use crate::frame_config::{FrameConfig, Resolve};
use crate::store::Collection;
use crate::view::FilteredCollection;
use std::sync::Arc;

/// Builds frames over collections.
///
/// Setters validate eagerly; the first invalid value is kept and reported by
/// [open](FrameBuilder::open), so a chain of settings needs a single check.
///
/// ```rust,ignore
/// let frame = FrameBuilder::new()
///     .chunksize(10_000)
///     .n_jobs(-1)
///     .auto_inspect(true)
///     .open(collection)?;
/// ```
#[derive(Default)]
pub struct FrameBuilder {
    error: Option<FrameError>,
    config: FrameConfig,
    inspect_cache: InspectCache,
    capabilities: Vec<Arc<dyn FrameCapability>>,
    query: Option<Q>,
    columns: Option<Vec<String>>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        FrameBuilder::default()
    }

    /// Starts from an existing configuration; frames share it.
    pub fn with_config(config: FrameConfig) -> Self {
        FrameBuilder {
            config,
            ..FrameBuilder::default()
        }
    }

    pub fn chunksize(mut self, chunksize: usize) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_chunksize(chunksize) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn n_jobs(mut self, n_jobs: i32) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_n_jobs(n_jobs) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn resolve(self, resolve: Resolve) -> Self {
        self.config.set_resolve(resolve);
        self
    }

    pub fn merge_suffixes(mut self, left: &str, right: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_merge_suffixes(left, right) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Prefixes of generated merge and transform output collections.
    pub fn temp_prefixes(mut self, merge: &str, transform: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_temp_prefixes(merge, transform) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Records an inspection of every resolution into the builder's cache.
    pub fn auto_inspect(self, enabled: bool) -> Self {
        self.config.set_auto_inspect(enabled);
        self
    }

    pub fn group_sort(self, sort: bool) -> Self {
        self.config.set_group_sort(sort);
        self
    }

    /// Uses `cache` for inspections instead of a fresh one.
    pub fn inspect_cache(mut self, cache: InspectCache) -> Self {
        self.inspect_cache = cache;
        self
    }

    pub fn capability(mut self, capability: Arc<dyn FrameCapability>) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Fixes a filter on the view every opened frame reads from.
    pub fn query(mut self, query: Q) -> Self {
        self.query = Some(query);
        self
    }

    /// Declares the frame's columns instead of sampling the first document.
    pub fn columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.as_ref().to_string()).collect());
        self
    }

    /// The cache inspections are recorded into when auto-inspection is on.
    pub fn cache(&self) -> &InspectCache {
        &self.inspect_cache
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Opens a frame over `collection`.
    pub fn open(&self, collection: Collection) -> FrameResult<Frame> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        let view = match &self.query {
            Some(query) => FilteredCollection::with_query(collection, query)?,
            None => FilteredCollection::unfiltered(collection),
        };
        let mut capabilities = self.capabilities.clone();
        if self.config.auto_inspect() {
            capabilities.push(Arc::new(InspectCapability::new(self.inspect_cache.clone())));
        }
        let frame = Frame::open(view, self.config.clone(), capabilities, self.columns.clone())?;
        log::debug!("Opened {:?}", frame);
        Ok(frame)
    }
}
