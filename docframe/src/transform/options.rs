use crate::frame::Frame;
use crate::frame_config::Resolve;
use crate::store::{DatasetMeta, DatasetStore};
use crate::transform::{Chunker, ProgressListener, TransformFn, WorkerPool};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Options of [Frame::transform]. Unset values come from the frame's
/// configuration.
///
/// ```rust,ignore
/// let pending = frame.transform(func, TransformOptions::new().chunksize(1_000).n_jobs(4))?;
/// let output = pending.persist(PersistOptions::new())?;
/// ```
#[derive(Clone, Default)]
pub struct TransformOptions {
    pub(crate) n_jobs: Option<i32>,
    pub(crate) maxobs: Option<usize>,
    pub(crate) chunksize: Option<usize>,
    pub(crate) chunker: Option<Arc<dyn Chunker>>,
    pub(crate) resolve: Option<Resolve>,
    pub(crate) outname: Option<String>,
    pub(crate) progress: Option<Arc<dyn ProgressListener>>,
    pub(crate) pool: Option<Arc<dyn WorkerPool>>,
}

impl TransformOptions {
    pub fn new() -> TransformOptions {
        TransformOptions::default()
    }

    /// Worker count; negative values count back from the number of CPUs.
    pub fn n_jobs(mut self, n_jobs: i32) -> TransformOptions {
        self.n_jobs = Some(n_jobs);
        self
    }

    /// Rows to process; the frame's length by default.
    pub fn maxobs(mut self, maxobs: usize) -> TransformOptions {
        self.maxobs = Some(maxobs);
        self
    }

    pub fn chunksize(mut self, chunksize: usize) -> TransformOptions {
        self.chunksize = Some(chunksize);
        self
    }

    pub fn chunker<C: Chunker + 'static>(mut self, chunker: C) -> TransformOptions {
        self.chunker = Some(Arc::new(chunker));
        self
    }

    pub fn resolve(mut self, resolve: Resolve) -> TransformOptions {
        self.resolve = Some(resolve);
        self
    }

    /// Output collection when the result is not persisted under a name.
    pub fn outname(mut self, outname: &str) -> TransformOptions {
        self.outname = Some(outname.to_string());
        self
    }

    pub fn progress(mut self, progress: Arc<dyn ProgressListener>) -> TransformOptions {
        self.progress = Some(progress);
        self
    }

    /// Worker pool backend; a rayon thread pool by default.
    pub fn pool(mut self, pool: Arc<dyn WorkerPool>) -> TransformOptions {
        self.pool = Some(pool);
        self
    }
}

impl Debug for TransformOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformOptions")
            .field("n_jobs", &self.n_jobs)
            .field("maxobs", &self.maxobs)
            .field("chunksize", &self.chunksize)
            .field("custom_chunker", &self.chunker.is_some())
            .field("resolve", &self.resolve)
            .field("outname", &self.outname)
            .finish()
    }
}

/// A transform recorded on a frame, run by persist or value.
pub(crate) struct PendingTransform {
    pub(crate) func: TransformFn,
    pub(crate) n_jobs: i32,
    pub(crate) maxobs: usize,
    pub(crate) chunksize: usize,
    pub(crate) chunker: Arc<dyn Chunker>,
    pub(crate) resolve: Resolve,
    pub(crate) outname: String,
    pub(crate) progress: Arc<dyn ProgressListener>,
    pub(crate) pool: Arc<dyn WorkerPool>,
}

/// Options of [Frame::persist].
#[derive(Clone, Default)]
pub struct PersistOptions {
    pub(crate) name: Option<String>,
    pub(crate) store: Option<Arc<dyn DatasetStore>>,
    pub(crate) append: bool,
    pub(crate) local: bool,
}

impl PersistOptions {
    pub fn new() -> PersistOptions {
        PersistOptions::default()
    }

    /// Dataset name, or output collection name without a store.
    pub fn name(mut self, name: &str) -> PersistOptions {
        self.name = Some(name.to_string());
        self
    }

    pub fn store(mut self, store: Arc<dyn DatasetStore>) -> PersistOptions {
        self.store = Some(store);
        self
    }

    /// Adds to the output instead of replacing it.
    pub fn append(mut self, append: bool) -> PersistOptions {
        self.append = append;
        self
    }

    /// Runs every chunk on the calling thread.
    pub fn local(mut self, local: bool) -> PersistOptions {
        self.local = local;
        self
    }
}

impl Debug for PersistOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistOptions")
            .field("name", &self.name)
            .field("store", &self.store.is_some())
            .field("append", &self.append)
            .field("local", &self.local)
            .finish()
    }
}

/// Outcome of [Frame::persist].
#[derive(Debug, Clone)]
pub enum Persisted {
    /// Registered in a dataset store.
    Dataset(DatasetMeta),
    /// A frame over the output collection.
    Frame(Frame),
}

impl Persisted {
    pub fn as_frame(&self) -> Option<&Frame> {
        match self {
            Persisted::Frame(frame) => Some(frame),
            Persisted::Dataset(_) => None,
        }
    }

    pub fn as_dataset(&self) -> Option<&DatasetMeta> {
        match self {
            Persisted::Dataset(meta) => Some(meta),
            Persisted::Frame(_) => None,
        }
    }
}
