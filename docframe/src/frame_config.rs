//! Configuration shared by frames opened from the same builder.

use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor};
use crate::errors::{ErrorKind, FrameError, FrameResult};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Default number of rows per transform chunk.
pub const DEFAULT_CHUNKSIZE: usize = 50_000;

/// Default worker count: all CPUs but one.
pub const DEFAULT_N_JOBS: i32 = -2;

/// Where a transform chunk is resolved before the user function sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolve {
    /// The worker materializes the chunk and passes a table.
    #[default]
    Worker,
    /// The function receives the lazy chunk frame and resolves it itself.
    Function,
}

/// Settings for frames, transforms and merges.
///
/// Cloning is cheap and every clone shares the same settings, so a change made
/// through one handle is seen by every frame opened with this configuration.
///
/// # Examples
///
/// ```rust,ignore
/// let config = FrameConfig::new();
/// config.set_chunksize(1_000)?;
/// assert_eq!(config.chunksize(), 1_000);
/// ```
#[derive(Clone)]
pub struct FrameConfig {
    inner: Arc<FrameConfigInner>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameConfig {
    pub fn new() -> Self {
        FrameConfig {
            inner: Arc::new(FrameConfigInner::new()),
        }
    }

    /// Rows per chunk when a transform does not set its own.
    pub fn chunksize(&self) -> usize {
        self.inner.settings.read_with(|s| s.chunksize)
    }

    /// Sets the default chunk size.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a chunk size of zero.
    pub fn set_chunksize(&self, chunksize: usize) -> FrameResult<()> {
        if chunksize == 0 {
            log::error!("Chunk size must be positive");
            return Err(FrameError::new(
                "Chunk size must be positive",
                ErrorKind::InvalidArgument,
            ));
        }
        self.inner.settings.write_with(|s| s.chunksize = chunksize);
        Ok(())
    }

    /// Requested worker count, see [resolve_n_jobs](crate::transform::resolve_n_jobs).
    pub fn n_jobs(&self) -> i32 {
        self.inner.settings.read_with(|s| s.n_jobs)
    }

    /// Sets the default worker count.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for zero workers.
    pub fn set_n_jobs(&self, n_jobs: i32) -> FrameResult<()> {
        if n_jobs == 0 {
            log::error!("n_jobs must not be zero");
            return Err(FrameError::new(
                "n_jobs must not be zero",
                ErrorKind::InvalidArgument,
            ));
        }
        self.inner.settings.write_with(|s| s.n_jobs = n_jobs);
        Ok(())
    }

    pub fn resolve(&self) -> Resolve {
        self.inner.settings.read_with(|s| s.resolve)
    }

    pub fn set_resolve(&self, resolve: Resolve) {
        self.inner.settings.write_with(|s| s.resolve = resolve);
    }

    /// Suffixes for colliding left and right column names in a merge.
    pub fn merge_suffixes(&self) -> (String, String) {
        self.inner.settings.read_with(|s| s.merge_suffixes.clone())
    }

    /// Sets the merge suffixes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when both suffixes are equal, since colliding
    /// columns would then collide again.
    pub fn set_merge_suffixes(&self, left: &str, right: &str) -> FrameResult<()> {
        if left == right {
            log::error!("Merge suffixes must differ, got '{}' twice", left);
            return Err(FrameError::new(
                &format!("Merge suffixes must differ, got '{}' twice", left),
                ErrorKind::InvalidArgument,
            ));
        }
        self.inner
            .settings
            .write_with(|s| s.merge_suffixes = (left.to_string(), right.to_string()));
        Ok(())
    }

    /// Prefix of generated merge target collections.
    pub fn temp_merge_prefix(&self) -> String {
        self.inner.settings.read_with(|s| s.temp_merge_prefix.clone())
    }

    /// Prefix of the default transform output collection.
    pub fn temp_transform_prefix(&self) -> String {
        self.inner.settings.read_with(|s| s.temp_transform_prefix.clone())
    }

    pub(crate) fn set_temp_prefixes(&self, merge: &str, transform: &str) -> FrameResult<()> {
        if merge.is_empty() || transform.is_empty() {
            log::error!("Temporary collection prefixes must not be empty");
            return Err(FrameError::new(
                "Temporary collection prefixes must not be empty",
                ErrorKind::InvalidArgument,
            ));
        }
        self.inner.settings.write_with(|s| {
            s.temp_merge_prefix = merge.to_string();
            s.temp_transform_prefix = transform.to_string();
        });
        Ok(())
    }

    /// Whether every resolution records an inspection.
    pub fn auto_inspect(&self) -> bool {
        self.inner.settings.read_with(|s| s.auto_inspect)
    }

    pub fn set_auto_inspect(&self, enabled: bool) {
        self.inner.settings.write_with(|s| s.auto_inspect = enabled);
    }

    /// Whether group-by output is sorted by key unless a grouper says otherwise.
    pub fn group_sort(&self) -> bool {
        self.inner.settings.read_with(|s| s.group_sort)
    }

    pub fn set_group_sort(&self, sort: bool) {
        self.inner.settings.write_with(|s| s.group_sort = sort);
    }
}

impl Debug for FrameConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.inner.settings.read_with(|s| {
            f.debug_struct("FrameConfig")
                .field("chunksize", &s.chunksize)
                .field("n_jobs", &s.n_jobs)
                .field("resolve", &s.resolve)
                .field("merge_suffixes", &s.merge_suffixes)
                .field("auto_inspect", &s.auto_inspect)
                .field("group_sort", &s.group_sort)
                .finish()
        })
    }
}

struct FrameConfigInner {
    settings: Atomic<Settings>,
}

impl FrameConfigInner {
    fn new() -> Self {
        FrameConfigInner {
            settings: atomic(Settings::default()),
        }
    }
}

#[derive(Clone)]
struct Settings {
    chunksize: usize,
    n_jobs: i32,
    resolve: Resolve,
    merge_suffixes: (String, String),
    temp_merge_prefix: String,
    temp_transform_prefix: String,
    auto_inspect: bool,
    group_sort: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            chunksize: DEFAULT_CHUNKSIZE,
            n_jobs: DEFAULT_N_JOBS,
            resolve: Resolve::Worker,
            merge_suffixes: ("_x".to_string(), "_y".to_string()),
            temp_merge_prefix: "_temp.merge.".to_string(),
            temp_transform_prefix: "_tmp".to_string(),
            auto_inspect: false,
            group_sort: true,
        }
    }
}
