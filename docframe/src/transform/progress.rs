use std::sync::atomic::{AtomicUsize, Ordering};

/// Receives progress of a chunked transform.
///
/// Calls arrive on the thread that submitted the jobs, in completion order.
pub trait ProgressListener: Send + Sync {
    fn on_submit(&self, _chunks: usize) {}

    fn on_chunk_done(&self, _chunk: usize, _rows: usize) {}

    fn on_complete(&self, _chunks: usize, _rows: usize) {}
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressListener for NoProgress {}

/// Logs progress at debug level and the summary at info level.
#[derive(Debug, Default)]
pub struct LogProgress {
    total: AtomicUsize,
    done: AtomicUsize,
}

impl LogProgress {
    pub fn new() -> LogProgress {
        LogProgress::default()
    }

    /// Chunks finished since the last submit.
    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }
}

impl ProgressListener for LogProgress {
    fn on_submit(&self, chunks: usize) {
        self.total.store(chunks, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
        log::debug!("Submitted {} chunk(s)", chunks);
    }

    fn on_chunk_done(&self, chunk: usize, rows: usize) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        log::debug!(
            "Chunk {} wrote {} row(s) ({}/{})",
            chunk,
            rows,
            done,
            self.total.load(Ordering::Relaxed)
        );
    }

    fn on_complete(&self, chunks: usize, rows: usize) {
        log::info!("Processed {} chunk(s), {} row(s)", chunks, rows);
    }
}
