use crate::errors::{ErrorKind, FrameError, FrameResult};
use crate::get_cpu_count;
use crate::transform::ProgressListener;
use rayon::ThreadPoolBuilder;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One unit of work; returns the number of rows it wrote.
pub type Job = Box<dyn FnOnce() -> FrameResult<usize> + Send>;

/// Runs a batch of jobs and waits for all of them.
///
/// A batch either succeeds as a whole, returning each job's result in
/// submission order, or fails with the first error observed. Jobs already
/// running when a job fails are allowed to finish; jobs not yet started
/// are skipped.
pub trait WorkerPool: Send + Sync {
    fn submit(
        &self,
        n_jobs: usize,
        jobs: Vec<Job>,
        progress: &dyn ProgressListener,
    ) -> FrameResult<Vec<usize>>;
}

/// Runs jobs on a dedicated rayon pool of `n_jobs` threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPoolBackend;

impl WorkerPool for ThreadPoolBackend {
    fn submit(
        &self,
        n_jobs: usize,
        jobs: Vec<Job>,
        progress: &dyn ProgressListener,
    ) -> FrameResult<Vec<usize>> {
        let total = jobs.len();
        progress.on_submit(total);
        if total == 0 {
            progress.on_complete(0, 0);
            return Ok(Vec::new());
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(n_jobs.clamp(1, total))
            .thread_name(|i| format!("docframe-worker-{}", i))
            .build()?;
        let aborted = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = crossbeam_channel::unbounded();

        for (index, job) in jobs.into_iter().enumerate() {
            let sender = sender.clone();
            let aborted = aborted.clone();
            pool.spawn(move || {
                let result = if aborted.load(Ordering::Acquire) {
                    None
                } else {
                    let result = run_guarded(index, job);
                    if result.is_err() {
                        aborted.store(true, Ordering::Release);
                    }
                    Some(result)
                };
                // the receiver lives until every sender is gone
                let _ = sender.send((index, result));
            });
        }
        drop(sender);

        let mut rows = vec![0; total];
        let mut failure = None;
        for (index, result) in receiver.iter() {
            match result {
                Some(Ok(written)) => {
                    rows[index] = written;
                    progress.on_chunk_done(index, written);
                }
                Some(Err(err)) => {
                    if failure.is_none() {
                        failure = Some(err);
                    }
                }
                None => log::debug!("Skipped job {} after an earlier failure", index),
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }
        progress.on_complete(total, rows.iter().sum());
        Ok(rows)
    }
}

/// Runs jobs one after another on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialBackend;

impl WorkerPool for SerialBackend {
    fn submit(
        &self,
        _n_jobs: usize,
        jobs: Vec<Job>,
        progress: &dyn ProgressListener,
    ) -> FrameResult<Vec<usize>> {
        let total = jobs.len();
        progress.on_submit(total);
        let mut rows = Vec::with_capacity(total);
        for (index, job) in jobs.into_iter().enumerate() {
            let written = run_guarded(index, job)?;
            progress.on_chunk_done(index, written);
            rows.push(written);
        }
        progress.on_complete(total, rows.iter().sum());
        Ok(rows)
    }
}

fn run_guarded(index: usize, job: Job) -> FrameResult<usize> {
    panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
        let reason = panic_message(payload.as_ref());
        log::error!("Job {} panicked: {}", index, reason);
        Err(FrameError::new(
            &format!("Chunk {} panicked: {}", index, reason),
            ErrorKind::ChunkProcessing,
        ))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Worker count for an `n_jobs` setting.
///
/// A positive value asks for that many workers, capped at the CPU count.
/// A negative value `-k` leaves `k - 1` CPUs free, so `-1` uses every CPU
/// and `-2` all but one. The result is never below one.
pub fn resolve_n_jobs(n_jobs: i32) -> usize {
    let cpus = get_cpu_count();
    let workers = if n_jobs > 0 {
        (n_jobs as usize).min(cpus)
    } else {
        (cpus as i64 + 1 + n_jobs as i64).clamp(1, cpus as i64) as usize
    };
    workers.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{LogProgress, NoProgress};
    use std::sync::atomic::AtomicUsize;

    fn counting_jobs(n: usize, counter: &Arc<AtomicUsize>) -> Vec<Job> {
        (0..n)
            .map(|i| {
                let counter = counter.clone();
                Box::new(move || -> FrameResult<usize> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(i * 10)
                }) as Job
            })
            .collect()
    }

    #[test]
    fn thread_pool_keeps_submission_order() {
        let counter = Arc::new(AtomicUsize::new(0));
        let progress = LogProgress::new();
        let rows = ThreadPoolBackend
            .submit(4, counting_jobs(20, &counter), &progress)
            .unwrap();
        assert_eq!(rows, (0..20).map(|i| i * 10).collect::<Vec<_>>());
        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert_eq!(progress.done(), 20);
    }

    #[test]
    fn failure_fails_batch() {
        let mut jobs = counting_jobs(5, &Arc::new(AtomicUsize::new(0)));
        jobs.push(Box::new(|| -> FrameResult<usize> {
            Err(FrameError::new("boom", ErrorKind::ChunkProcessing))
        }));
        let err = ThreadPoolBackend.submit(2, jobs, &NoProgress).unwrap_err();
        assert_eq!(err.message(), "boom");
    }

    #[test]
    fn panic_becomes_chunk_error() {
        let jobs: Vec<Job> = vec![Box::new(|| -> FrameResult<usize> { panic!("worker died") })];
        let err = ThreadPoolBackend.submit(1, jobs, &NoProgress).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ChunkProcessing);
        assert!(err.message().contains("worker died"));

        let jobs: Vec<Job> = vec![Box::new(|| -> FrameResult<usize> { panic!("serial died") })];
        let err = SerialBackend.submit(1, jobs, &NoProgress).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ChunkProcessing);
    }

    #[test]
    fn serial_runs_in_order() {
        let counter = Arc::new(AtomicUsize::new(0));
        let rows = SerialBackend.submit(8, counting_jobs(3, &counter), &NoProgress).unwrap();
        assert_eq!(rows, vec![0, 10, 20]);
        assert!(ThreadPoolBackend.submit(2, Vec::new(), &NoProgress).unwrap().is_empty());
    }

    #[test]
    fn n_jobs_resolution() {
        let cpus = get_cpu_count();
        assert_eq!(resolve_n_jobs(1), 1);
        assert_eq!(resolve_n_jobs(i32::MAX), cpus);
        assert_eq!(resolve_n_jobs(-1), cpus);
        assert_eq!(resolve_n_jobs(-2), (cpus - 1).max(1));
        assert_eq!(resolve_n_jobs(-1000), 1);
        assert_eq!(resolve_n_jobs(0), cpus.max(1));
    }
}
