use crate::errors::{ErrorKind, FrameError, FrameResult};
use crate::frame::{next_row_stamp, Frame};
use crate::frame_config::Resolve;
use crate::store::Collection;
use crate::transform::{
    resolve_n_jobs, Chunk, DefaultChunker, Job, LogProgress, PendingTransform, PersistOptions,
    Persisted, SerialBackend, ThreadPoolBackend, TransformFn, TransformOptions, WorkerPool,
};
use std::sync::Arc;

/// Records a transform on `frame` without running it.
pub(crate) fn prepare(
    frame: &Frame,
    func: TransformFn,
    options: TransformOptions,
) -> FrameResult<Frame> {
    let config = frame.config();
    let chunksize = options.chunksize.unwrap_or_else(|| config.chunksize());
    if chunksize == 0 {
        log::error!("Transform chunksize must be positive");
        return Err(FrameError::new(
            "Transform chunksize must be positive",
            ErrorKind::InvalidArgument,
        ));
    }
    let n_jobs = options.n_jobs.unwrap_or_else(|| config.n_jobs());
    if n_jobs == 0 {
        log::error!("Transform n_jobs must not be 0");
        return Err(FrameError::new(
            "Transform n_jobs must not be 0",
            ErrorKind::InvalidArgument,
        ));
    }
    let maxobs = match options.maxobs {
        Some(maxobs) => maxobs,
        None => frame.len()?,
    };
    let outname = options
        .outname
        .unwrap_or_else(|| format!("{}{}_", config.temp_transform_prefix(), frame.name()));

    let pending = PendingTransform {
        func,
        n_jobs,
        maxobs,
        chunksize,
        chunker: options.chunker.unwrap_or_else(|| Arc::new(DefaultChunker)),
        resolve: options.resolve.unwrap_or_else(|| config.resolve()),
        outname,
        progress: options.progress.unwrap_or_else(|| Arc::new(LogProgress::new())),
        pool: options.pool.unwrap_or_else(|| Arc::new(ThreadPoolBackend)),
    };
    log::debug!(
        "Recorded transform on {}: {} row(s) in chunks of {}, n_jobs {}, output {}",
        frame.name(),
        maxobs,
        chunksize,
        n_jobs,
        pending.outname
    );
    Ok(frame.with_transform(pending))
}

/// Runs a pending transform into its output, or copies a frame without
/// one into a named collection or dataset.
pub(crate) fn persist(frame: &Frame, options: PersistOptions) -> FrameResult<Persisted> {
    let pending = match frame.pending_transform() {
        Some(pending) => pending.clone(),
        None => {
            return match (&options.name, &options.store) {
                (Some(_), _) => persist(
                    &prepare(frame, TransformFn::identity(), TransformOptions::new())?,
                    options,
                ),
                (None, Some(_)) => {
                    log::error!("Persisting {} to a store without a dataset name", frame.name());
                    Err(FrameError::new(
                        "A dataset name is required to persist into a store",
                        ErrorKind::InvalidArgument,
                    ))
                }
                (None, None) => Ok(Persisted::Frame(frame.clone())),
            };
        }
    };

    let target = match (&options.name, &options.store) {
        (Some(name), Some(store)) => store.collection(name)?,
        (Some(name), None) => frame.collection().sibling(name)?,
        (None, _) => frame.collection().sibling(&pending.outname)?,
    };
    if target.same_as(frame.collection()) {
        log::error!("Transform output {} is the source collection", target.name());
        return Err(FrameError::new(
            "A transform cannot write into its own source collection",
            ErrorKind::InvalidArgument,
        ));
    }

    let rows = execute(frame, &pending, &target, options.append, options.local)?;
    log::info!(
        "Transform of {} wrote {} row(s) to {}",
        frame.name(),
        rows,
        target.name()
    );

    match (&options.name, &options.store) {
        (Some(name), Some(store)) => Ok(Persisted::Dataset(store.put(&target, name)?)),
        _ => Ok(Persisted::Frame(frame.sibling_frame(target, None)?)),
    }
}

fn execute(
    frame: &Frame,
    pending: &PendingTransform,
    target: &Collection,
    append: bool,
    local: bool,
) -> FrameResult<usize> {
    let offset = if append {
        next_row_stamp(target)?
    } else {
        target.drop_collection()?;
        0
    };

    let chunks = pending
        .chunker
        .chunks(frame, pending.chunksize, pending.maxobs)?;
    // offsets are fixed here, before any chunk runs
    let jobs: Vec<Job> = chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| {
            let func = pending.func.clone();
            let resolve = pending.resolve;
            let target = target.clone();
            let start = offset + index * pending.chunksize;
            Box::new(move || process_chunk(index, chunk, &func, resolve, &target, start)) as Job
        })
        .collect();

    let (pool, workers): (Arc<dyn WorkerPool>, usize) = if local {
        (Arc::new(SerialBackend), 1)
    } else {
        (pending.pool.clone(), resolve_n_jobs(pending.n_jobs))
    };
    log::info!(
        "Transforming {} into {} with {} chunk(s) on {} worker(s)",
        frame.name(),
        target.name(),
        jobs.len(),
        workers
    );
    let rows = pool.submit(workers, jobs, pending.progress.as_ref())?;
    Ok(rows.iter().sum())
}

fn process_chunk(
    index: usize,
    chunk: Frame,
    func: &TransformFn,
    resolve: Resolve,
    target: &Collection,
    start: usize,
) -> FrameResult<usize> {
    let mut chunk = match resolve {
        Resolve::Worker => Chunk::Table(chunk.table()?),
        Resolve::Function => Chunk::Frame(chunk),
    };
    let empty = match &chunk {
        Chunk::Table(table) => table.is_empty(),
        Chunk::Frame(frame) => frame.is_empty()?,
    };
    if empty {
        log::debug!("Chunk {} has no rows, skipped", index);
        return Ok(0);
    }

    let table = match func.call(&mut chunk, index) {
        Ok(Some(result)) => result.into_table(),
        Ok(None) => chunk.into_table()?,
        Err(err) => {
            let cause = match err.downcast::<FrameError>() {
                Ok(frame_error) => frame_error,
                Err(other) => FrameError::from(other),
            };
            log::error!("Transform function failed on chunk {}: {}", index, cause);
            return Err(FrameError::new_with_cause(
                &format!("Transform function failed on chunk {}", index),
                ErrorKind::ChunkProcessing,
                cause,
            ));
        }
    };

    if table.is_empty() {
        return Ok(0);
    }
    let written = target.insert_many(table.to_stamped_documents(start))?;
    log::debug!("Chunk {} wrote {} row(s) from row {}", index, written, start);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Value, ROW_ID};
    use crate::filter::Filter;
    use crate::frame::{write_table, Column, Table};
    use crate::store::{DatasetStore, InMemoryDatabase, InMemoryDatasetStore};
    use crate::val;

    fn numbers(n: usize) -> (InMemoryDatabase, Frame) {
        let db = InMemoryDatabase::new("transform");
        let coll = db.collection("numbers");
        let rows = (0..n).map(|i| vec![val!(i)]).collect();
        write_table(&coll, &Table::from_rows(&["x"], rows).unwrap(), false).unwrap();
        (db.clone(), Frame::new(coll).unwrap())
    }

    fn doubled() -> TransformFn {
        TransformFn::new(|chunk| {
            let table = chunk.as_table_mut().ok_or_else(|| anyhow::anyhow!("unresolved chunk"))?;
            let x = table.column("x").map(Column::into_values).unwrap_or_default();
            let y = x.iter().map(|v| val!(v.as_i64().unwrap_or(0) * 2)).collect();
            table.set_column("y", y)?;
            Ok(None)
        })
    }

    fn ys(frame: &Frame) -> Vec<Value> {
        frame.table().unwrap().column("y").unwrap().into_values()
    }

    #[test]
    fn transform_is_lazy_until_value() {
        let (db, frame) = numbers(10);
        let pending = frame
            .transform(doubled(), TransformOptions::new().chunksize(3).n_jobs(2))
            .unwrap();
        assert!(pending.has_pending_transform());
        assert!(!db.has_collection("_tmpnumbers_"));

        let value = pending.value().unwrap();
        assert_eq!(value.len(), 10);
        assert!(db.has_collection("_tmpnumbers_"));
    }

    #[test]
    fn parallel_matches_serial() {
        let (_, frame) = numbers(50);
        let parallel = frame
            .transform(doubled(), TransformOptions::new().chunksize(7).n_jobs(4).outname("parallel"))
            .unwrap()
            .persist(PersistOptions::new())
            .unwrap();
        let serial = frame
            .transform(doubled(), TransformOptions::new().chunksize(50).outname("serial"))
            .unwrap()
            .persist(PersistOptions::new().local(true))
            .unwrap();
        let parallel = parallel.as_frame().unwrap();
        let serial = serial.as_frame().unwrap();
        assert_eq!(parallel.len().unwrap(), 50);
        assert_eq!(ys(parallel), ys(serial));
        assert_eq!(ys(parallel)[49], val!(98));
    }

    #[test]
    fn stamps_follow_chunk_offsets() {
        let (db, frame) = numbers(5);
        frame
            .transform(TransformFn::identity(), TransformOptions::new().chunksize(2))
            .unwrap()
            .persist(PersistOptions::new().name("copy"))
            .unwrap();
        let stamps = db
            .collection("copy")
            .distinct(ROW_ID, &Filter::All)
            .unwrap();
        let mut stamps: Vec<i64> = stamps.iter().filter_map(|v| v.as_i64()).collect();
        stamps.sort();
        assert_eq!(stamps, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn column_results_and_chunk_index() {
        let (_, frame) = numbers(6);
        let func = TransformFn::with_index(|_, index| {
            Ok(Some(Column::new("chunk", vec![val!(index); 2]).into()))
        });
        let output = frame
            .transform(func, TransformOptions::new().chunksize(2))
            .unwrap()
            .persist(PersistOptions::new())
            .unwrap();
        let table = output.as_frame().unwrap().table().unwrap();
        assert_eq!(table.columns(), &["chunk"]);
        assert_eq!(
            table.column("chunk").unwrap().into_values(),
            vec![val!(0), val!(0), val!(1), val!(1), val!(2), val!(2)]
        );
    }

    #[test]
    fn lazy_chunks_reach_function() {
        let (_, frame) = numbers(4);
        let func = TransformFn::new(|chunk| {
            let frame = chunk.as_frame().ok_or_else(|| anyhow::anyhow!("resolved chunk"))?;
            Ok(Some(frame.head(1).table()?.into()))
        });
        let output = frame
            .transform(func, TransformOptions::new().chunksize(2).resolve(Resolve::Function))
            .unwrap()
            .persist(PersistOptions::new())
            .unwrap();
        assert_eq!(output.as_frame().unwrap().len().unwrap(), 2);
    }

    #[test]
    fn failing_chunk_aborts_with_cause() {
        let (_, frame) = numbers(10);
        let func = TransformFn::with_index(|_, index| {
            if index == 2 {
                anyhow::bail!("bad row in chunk");
            }
            Ok(None)
        });
        let err = frame
            .transform(func, TransformOptions::new().chunksize(3))
            .unwrap()
            .persist(PersistOptions::new())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ChunkProcessing);
        assert!(err.message().contains("chunk 2"));
        assert_eq!(err.cause().unwrap().message(), "bad row in chunk");
    }

    #[test]
    fn append_continues_after_existing_rows() {
        let (db, frame) = numbers(4);
        let options = || TransformOptions::new().chunksize(2).outname("grown");
        frame.transform(TransformFn::identity(), options()).unwrap().persist(PersistOptions::new()).unwrap();
        frame
            .transform(TransformFn::identity(), options())
            .unwrap()
            .persist(PersistOptions::new().append(true))
            .unwrap();
        let grown = db.collection("grown");
        assert_eq!(grown.count(&Filter::All).unwrap(), 8);
        assert_eq!(grown.distinct(ROW_ID, &Filter::All).unwrap().len(), 8);
    }

    fn first_three() -> TransformFn {
        TransformFn::new(|chunk| {
            let frame = chunk.as_frame().ok_or_else(|| anyhow::anyhow!("resolved chunk"))?;
            Ok(Some(frame.head(3).table()?.into()))
        })
    }

    fn distinct_stamps(collection: &Collection) -> usize {
        collection.distinct(ROW_ID, &Filter::All).unwrap().len()
    }

    #[test]
    fn retransform_of_gapped_output_reads_every_row() {
        let (db, frame) = numbers(10);
        let reduced = frame
            .transform(first_three(), TransformOptions::new().chunksize(5).resolve(Resolve::Function))
            .unwrap()
            .persist(PersistOptions::new().name("reduced"))
            .unwrap();
        let reduced = reduced.as_frame().unwrap();
        assert_eq!(reduced.len().unwrap(), 6);

        let copy = reduced
            .transform(TransformFn::identity(), TransformOptions::new().chunksize(5))
            .unwrap()
            .persist(PersistOptions::new().name("copy"))
            .unwrap();
        let copy = copy.as_frame().unwrap();
        assert_eq!(copy.len().unwrap(), 6);
        let xs = copy.table().unwrap().column("x").unwrap().into_values();
        assert_eq!(xs, vec![val!(0), val!(1), val!(2), val!(5), val!(6), val!(7)]);
        assert_eq!(distinct_stamps(&db.collection("copy")), 6);
    }

    #[test]
    fn append_after_gapped_output_keeps_stamps_unique() {
        let (db, frame) = numbers(10);
        let options = || {
            TransformOptions::new()
                .chunksize(5)
                .resolve(Resolve::Function)
                .outname("reduced")
        };
        frame.transform(first_three(), options()).unwrap().persist(PersistOptions::new()).unwrap();
        frame
            .transform(first_three(), options())
            .unwrap()
            .persist(PersistOptions::new().append(true))
            .unwrap();
        let reduced = db.collection("reduced");
        assert_eq!(reduced.count(&Filter::All).unwrap(), 12);
        assert_eq!(distinct_stamps(&reduced), 12);
    }

    #[test]
    fn empty_chunks_skip_the_function() {
        let (_, frame) = numbers(4);
        let func = TransformFn::new(|chunk| {
            let table = chunk.as_table().ok_or_else(|| anyhow::anyhow!("unresolved chunk"))?;
            if table.is_empty() {
                anyhow::bail!("empty chunk");
            }
            Ok(None)
        });
        let output = frame
            .transform(func, TransformOptions::new().chunksize(2).maxobs(8))
            .unwrap()
            .persist(PersistOptions::new())
            .unwrap();
        assert_eq!(output.as_frame().unwrap().len().unwrap(), 4);
    }

    #[test]
    fn refuses_own_collection() {
        let (_, frame) = numbers(3);
        let err = frame
            .transform(TransformFn::identity(), TransformOptions::new().outname("numbers"))
            .unwrap()
            .persist(PersistOptions::new())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
    }

    #[test]
    fn persist_to_dataset_store() {
        let (db, frame) = numbers(7);
        let store = Arc::new(InMemoryDatasetStore::new(db));
        let persisted = frame
            .transform(doubled(), TransformOptions::new().chunksize(3))
            .unwrap()
            .persist(PersistOptions::new().name("doubled").store(store.clone()))
            .unwrap();
        let meta = persisted.as_dataset().unwrap();
        assert_eq!(meta.name, "doubled");
        assert_eq!(store.collection("doubled").unwrap().count(&Filter::All).unwrap(), 7);
    }

    #[test]
    fn persist_without_transform_copies() {
        let (db, frame) = numbers(3);
        let store = Arc::new(InMemoryDatasetStore::new(db));
        let persisted = frame
            .persist(PersistOptions::new().name("copied").store(store.clone()).local(true))
            .unwrap();
        assert!(persisted.as_dataset().is_some());
        let err = frame.persist(PersistOptions::new().store(store)).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
    }

    #[test]
    fn invalid_options() {
        let (_, frame) = numbers(3);
        let err = frame
            .transform(TransformFn::identity(), TransformOptions::new().chunksize(0))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
        let err = frame
            .transform(TransformFn::identity(), TransformOptions::new().n_jobs(0))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
    }
}
