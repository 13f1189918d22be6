use docframe::common::{Value, ROW_ID};
use docframe::errors::ErrorKind;
use docframe::frame::{write_table, Frame, Table};
use docframe::store::{DatasetStore, InMemoryDatasetStore};
use docframe::transform::{PersistOptions, TransformFn, TransformOptions};
use docframe::val;
use docframe_int_test::test_util::{cleanup, create_test_context, run_test, TestContext};
use docframe::errors::FrameResult;
use std::sync::Arc;

#[ctor::ctor]
fn init() {
    colog::init();
}

fn numbers(ctx: &TestContext, n: usize) -> FrameResult<Frame> {
    let collection = ctx.db().collection("numbers");
    let rows = (0..n).map(|i| vec![val!(i)]).collect();
    write_table(&collection, &Table::from_rows(&["x"], rows)?, false)?;
    Frame::new(collection)
}

fn doubled() -> TransformFn {
    TransformFn::new(|chunk| {
        let table = chunk
            .as_table_mut()
            .ok_or_else(|| anyhow::anyhow!("chunk was not resolved"))?;
        let y = table
            .column("x")
            .map(|c| c.into_values())
            .unwrap_or_default()
            .iter()
            .map(|v| val!(v.as_i64().unwrap_or(0) * 2))
            .collect();
        table.set_column("y", y)?;
        Ok(None)
    })
}

fn ys(frame: &Frame) -> FrameResult<Vec<Value>> {
    let table = frame.sort(&[ROW_ID])?.table()?;
    Ok(table.column("y").map(|c| c.into_values()).unwrap_or_default())
}

#[test]
fn test_parallel_transform_is_deterministic() {
    run_test(
        create_test_context,
        |ctx| {
            let frame = numbers(&ctx, 1000)?;
            let options = TransformOptions::new().chunksize(100).maxobs(1000).n_jobs(4);
            let parallel = frame
                .transform(doubled(), options.clone().outname("parallel"))?
                .persist(PersistOptions::new())?;
            let serial = frame
                .transform(doubled(), options.outname("serial"))?
                .persist(PersistOptions::new().local(true))?;

            let parallel = parallel.as_frame().cloned().unwrap();
            let serial = serial.as_frame().cloned().unwrap();
            assert_eq!(parallel.len()?, 1000);
            let expected: Vec<Value> = (0..1000).map(|i| val!(i * 2)).collect();
            assert_eq!(ys(&parallel)?, expected);
            assert_eq!(ys(&serial)?, expected);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_failing_chunk_fails_transform() {
    run_test(
        create_test_context,
        |ctx| {
            let frame = numbers(&ctx, 20)?;
            let func = TransformFn::with_index(|_, index| {
                if index == 1 {
                    anyhow::bail!("bad chunk");
                }
                Ok(None)
            });
            let err = frame
                .transform(func, TransformOptions::new().chunksize(5))?
                .persist(PersistOptions::new())
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ChunkProcessing);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_persist_into_dataset_store() {
    run_test(
        create_test_context,
        |ctx| {
            let frame = numbers(&ctx, 30)?;
            let store = Arc::new(InMemoryDatasetStore::new(ctx.db()));
            let persisted = frame
                .transform(doubled(), TransformOptions::new().chunksize(7))?
                .persist(PersistOptions::new().name("doubled").store(store.clone()))?;

            let meta = persisted.as_dataset().cloned().unwrap();
            assert_eq!(meta.name, "doubled");
            let collection = store.collection("doubled")?;
            let output = Frame::new(collection)?;
            assert_eq!(output.len()?, 30);
            assert_eq!(ys(&output)?[29], val!(58));
            Ok(())
        },
        cleanup,
    )
}
