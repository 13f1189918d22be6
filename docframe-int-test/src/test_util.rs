use docframe::common::Document;
use docframe::errors::FrameResult;
use docframe::frame::Frame;
use docframe::frame_builder::FrameBuilder;
use docframe::store::{Collection, InMemoryDatabase};
use std::backtrace::Backtrace;
use std::time::Instant;

/// Runs `test` between `before` and `after`, calling `after` even when the
/// test fails. Panics with the failure so the harness reports it.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> FrameResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> FrameResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> FrameResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let start_time = Instant::now();
    let result = std::panic::catch_unwind(|| {
        let backtrace = Backtrace::capture();
        match before() {
            Ok(ctx) => match test(ctx.clone()) {
                Ok(_) => after(ctx)
                    .map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                Err(e) => {
                    let _ = after(ctx);
                    Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                }
            },
            Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
        }
    });

    let failure = match result {
        Ok(Ok(_)) => return,
        Ok(Err((e, bt))) => {
            if !bt.is_empty() && !bt.contains("disabled") {
                eprintln!("\nBacktrace:\n{}", bt);
            }
            e
        }
        Err(panic_err) => {
            if let Some(s) = panic_err.downcast_ref::<&str>() {
                format!("Panic: {}", s)
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                format!("Panic: {}", s)
            } else {
                "Panic: unknown payload".to_string()
            }
        }
    };
    panic!("Test failed after {:?}: {}", start_time.elapsed(), failure);
}

/// A fresh in-memory database per test.
#[derive(Clone)]
pub struct TestContext {
    db: InMemoryDatabase,
}

impl TestContext {
    pub fn new(db: InMemoryDatabase) -> Self {
        Self { db }
    }

    pub fn db(&self) -> InMemoryDatabase {
        self.db.clone()
    }

    /// Fills `name` with `documents` and opens a default frame over it.
    pub fn frame(&self, name: &str, documents: Vec<Document>) -> FrameResult<Frame> {
        let collection = self.collection(name, documents)?;
        FrameBuilder::new().open(collection)
    }

    pub fn collection(&self, name: &str, documents: Vec<Document>) -> FrameResult<Collection> {
        let collection = self.db.collection(name);
        collection.insert_many(documents)?;
        Ok(collection)
    }
}

pub fn create_test_context() -> FrameResult<TestContext> {
    let name = uuid::Uuid::new_v4().simple().to_string();
    Ok(TestContext::new(InMemoryDatabase::new(&name)))
}

pub fn cleanup(ctx: TestContext) -> FrameResult<()> {
    for name in ctx.db().collection_names() {
        ctx.db().collection(&name).drop_collection()?;
    }
    Ok(())
}
