use docframe::common::Value;
use docframe::doc;
use docframe::frame::{Frame, Join, MergeOptions};
use docframe::val;
use docframe_int_test::test_util::{cleanup, create_test_context, run_test, TestContext};
use docframe::errors::FrameResult;

#[ctor::ctor]
fn init() {
    colog::init();
}

fn shop(ctx: &TestContext) -> FrameResult<(Frame, Frame)> {
    let left = ctx.frame(
        "left",
        vec![doc! { k: 1, a: "x" }, doc! { k: 2, a: "y" }, doc! { k: 3, a: "z" }],
    )?;
    let right = ctx.frame(
        "right",
        vec![doc! { k: 1, b: "p" }, doc! { k: 3, b: "q" }, doc! { k: 4, b: "r" }],
    )?;
    Ok((left, right))
}

#[test]
fn test_left_merge_fills_missing_with_null() {
    run_test(
        create_test_context,
        |ctx| {
            let (left, right) = shop(&ctx)?;
            let merged = left.merge(&right, MergeOptions::on("k").sort(true))?;
            let table = merged.table()?;
            assert_eq!(table.len(), 3);
            assert_eq!(
                table.column("b").map(|c| c.into_values()),
                Some(vec![val!("p"), Value::Null, val!("q")])
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_inner_and_right_merge_counts() {
    run_test(
        create_test_context,
        |ctx| {
            let (left, right) = shop(&ctx)?;
            let inner = left.merge(&right, MergeOptions::on("k").how(Join::Inner))?;
            assert_eq!(inner.len()?, 2);

            let outer = left.merge(&right, MergeOptions::on("k").how(Join::Right).sort(true))?;
            let table = outer.table()?;
            assert_eq!(table.len(), 3);
            assert_eq!(table.get(2, "k"), Some(&val!(4)));
            assert_eq!(table.get(2, "a"), Some(&Value::Null));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_merge_output_is_a_new_collection() {
    run_test(
        create_test_context,
        |ctx| {
            let (left, right) = shop(&ctx)?;
            let merged = left.merge(&right, MergeOptions::on("k").target("joined"))?;
            assert!(ctx.db().has_collection("joined"));
            assert_eq!(merged.name(), "joined");
            assert_eq!(left.len()?, 3);
            Ok(())
        },
        cleanup,
    )
}
