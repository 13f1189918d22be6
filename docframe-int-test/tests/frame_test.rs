use docframe::common::Value;
use docframe::doc;
use docframe::errors::ErrorKind;
use docframe::frame::{FrameValue, IndexSpec};
use docframe::q;
use docframe::val;
use docframe_int_test::test_util::{cleanup, create_test_context, run_test};

#[ctor::ctor]
fn init() {
    colog::init();
}

fn people() -> Vec<docframe::common::Document> {
    vec![
        doc! { name: "ada", age: 36, city: "London" },
        doc! { name: "grace", age: 85, city: "New York" },
        doc! { name: "linus", age: 21, city: "Helsinki" },
        doc! { name: "ken", age: 45, city: "New York" },
    ]
}

#[test]
fn test_query_is_idempotent() {
    run_test(
        create_test_context,
        |ctx| {
            let frame = ctx.frame("people", people())?;
            let once = frame.query(&q!(age__gte = 30))?;
            let twice = once.query(&q!(age__gte = 30))?;
            assert_eq!(once.len()?, 3);
            assert_eq!(once.table()?, twice.table()?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_len_matches_resolved_rows() {
    run_test(
        create_test_context,
        |ctx| {
            let frame = ctx.frame("people", people())?;
            let views = vec![
                frame.clone(),
                frame.head(2),
                frame.skip(1),
                frame.skip(3).head(5),
                frame.tail(2)?,
                frame.query(&q!(city = "New York"))?,
                frame.sort(&["-age"])?.head(3),
            ];
            for view in views {
                assert_eq!(view.len()?, view.table()?.len());
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_sort_and_select() {
    run_test(
        create_test_context,
        |ctx| {
            let frame = ctx.frame("people", people())?;
            let oldest = frame.sort(&["-age"])?.select(&["name"])?.head(2).table()?;
            assert_eq!(oldest.columns(), &["name"]);
            assert_eq!(
                oldest.column("name").map(|c| c.into_values()),
                Some(vec![val!("grace"), val!("ken")])
            );

            let err = frame.select(&["salary"]).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::UnknownColumn);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_loc_scalar_versus_list() {
    run_test(
        create_test_context,
        |ctx| {
            let rows = (0..5)
                .map(|i| doc! { "_idx#0_label": (i * 10), a: i, "_om#rowid": i })
                .collect();
            let frame = ctx.frame("labeled", rows)?.select(&["a"])?;

            assert_eq!(frame.loc().get(20)?.value()?, FrameValue::Scalar(val!(2)));
            let list = frame.loc().get(vec![20])?.value()?;
            assert_eq!(list.as_table().map(|t| t.len()), Some(1));

            let inclusive = frame.loc().get(IndexSpec::slice(10, 30))?;
            assert_eq!(inclusive.len()?, 3);
            let exclusive = frame.iloc().get(1..3)?;
            assert_eq!(exclusive.len()?, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_invalid_filter_is_reported() {
    run_test(
        create_test_context,
        |ctx| {
            let frame = ctx.frame("people", people())?;
            let err = frame.query(&q!(age__between = 3)).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidFilter);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_series_statistics() {
    run_test(
        create_test_context,
        |ctx| {
            let frame = ctx.frame("people", people())?;
            let ages = frame.column("age")?;
            assert_eq!(ages.sum()?, val!(187));
            assert_eq!(ages.max()?, val!(85));
            assert_eq!(frame.column("city")?.unique().len()?, 3);
            assert_ne!(ages.mean()?, Value::Null);
            Ok(())
        },
        cleanup,
    )
}
