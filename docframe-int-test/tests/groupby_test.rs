use docframe::common::Value;
use docframe::doc;
use docframe::frame::Stat;
use docframe::q;
use docframe::val;
use docframe_int_test::test_util::{cleanup, create_test_context, run_test};

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_group_sum() {
    run_test(
        create_test_context,
        |ctx| {
            let frame = ctx.frame(
                "data",
                vec![
                    doc! { x: 1, y: 10 },
                    doc! { x: 1, y: 20 },
                    doc! { x: 2, y: 30 },
                    doc! { x: 2, y: 40 },
                ],
            )?;
            let table = frame.groupby(&["x"]).sum()?;
            let keys: Vec<Value> = table.index().iter().map(|k| k[0].clone()).collect();
            assert_eq!(keys, vec![val!(1), val!(2)]);
            assert_eq!(
                table.column("y_sum").map(|c| c.into_values()),
                Some(vec![val!(30), val!(70)])
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_group_stats_respect_filter() {
    run_test(
        create_test_context,
        |ctx| {
            let frame = ctx.frame(
                "data",
                vec![
                    doc! { team: "a", score: 1.0 },
                    doc! { team: "a", score: 3.0 },
                    doc! { team: "b", score: 10.0 },
                    doc! { team: "b", score: 20.0 },
                ],
            )?;
            let table = frame
                .query(&q!(score__lt = 15.0))?
                .groupby(&["team"])
                .aggregate(&[("score", Stat::Mean), ("score", Stat::Count)])?;
            assert_eq!(table.len(), 2);
            assert_eq!(table.get(0, "score_mean"), Some(&val!(2.0)));
            assert_eq!(table.get(1, "score_count"), Some(&val!(1)));

            let groups: Vec<_> = frame.groupby(&["team"]).groups()?.collect();
            assert_eq!(groups.len(), 2);
            assert_eq!(groups[1].1.len()?, 2);
            Ok(())
        },
        cleanup,
    )
}
