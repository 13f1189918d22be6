use crate::common::{Value, ROW_ID};
use crate::errors::{ErrorKind, FrameError, FrameResult};
use crate::filter::{Filter, Operator};
use crate::frame::{Frame, Series};
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

/// Bounds of a slice spec. Either end may be open.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Slice {
    pub start: Option<Value>,
    pub stop: Option<Value>,
}

/// An access spec for [Frame::loc] and [Frame::iloc].
///
/// Scalars select by equality and lists by membership. A slice selects an
/// inclusive range for labels and a half-open range for positions. A tuple
/// is matched element by element against the index levels; elements left
/// over after the last level select columns.
///
/// ```rust,ignore
/// frame.loc().get(5)?;                          // label 5
/// frame.loc().get(vec![5])?;                    // rows labeled 5, never collapsed
/// frame.iloc().get(0..10)?;                     // first ten rows
/// frame.loc().get((IndexSpec::slice("a", "c"), "price"))?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum IndexSpec {
    Scalar(Value),
    List(Vec<Value>),
    Slice(Slice),
    Tuple(Vec<IndexSpec>),
}

impl IndexSpec {
    /// A closed slice between two labels or positions.
    pub fn slice<A: Into<Value>, B: Into<Value>>(start: A, stop: B) -> IndexSpec {
        IndexSpec::Slice(Slice {
            start: Some(start.into()),
            stop: Some(stop.into()),
        })
    }

    pub fn from_start<A: Into<Value>>(start: A) -> IndexSpec {
        IndexSpec::Slice(Slice {
            start: Some(start.into()),
            stop: None,
        })
    }

    pub fn up_to<B: Into<Value>>(stop: B) -> IndexSpec {
        IndexSpec::Slice(Slice {
            start: None,
            stop: Some(stop.into()),
        })
    }

    /// An open slice covering everything.
    pub fn full() -> IndexSpec {
        IndexSpec::Slice(Slice::default())
    }

    fn is_range(&self) -> bool {
        matches!(self, IndexSpec::List(_) | IndexSpec::Slice(_))
    }
}

macro_rules! impl_scalar_spec {
    ($($t:ty),*) => {
        $(
            impl From<$t> for IndexSpec {
                fn from(value: $t) -> Self {
                    IndexSpec::Scalar(Value::from(value))
                }
            }

            impl From<Range<$t>> for IndexSpec {
                fn from(range: Range<$t>) -> Self {
                    IndexSpec::slice(range.start, range.end)
                }
            }

            impl From<RangeFrom<$t>> for IndexSpec {
                fn from(range: RangeFrom<$t>) -> Self {
                    IndexSpec::from_start(range.start)
                }
            }

            impl From<RangeTo<$t>> for IndexSpec {
                fn from(range: RangeTo<$t>) -> Self {
                    IndexSpec::up_to(range.end)
                }
            }
        )*
    };
}

impl_scalar_spec!(i32, i64, usize);

impl From<&str> for IndexSpec {
    fn from(value: &str) -> Self {
        IndexSpec::Scalar(Value::from(value))
    }
}

impl From<String> for IndexSpec {
    fn from(value: String) -> Self {
        IndexSpec::Scalar(Value::from(value))
    }
}

impl From<f64> for IndexSpec {
    fn from(value: f64) -> Self {
        IndexSpec::Scalar(Value::from(value))
    }
}

impl From<Value> for IndexSpec {
    fn from(value: Value) -> Self {
        IndexSpec::Scalar(value)
    }
}

impl From<RangeFull> for IndexSpec {
    fn from(_: RangeFull) -> Self {
        IndexSpec::full()
    }
}

impl<T: Into<Value>> From<Vec<T>> for IndexSpec {
    fn from(values: Vec<T>) -> Self {
        IndexSpec::List(values.into_iter().map(Into::into).collect())
    }
}

impl<A: Into<IndexSpec>, B: Into<IndexSpec>> From<(A, B)> for IndexSpec {
    fn from((a, b): (A, B)) -> Self {
        IndexSpec::Tuple(vec![a.into(), b.into()])
    }
}

impl<A: Into<IndexSpec>, B: Into<IndexSpec>, C: Into<IndexSpec>> From<(A, B, C)> for IndexSpec {
    fn from((a, b, c): (A, B, C)) -> Self {
        IndexSpec::Tuple(vec![a.into(), b.into(), c.into()])
    }
}

/// Row criteria and column projection produced from an [IndexSpec].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Selection {
    pub(crate) filter: Filter,
    pub(crate) projection: Vec<String>,
    pub(crate) from_range: bool,
}

/// Label (`loc`) or position (`iloc`) access to a frame.
pub struct LocIndexer<'a> {
    frame: &'a Frame,
    positional: bool,
}

impl<'a> LocIndexer<'a> {
    pub(crate) fn new(frame: &'a Frame, positional: bool) -> Self {
        LocIndexer { frame, positional }
    }

    /// Narrows the frame to the rows and columns selected by `spec`.
    ///
    /// The result remembers it came from an indexer, so resolving it
    /// collapses single-row results unless `spec` selected a range.
    pub fn get<S: Into<IndexSpec>>(&self, spec: S) -> FrameResult<Frame> {
        let index_fields = if self.positional {
            vec![ROW_ID.to_string()]
        } else {
            self.frame.index_columns()?
        };
        let columns = self.frame.columns();
        let selection = select(&spec.into(), &index_fields, &columns, self.positional)?;
        log::debug!(
            "{} selected {} with projection {:?}",
            if self.positional { "iloc" } else { "loc" },
            selection.filter,
            selection.projection
        );

        let mut frame = self.frame.clone();
        if !selection.filter.is_all() {
            frame = frame.narrowed(selection.filter, selection.from_range);
        }
        if !selection.projection.is_empty() {
            frame = frame.select(&selection.projection)?;
        }
        Ok(frame)
    }
}

/// `loc`/`iloc` on a series, yielding series.
pub struct SeriesIndexer<'a> {
    series: &'a Series,
    positional: bool,
}

impl<'a> SeriesIndexer<'a> {
    pub(crate) fn new(series: &'a Series, positional: bool) -> Self {
        SeriesIndexer { series, positional }
    }

    pub fn get<S: Into<IndexSpec>>(&self, spec: S) -> FrameResult<Series> {
        let frame = LocIndexer::new(self.series.frame(), self.positional).get(spec)?;
        Series::from_frame(frame, self.series.name())
    }
}

pub(crate) fn select(
    spec: &IndexSpec,
    index_fields: &[String],
    columns: &[String],
    positional: bool,
) -> FrameResult<Selection> {
    match spec {
        IndexSpec::Scalar(value) => {
            let field = first_index_field(index_fields)?;
            Ok(Selection {
                filter: Filter::eq(field, value.clone()),
                projection: Vec::new(),
                from_range: false,
            })
        }
        IndexSpec::List(values) => {
            let field = first_index_field(index_fields)?;
            Ok(Selection {
                filter: Filter::is_in(field, values.clone()),
                projection: Vec::new(),
                from_range: true,
            })
        }
        IndexSpec::Slice(_) => select(
            &IndexSpec::Tuple(vec![spec.clone()]),
            index_fields,
            columns,
            positional,
        ),
        IndexSpec::Tuple(specs) => {
            if specs.is_empty() {
                return Err(index_error("Empty tuple is not a valid index spec"));
            }
            if index_fields.is_empty() {
                first_index_field(index_fields)?;
            }
            let mut filter = Filter::All;
            let mut projection = Vec::new();
            let mut from_range = false;
            for (position, element) in specs.iter().enumerate() {
                match index_fields.get(position) {
                    Some(field) => {
                        from_range |= element.is_range();
                        filter = filter.and(level_filter(field, element, positional)?);
                    }
                    None => projection.extend(project(element, columns, positional)?),
                }
            }
            Ok(Selection {
                filter,
                projection,
                from_range,
            })
        }
    }
}

fn first_index_field(index_fields: &[String]) -> FrameResult<&str> {
    index_fields
        .first()
        .map(|f| f.as_str())
        .ok_or_else(|| index_error("Frame has no index columns to select by"))
}

fn level_filter(field: &str, spec: &IndexSpec, positional: bool) -> FrameResult<Filter> {
    match spec {
        IndexSpec::Scalar(value) => Ok(Filter::eq(field, value.clone())),
        IndexSpec::List(values) => Ok(Filter::is_in(field, values.clone())),
        IndexSpec::Slice(slice) => {
            let mut filter = Filter::All;
            if let Some(start) = &slice.start {
                filter = filter.and(Filter::field(field, Operator::Gte(start.clone())));
            }
            if let Some(stop) = &slice.stop {
                // positional stops are exclusive
                let stop = match stop {
                    Value::I64(n) if positional => Value::I64(n - 1),
                    other => other.clone(),
                };
                filter = filter.and(Filter::field(field, Operator::Lte(stop)));
            }
            Ok(filter)
        }
        IndexSpec::Tuple(_) => Err(index_error("Nested tuples are not supported in an index spec")),
    }
}

fn project(spec: &IndexSpec, columns: &[String], positional: bool) -> FrameResult<Vec<String>> {
    match spec {
        IndexSpec::Scalar(value) => Ok(vec![column_of(value, columns, positional)?]),
        IndexSpec::List(values) => values
            .iter()
            .map(|v| column_of(v, columns, positional))
            .collect(),
        IndexSpec::Slice(slice) => {
            let bounds = (slice.start.as_ref(), slice.stop.as_ref());
            let integral = |v: Option<&Value>| v.map_or(true, |v| matches!(v, Value::I64(_)));
            let (start, stop) = if positional || (integral(bounds.0) && integral(bounds.1)) {
                (
                    bounds.0.and_then(|v| v.as_i64()).map_or(0, clamp_position),
                    bounds.1.and_then(|v| v.as_i64()).map_or(columns.len(), clamp_position),
                )
            } else {
                // label slices include both ends
                let start = match bounds.0 {
                    Some(label) => label_position(label, columns)?,
                    None => 0,
                };
                let stop = match bounds.1 {
                    Some(label) => label_position(label, columns)? + 1,
                    None => columns.len(),
                };
                (start, stop)
            };
            let stop = stop.min(columns.len());
            Ok(columns[start.min(stop)..stop].to_vec())
        }
        IndexSpec::Tuple(_) => Err(index_error("Nested tuples are not supported in a column spec")),
    }
}

fn clamp_position(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

fn column_of(value: &Value, columns: &[String], positional: bool) -> FrameResult<String> {
    if positional {
        let position = value
            .as_i64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| index_error(&format!("Column position must be a non-negative integer, got {}", value)))?;
        return columns
            .get(position)
            .cloned()
            .ok_or_else(|| index_error(&format!("Column position {} out of range", position)));
    }
    match value.as_str() {
        Some(name) => Ok(name.to_string()),
        None => Err(index_error(&format!("Column label must be a string, got {}", value))),
    }
}

fn label_position(label: &Value, columns: &[String]) -> FrameResult<usize> {
    let name = label
        .as_str()
        .ok_or_else(|| index_error(&format!("Column label must be a string, got {}", label)))?;
    columns.iter().position(|c| c == name).ok_or_else(|| {
        log::error!("Unknown column {} in column slice", name);
        FrameError::new(&format!("Unknown column '{}'", name), ErrorKind::UnknownColumn)
    })
}

fn index_error(message: &str) -> FrameError {
    log::error!("{}", message);
    FrameError::new(message, ErrorKind::IndexError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameValue;
    use crate::store::InMemoryDatabase;
    use crate::{doc, val};
    use proptest::prelude::*;

    fn columns() -> Vec<String> {
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    }

    fn rowid() -> Vec<String> {
        vec![ROW_ID.to_string()]
    }

    /// `n` rows stamped 0..n, labeled 10, 20, ...
    fn frame(n: usize) -> Frame {
        let db = InMemoryDatabase::new("indexer");
        let coll = db.collection("rows");
        let docs = (0..n)
            .map(|i| doc! { "_idx#0_label": (i as i64 * 10), a: (i as i64), b: "x", "_om#rowid": i })
            .collect();
        coll.insert_many(docs).unwrap();
        Frame::new(coll).unwrap()
    }

    #[test]
    fn scalar_is_equality_and_not_range() {
        let selection = select(&IndexSpec::from(3), &rowid(), &columns(), true).unwrap();
        assert_eq!(selection.filter, Filter::eq(ROW_ID, 3));
        assert!(!selection.from_range);
    }

    #[test]
    fn list_is_membership_and_range() {
        let selection = select(&IndexSpec::from(vec![1, 2]), &rowid(), &columns(), false).unwrap();
        assert_eq!(selection.filter, Filter::is_in(ROW_ID, vec![val!(1), val!(2)]));
        assert!(selection.from_range);
    }

    #[test]
    fn positional_slice_stop_is_exclusive() {
        let selection = select(&IndexSpec::from(2..5), &rowid(), &columns(), true).unwrap();
        let expected = Filter::field(ROW_ID, Operator::Gte(val!(2)))
            .and(Filter::field(ROW_ID, Operator::Lte(val!(4))));
        assert_eq!(selection.filter, expected);
        assert!(selection.from_range);
    }

    #[test]
    fn label_slice_is_inclusive() {
        let selection = select(&IndexSpec::slice(2, 5), &rowid(), &columns(), false).unwrap();
        let expected = Filter::field(ROW_ID, Operator::Gte(val!(2)))
            .and(Filter::field(ROW_ID, Operator::Lte(val!(5))));
        assert_eq!(selection.filter, expected);
    }

    #[test]
    fn tuple_remainder_selects_columns() {
        let spec = IndexSpec::from((1, IndexSpec::slice("b", "c")));
        let selection = select(&spec, &rowid(), &columns(), false).unwrap();
        assert_eq!(selection.projection, vec!["b".to_string(), "c".to_string()]);
        assert!(!selection.from_range);

        let spec = IndexSpec::from((1, 2));
        let selection = select(&spec, &rowid(), &columns(), true).unwrap();
        assert_eq!(selection.projection, vec!["c".to_string()]);
    }

    #[test]
    fn unsupported_shapes_are_index_errors() {
        let nested = IndexSpec::Tuple(vec![IndexSpec::Tuple(vec![IndexSpec::from(1)])]);
        let err = select(&nested, &rowid(), &columns(), false).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IndexError);

        let err = select(&IndexSpec::from(1), &[], &columns(), false).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IndexError);

        let err = select(&IndexSpec::from((1, 7)), &rowid(), &columns(), true).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IndexError);
    }

    #[test]
    fn loc_scalar_collapses_but_list_of_one_does_not() {
        let frame = frame(5).select(&["a"]).unwrap();
        let scalar = frame.loc().get(20).unwrap().value().unwrap();
        assert_eq!(scalar, FrameValue::Scalar(val!(2)));

        let table = frame.loc().get(vec![20]).unwrap().value().unwrap();
        let table = table.as_table().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0, "a"), Some(&val!(2)));
    }

    #[test]
    fn loc_scalar_with_many_columns_is_a_row() {
        let value = frame(5).loc().get(30).unwrap().value().unwrap();
        let row = value.as_row().unwrap();
        assert_eq!(row.get("a"), Some(&val!(3)));
        assert_eq!(row.get("b"), Some(&val!("x")));
    }

    proptest! {
        #[test]
        fn iloc_slice_matches_half_open_range(n in 0usize..30, start in 0i64..35, len in 0i64..35) {
            let stop = start + len;
            let frame = frame(n);
            let rows = frame.iloc().get(start..stop).unwrap().value().unwrap();
            let expected = (stop.min(n as i64) - start.min(n as i64)).max(0) as usize;
            // slices never collapse, even to a single row
            prop_assert!(rows.as_table().is_some());
            prop_assert_eq!(rows.len(), expected);
        }

        #[test]
        fn loc_slice_includes_both_labels(n in 1usize..20, start in 0usize..20, len in 0usize..20) {
            let frame = frame(n);
            let (from, to) = (start as i64 * 10, (start + len) as i64 * 10);
            let rows = frame.loc().get(IndexSpec::slice(from, to)).unwrap().value().unwrap();
            let expected = (start + len + 1).min(n).saturating_sub(start);
            prop_assert_eq!(rows.len(), expected);
        }

        #[test]
        fn list_spec_never_collapses(n in 1usize..10, pick in 0usize..10) {
            let frame = frame(n).select(&["a"]).unwrap();
            let label = (pick % n) as i64 * 10;
            let value = frame.loc().get(vec![label]).unwrap().value().unwrap();
            prop_assert!(value.as_table().is_some());
            prop_assert_eq!(value.len(), 1);
        }
    }
}
