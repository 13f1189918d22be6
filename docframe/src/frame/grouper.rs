use crate::common::{Document, SortOrder, SortSpec, Value, DOC_ID};
use crate::errors::{ErrorKind, FrameError, FrameResult};
use crate::filter::Filter;
use crate::frame::frame::unknown_column;
use crate::frame::{Column, Frame, IndexKey, Table};
use crate::store::{Accumulator, GroupSpec, Operand, Pipeline, Stage};
use smallvec::SmallVec;
use std::fmt::{Display, Formatter};

/// Statistic computed per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stat {
    Mean,
    Std,
    Var,
    Min,
    Max,
    Sum,
    Count,
}

impl Stat {
    /// Parses a statistic name; `avg` is accepted for `mean`.
    pub fn parse(name: &str) -> FrameResult<Stat> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mean" | "avg" => Ok(Stat::Mean),
            "std" => Ok(Stat::Std),
            "var" => Ok(Stat::Var),
            "min" => Ok(Stat::Min),
            "max" => Ok(Stat::Max),
            "sum" => Ok(Stat::Sum),
            "count" => Ok(Stat::Count),
            other => {
                log::error!("Unknown statistic {}", other);
                Err(FrameError::new(
                    &format!("Unknown statistic '{}'", other),
                    ErrorKind::InvalidArgument,
                ))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stat::Mean => "mean",
            Stat::Std => "std",
            Stat::Var => "var",
            Stat::Min => "min",
            Stat::Max => "max",
            Stat::Sum => "sum",
            Stat::Count => "count",
        }
    }

    /// Output field for `column`, `{column}_{stat}`.
    pub fn output_name(&self, column: &str) -> String {
        format!("{}_{}", column, self.name())
    }

    // variance is the squared sample deviation, see `finish`
    fn accumulator(&self, column: &str) -> Accumulator {
        let operand = Operand::field(column);
        match self {
            Stat::Mean => Accumulator::Avg(operand),
            Stat::Std | Stat::Var => Accumulator::StdDevSamp(operand),
            Stat::Min => Accumulator::Min(operand),
            Stat::Max => Accumulator::Max(operand),
            Stat::Sum => Accumulator::Sum(operand),
            Stat::Count => Accumulator::Count(operand),
        }
    }

    fn finish(&self, value: Value) -> Value {
        match (self, value.as_f64()) {
            (Stat::Var, Some(deviation)) => Value::F64(deviation * deviation),
            _ => value,
        }
    }
}

impl Display for Stat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Group-by over a frame.
///
/// Aggregations run as a single group stage on the frame's filtered
/// collection and produce a table indexed by the group keys, one row per
/// distinct key combination. Rows come back sorted by key unless
/// [sorted(false)](Grouper::sorted) is set.
#[derive(Debug, Clone)]
pub struct Grouper {
    frame: Frame,
    keys: Vec<String>,
    sort: bool,
}

impl Grouper {
    pub(crate) fn new<S: AsRef<str>>(frame: Frame, keys: &[S]) -> Grouper {
        Grouper {
            frame,
            keys: keys.iter().map(|k| k.as_ref().to_string()).collect(),
            sort: true,
        }
    }

    pub fn sorted(mut self, sort: bool) -> Grouper {
        self.sort = sort;
        self
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Data columns that are not group keys.
    pub fn value_columns(&self) -> Vec<String> {
        self.frame
            .columns()
            .into_iter()
            .filter(|c| !self.keys.contains(c))
            .collect()
    }

    /// One output field per `(column, stat)` pair.
    pub fn aggregate(&self, specs: &[(&str, Stat)]) -> FrameResult<Table> {
        let known = self.frame.columns();
        let mut fields = Vec::with_capacity(specs.len());
        for (column, stat) in specs {
            if !known.iter().any(|k| k == column) {
                return Err(unknown_column(column, &known));
            }
            fields.push((stat.output_name(column), stat.accumulator(column), *stat));
        }
        self.run(fields)
    }

    /// Like [aggregate](Grouper::aggregate), with statistics given by name.
    pub fn agg(&self, specs: &[(&str, &str)]) -> FrameResult<Table> {
        let parsed = specs
            .iter()
            .map(|(column, stat)| Stat::parse(stat).map(|stat| (*column, stat)))
            .collect::<FrameResult<Vec<_>>>()?;
        self.aggregate(&parsed)
    }

    /// One statistic over every value column.
    pub fn stat(&self, stat: Stat) -> FrameResult<Table> {
        let columns = self.value_columns();
        let specs: Vec<(&str, Stat)> = columns.iter().map(|c| (c.as_str(), stat)).collect();
        self.aggregate(&specs)
    }

    pub fn mean(&self) -> FrameResult<Table> {
        self.stat(Stat::Mean)
    }

    pub fn std(&self) -> FrameResult<Table> {
        self.stat(Stat::Std)
    }

    pub fn var(&self) -> FrameResult<Table> {
        self.stat(Stat::Var)
    }

    pub fn min(&self) -> FrameResult<Table> {
        self.stat(Stat::Min)
    }

    pub fn max(&self) -> FrameResult<Table> {
        self.stat(Stat::Max)
    }

    pub fn sum(&self) -> FrameResult<Table> {
        self.stat(Stat::Sum)
    }

    /// Non-null counts per value column, each keeping the column's name. A
    /// frame with only key columns counts rows into a field named after the
    /// joined keys.
    pub fn count(&self) -> FrameResult<Table> {
        let columns = self.value_columns();
        if columns.is_empty() {
            let name = format!("{}_count", self.keys.join("_"));
            let counter = Accumulator::Sum(Operand::Literal(Value::I64(1)));
            return self.run(vec![(name, counter, Stat::Count)]);
        }
        self.run(
            columns
                .into_iter()
                .map(|c| {
                    let accumulator = Stat::Count.accumulator(&c);
                    (c, accumulator, Stat::Count)
                })
                .collect(),
        )
    }

    /// One `(key, frame)` pair per distinct group.
    ///
    /// Only the keys are fetched up front; each frame is a lazy view of its
    /// group's rows.
    pub fn groups(&self) -> FrameResult<impl Iterator<Item = (Document, Frame)>> {
        self.check_keys()?;
        let keys = self.keys.clone();
        let frame = self.frame.clone();
        let documents = self.frame.view().aggregate(&self.pipeline(Vec::new()))?.collect_documents()?;
        Ok(documents.into_iter().map(move |doc| {
            let key: Document = keys
                .iter()
                .map(|k| (k.clone(), doc.get_path(&format!("{}.{}", DOC_ID, k)).cloned().unwrap_or_default()))
                .collect();
            let filter = key
                .iter()
                .fold(Filter::All, |filter, (k, v)| filter.and(Filter::eq(k, v.clone())));
            (key, frame.with_filter(filter))
        }))
    }

    /// The aggregation pipeline for the given output fields.
    pub fn pipeline(&self, fields: Vec<(String, Accumulator)>) -> Pipeline {
        let mut pipeline = Pipeline::new().stage(Stage::Group(GroupSpec {
            keys: self.keys.clone(),
            accumulators: fields,
        }));
        if self.sort && !self.keys.is_empty() {
            let mut sort = SortSpec::new();
            for key in &self.keys {
                sort = sort.then_by(&format!("{}.{}", DOC_ID, key), SortOrder::Ascending);
            }
            pipeline.push(Stage::Sort(sort));
        }
        pipeline
    }

    fn check_keys(&self) -> FrameResult<()> {
        if self.keys.is_empty() {
            log::error!("Groups requested without group keys");
            return Err(FrameError::new(
                "Iterating groups needs at least one key",
                ErrorKind::InvalidArgument,
            ));
        }
        Ok(())
    }

    fn run(&self, fields: Vec<(String, Accumulator, Stat)>) -> FrameResult<Table> {
        let names: Vec<String> = fields.iter().map(|(name, _, _)| name.clone()).collect();
        let stats: Vec<Stat> = fields.iter().map(|(_, _, stat)| *stat).collect();
        let pipeline = self.pipeline(
            fields
                .into_iter()
                .map(|(name, accumulator, _)| (name, accumulator))
                .collect(),
        );
        log::debug!("Group pipeline on {}: {:?}", self.frame.name(), pipeline.to_documents());

        self.frame.before_resolve()?;
        let documents = self.frame.view().aggregate(&pipeline)?.collect_documents()?;

        let mut table = Table::new(&names);
        if !self.keys.is_empty() {
            table = table.with_index_names(&self.keys)?;
        }
        for (position, doc) in documents.iter().enumerate() {
            let key: IndexKey = if self.keys.is_empty() {
                SmallVec::from_elem(Value::from(position), 1)
            } else {
                self.keys
                    .iter()
                    .map(|k| {
                        doc.get_path(&format!("{}.{}", DOC_ID, k))
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect()
            };
            let values = names
                .iter()
                .zip(stats.iter())
                .map(|(name, stat)| stat.finish(doc.get(name).cloned().unwrap_or_default()))
                .collect();
            table.push_row(key, values)?;
        }
        self.frame.after_resolve(table.len())?;
        Ok(table)
    }
}

/// Group-by over a single series.
#[derive(Debug, Clone)]
pub struct SeriesGrouper {
    grouper: Grouper,
    column: String,
}

impl SeriesGrouper {
    pub(crate) fn new(grouper: Grouper, column: &str) -> SeriesGrouper {
        SeriesGrouper {
            grouper,
            column: column.to_string(),
        }
    }

    pub fn sorted(self, sort: bool) -> SeriesGrouper {
        SeriesGrouper {
            grouper: self.grouper.sorted(sort),
            ..self
        }
    }

    /// The statistic per group, indexed by the group keys.
    pub fn stat(&self, stat: Stat) -> FrameResult<Column> {
        let table = self.grouper.aggregate(&[(self.column.as_str(), stat)])?;
        let name = stat.output_name(&self.column);
        table.column(&name).ok_or_else(|| {
            log::error!("Group output lacks field {}", name);
            FrameError::new(&format!("Missing group output {}", name), ErrorKind::InternalError)
        })
    }

    pub fn mean(&self) -> FrameResult<Column> {
        self.stat(Stat::Mean)
    }

    pub fn std(&self) -> FrameResult<Column> {
        self.stat(Stat::Std)
    }

    pub fn var(&self) -> FrameResult<Column> {
        self.stat(Stat::Var)
    }

    pub fn min(&self) -> FrameResult<Column> {
        self.stat(Stat::Min)
    }

    pub fn max(&self) -> FrameResult<Column> {
        self.stat(Stat::Max)
    }

    pub fn sum(&self) -> FrameResult<Column> {
        self.stat(Stat::Sum)
    }

    /// Non-null counts per group, named after the series.
    pub fn count(&self) -> FrameResult<Column> {
        let counter = Stat::Count.accumulator(&self.column);
        let table = self
            .grouper
            .run(vec![(self.column.clone(), counter, Stat::Count)])?;
        table.column(&self.column).ok_or_else(|| {
            log::error!("Group output lacks field {}", self.column);
            FrameError::new(
                &format!("Missing group output {}", self.column),
                ErrorKind::InternalError,
            )
        })
    }

    pub fn groups(&self) -> FrameResult<impl Iterator<Item = (Document, Frame)>> {
        self.grouper.groups()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDatabase;
    use crate::{doc, q, val};

    fn frame() -> Frame {
        let db = InMemoryDatabase::new("groups");
        let coll = db.collection("data");
        coll.insert_many(vec![
            doc! { x: 2, y: 30, z: "c" },
            doc! { x: 1, y: 10, z: "a" },
            doc! { x: 2, y: 40, z: "d" },
            doc! { x: 1, y: 20, z: "b" },
        ])
        .unwrap();
        Frame::new(coll).unwrap()
    }

    #[test]
    fn sum_by_key_sorted() {
        let table = frame().groupby(&["x"]).aggregate(&[("y", Stat::Sum)]).unwrap();
        assert_eq!(table.index_names(), &["x"]);
        assert_eq!(table.columns(), &["y_sum"]);
        let keys: Vec<Value> = table.index().iter().map(|k| k[0].clone()).collect();
        assert_eq!(keys, vec![val!(1), val!(2)]);
        assert_eq!(table.column("y_sum").unwrap().into_values(), vec![val!(30), val!(70)]);
    }

    #[test]
    fn unsorted_keeps_first_seen_order() {
        let table = frame().groupby(&["x"]).sorted(false).sum().unwrap();
        assert_eq!(table.index()[0][0], val!(2));
    }

    #[test]
    fn named_statistics() {
        let table = frame()
            .groupby(&["x"])
            .agg(&[("y", "mean"), ("y", "std"), ("y", "var"), ("z", "max")])
            .unwrap();
        assert_eq!(table.columns(), &["y_mean", "y_std", "y_var", "z_max"]);
        assert_eq!(table.get(0, "y_mean"), Some(&val!(15.0)));
        let std = table.get(0, "y_std").and_then(|v| v.as_f64()).unwrap();
        let var = table.get(0, "y_var").and_then(|v| v.as_f64()).unwrap();
        assert!((std * std - var).abs() < 1e-9);
        assert!((var - 50.0).abs() < 1e-9);
        assert_eq!(table.get(1, "z_max"), Some(&val!("d")));
    }

    #[test]
    fn unknown_stat_or_column() {
        let grouper = frame().groupby(&["x"]);
        assert_eq!(grouper.agg(&[("y", "median")]).unwrap_err().kind(), &ErrorKind::InvalidArgument);
        assert_eq!(
            grouper.aggregate(&[("w", Stat::Sum)]).unwrap_err().kind(),
            &ErrorKind::UnknownColumn
        );
    }

    #[test]
    fn count_of_key_only_frame() {
        let table = frame().select(&["x"]).unwrap().groupby(&["x"]).count().unwrap();
        assert_eq!(table.columns(), &["x_count"]);
        assert_eq!(table.column("x_count").unwrap().into_values(), vec![val!(2), val!(2)]);
    }

    #[test]
    fn groups_are_lazy_subframes() {
        let groups: Vec<(Document, Frame)> = frame().groupby(&["x"]).groups().unwrap().collect();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, doc! { x: 1 });
        assert_eq!(groups[1].1.len().unwrap(), 2);
        let ys = groups[1].1.table().unwrap().column("y").unwrap().into_values();
        assert_eq!(ys, vec![val!(30), val!(40)]);
    }

    #[test]
    fn grouping_respects_query() {
        let frame = frame().query(&q!(y__gt = 15)).unwrap();
        let table = frame.groupby(&["x"]).count().unwrap();
        assert_eq!(table.columns(), &["y", "z"]);
        assert_eq!(table.get(0, "y"), Some(&val!(1)));
        assert_eq!(table.get(1, "z"), Some(&val!(2)));
    }

    #[test]
    fn series_grouper_count_keeps_series_name() {
        let column = frame().column("y").unwrap().groupby(&["x"]).count().unwrap();
        assert_eq!(column.name(), "y");
        assert_eq!(column.into_values(), vec![val!(2), val!(2)]);
    }

    #[test]
    fn series_grouper_returns_column() {
        let column = frame().column("y").unwrap().groupby(&["x"]).max().unwrap();
        assert_eq!(column.name(), "y_max");
        assert_eq!(column.into_values(), vec![val!(20), val!(40)]);
    }
}
