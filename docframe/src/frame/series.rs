use crate::common::Value;
use crate::errors::{ErrorKind, FrameError, FrameResult};
use crate::filter::{Filter, Q};
use crate::frame::{Frame, Grouper, Inspection, SeriesGrouper, SeriesIndexer, SeriesValue, Stat};

/// A frame restricted to one data column.
///
/// A series shares the collection, filter and row state of the frame it was
/// taken from. Comparisons happen on resolved values only.
#[derive(Debug, Clone)]
pub struct Series {
    frame: Frame,
    name: String,
    unique: bool,
}

impl Series {
    pub(crate) fn from_frame(frame: Frame, name: &str) -> FrameResult<Series> {
        let frame = if frame.columns().len() == 1 && frame.columns()[0] == name {
            frame
        } else {
            frame.select(&[name])?
        };
        Ok(Series {
            frame,
            name: name.to_string(),
            unique: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The single-column frame behind this series.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    fn wrap(&self, frame: Frame) -> Series {
        Series {
            frame,
            name: self.name.clone(),
            unique: self.unique,
        }
    }

    pub fn query(&self, q: &Q) -> FrameResult<Series> {
        Ok(self.wrap(self.frame.query(q)?))
    }

    /// Sorts by this series' values, descending when `ascending` is false.
    pub fn sort(&self, ascending: bool) -> FrameResult<Series> {
        let spec = if ascending {
            self.name.clone()
        } else {
            format!("-{}", self.name)
        };
        Ok(self.wrap(self.frame.sort(&[spec])?))
    }

    pub fn head(&self, n: usize) -> Series {
        self.wrap(self.frame.head(n))
    }

    pub fn tail(&self, n: usize) -> FrameResult<Series> {
        Ok(self.wrap(self.frame.tail(n)?))
    }

    pub fn skip(&self, n: usize) -> Series {
        self.wrap(self.frame.skip(n))
    }

    pub fn len(&self) -> FrameResult<usize> {
        if self.unique {
            return Ok(self.distinct()?.len());
        }
        self.frame.len()
    }

    pub fn is_empty(&self) -> FrameResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn shape(&self) -> FrameResult<(usize,)> {
        Ok((self.len()?,))
    }

    pub fn ndim(&self) -> usize {
        1
    }

    pub fn loc(&self) -> SeriesIndexer<'_> {
        SeriesIndexer::new(self, false)
    }

    pub fn iloc(&self) -> SeriesIndexer<'_> {
        SeriesIndexer::new(self, true)
    }

    /// A series resolving to its distinct values, in the order the store
    /// returns them; distance order is kept under a `near` filter.
    pub fn unique(&self) -> Series {
        Series {
            unique: true,
            ..self.clone()
        }
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Resolves the series.
    ///
    /// A series taken through a scalar index lookup that matches one row
    /// collapses to that value.
    pub fn value(&self) -> FrameResult<SeriesValue> {
        if self.unique {
            return Ok(SeriesValue::Unique(self.distinct()?));
        }
        let table = self.frame.table()?;
        let column = table.column(&self.name).ok_or_else(|| {
            log::error!("Resolved table lacks column {}", self.name);
            FrameError::new(
                &format!("Column {} missing from resolved rows", self.name),
                ErrorKind::InternalError,
            )
        })?;
        let state = self.frame.state();
        if state.from_indexer && !state.from_range && column.len() == 1 {
            return Ok(SeriesValue::Scalar(column.into_values().remove(0)));
        }
        Ok(SeriesValue::Column(column))
    }

    /// Plain resolved values.
    pub fn values(&self) -> FrameResult<Vec<Value>> {
        Ok(self.value()?.values())
    }

    fn distinct(&self) -> FrameResult<Vec<Value>> {
        self.frame.before_resolve()?;
        let values = self.frame.view().distinct(&self.name, &Filter::All)?;
        self.frame.after_resolve(values.len())?;
        Ok(values)
    }

    /// A single statistic over the whole series.
    pub fn stat(&self, stat: Stat) -> FrameResult<Value> {
        let table = Grouper::new(self.frame.clone(), &[] as &[&str])
            .sorted(false)
            .aggregate(&[(self.name.as_str(), stat)])?;
        Ok(table
            .get(0, &stat.output_name(&self.name))
            .cloned()
            .unwrap_or_default())
    }

    pub fn mean(&self) -> FrameResult<Value> {
        self.stat(Stat::Mean)
    }

    pub fn std(&self) -> FrameResult<Value> {
        self.stat(Stat::Std)
    }

    pub fn var(&self) -> FrameResult<Value> {
        self.stat(Stat::Var)
    }

    pub fn min(&self) -> FrameResult<Value> {
        self.stat(Stat::Min)
    }

    pub fn max(&self) -> FrameResult<Value> {
        self.stat(Stat::Max)
    }

    pub fn sum(&self) -> FrameResult<Value> {
        self.stat(Stat::Sum)
    }

    pub fn count(&self) -> FrameResult<Value> {
        self.stat(Stat::Count)
    }

    /// Groups this series' values by other columns of the collection.
    pub fn groupby<S: AsRef<str>>(&self, keys: &[S]) -> SeriesGrouper {
        let grouper = Grouper::new(self.frame.clone(), keys).sorted(self.frame.config().group_sort());
        SeriesGrouper::new(grouper, &self.name)
    }

    pub fn inspect(&self, explain: bool) -> FrameResult<Inspection> {
        self.frame.inspect(explain)
    }
}
