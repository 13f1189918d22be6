use crate::common::{
    index_column_name, index_label, restore_index_order, Document, SortOrder, SortSpec, Value,
    DEFAULT_INDEX_NAME, ROW_ID,
};
use crate::errors::{ErrorKind, FrameError, FrameResult};
use crate::filter::Filter;
use crate::store::{Collection, FindOptions};
use smallvec::SmallVec;
use std::fmt::{Display, Formatter};

/// Row label: one value per index level.
pub type IndexKey = SmallVec<[Value; 2]>;

/// A materialized frame: labeled rows of values in a fixed column order.
///
/// Every table carries a row index. Tables read from a collection use the
/// stored index columns; without those the row-sequence stamp, and without
/// that the row position.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    index_names: Vec<String>,
    index: Vec<IndexKey>,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// An empty table with a single default index level.
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Table {
        Table {
            index_names: vec![DEFAULT_INDEX_NAME.to_string()],
            index: Vec::new(),
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a table with a positional index from row vectors.
    pub fn from_rows<S: AsRef<str>>(columns: &[S], rows: Vec<Vec<Value>>) -> FrameResult<Table> {
        let mut table = Table::new(columns);
        for (position, row) in rows.into_iter().enumerate() {
            table.push_row(SmallVec::from_elem(Value::from(position), 1), row)?;
        }
        Ok(table)
    }

    /// Renames the index levels. Only valid before rows are added.
    pub fn with_index_names<S: AsRef<str>>(mut self, names: &[S]) -> FrameResult<Table> {
        if !self.rows.is_empty() || names.is_empty() {
            log::error!("Index names must be set on an empty table and must not be empty");
            return Err(FrameError::new(
                "Index names must be set on an empty table and must not be empty",
                ErrorKind::InvalidArgument,
            ));
        }
        self.index_names = names.iter().map(|n| n.as_ref().to_string()).collect();
        Ok(self)
    }

    pub fn push_row(&mut self, key: IndexKey, values: Vec<Value>) -> FrameResult<()> {
        if key.len() != self.index_names.len() || values.len() != self.columns.len() {
            log::error!(
                "Row shape ({}, {}) does not match table shape ({}, {})",
                key.len(),
                values.len(),
                self.index_names.len(),
                self.columns.len()
            );
            return Err(FrameError::new(
                &format!(
                    "Row with {} index value(s) and {} value(s) does not fit a table with {} index level(s) and {} column(s)",
                    key.len(),
                    values.len(),
                    self.index_names.len(),
                    self.columns.len()
                ),
                ErrorKind::InvalidArgument,
            ));
        }
        self.index.push(key);
        self.rows.push(values);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn index_names(&self) -> &[String] {
        &self.index_names
    }

    pub fn index(&self) -> &[IndexKey] {
        &self.index
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let position = self.column_position(column)?;
        self.rows.get(row).and_then(|r| r.get(position))
    }

    pub fn column(&self, name: &str) -> Option<Column> {
        let position = self.column_position(name)?;
        Some(Column {
            name: name.to_string(),
            index_names: self.index_names.clone(),
            index: self.index.clone(),
            values: self.rows.iter().map(|r| r[position].clone()).collect(),
        })
    }

    pub fn row(&self, position: usize) -> Option<Row> {
        let values = self.rows.get(position)?;
        Some(Row {
            index: self.index[position].clone(),
            columns: self.columns.clone(),
            values: values.clone(),
        })
    }

    /// Replaces a column's values, or appends the column when it is new.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> FrameResult<()> {
        if values.len() != self.rows.len() {
            log::error!(
                "Column {} has {} value(s) for {} row(s)",
                name,
                values.len(),
                self.rows.len()
            );
            return Err(FrameError::new(
                &format!(
                    "Column {} needs {} value(s), got {}",
                    name,
                    self.rows.len(),
                    values.len()
                ),
                ErrorKind::InvalidArgument,
            ));
        }
        match self.column_position(name) {
            Some(position) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[position] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Removes a column, returning its values.
    pub fn drop_column(&mut self, name: &str) -> Option<Vec<Value>> {
        let position = self.column_position(name)?;
        self.columns.remove(position);
        Some(self.rows.iter_mut().map(|row| row.remove(position)).collect())
    }

    /// Rows as documents, with index levels stored as index columns.
    pub fn to_documents(&self) -> Vec<Document> {
        self.documents(None)
    }

    /// Like [to_documents](Self::to_documents) but stamps each row with a
    /// contiguous row-sequence number starting at `start`.
    pub fn to_stamped_documents(&self, start: usize) -> Vec<Document> {
        self.documents(Some(start))
    }

    fn documents(&self, stamp_from: Option<usize>) -> Vec<Document> {
        let index_columns: Vec<String> = self
            .index_names
            .iter()
            .enumerate()
            .map(|(position, name)| index_column_name(position, name))
            .collect();

        self.rows
            .iter()
            .zip(self.index.iter())
            .enumerate()
            .map(|(position, (values, key))| {
                let mut doc = Document::with_capacity(index_columns.len() + values.len() + 1);
                for (name, value) in index_columns.iter().zip(key.iter()) {
                    doc.put(name, value.clone());
                }
                for (name, value) in self.columns.iter().zip(values.iter()) {
                    doc.put(name, value.clone());
                }
                if let Some(start) = stamp_from {
                    doc.put(ROW_ID, start + position);
                }
                doc
            })
            .collect()
    }

    /// Builds a table from resolved documents.
    ///
    /// `columns` decides the column order; a column a document lacks becomes
    /// null. Identity and bookkeeping fields are never copied unless listed.
    pub(crate) fn from_documents(documents: &[Document], columns: &[String]) -> Table {
        let index_fields = documents
            .first()
            .map(|d| restore_index_order(d.keys()))
            .unwrap_or_default();
        let stamped = documents.first().is_some_and(|d| d.contains_key(ROW_ID));

        let index_names = if index_fields.is_empty() {
            vec![DEFAULT_INDEX_NAME.to_string()]
        } else {
            index_fields.iter().map(|f| index_label(f)).collect()
        };

        let mut index = Vec::with_capacity(documents.len());
        let mut rows = Vec::with_capacity(documents.len());
        for (position, doc) in documents.iter().enumerate() {
            let key: IndexKey = if !index_fields.is_empty() {
                index_fields
                    .iter()
                    .map(|f| doc.get(f).cloned().unwrap_or_default())
                    .collect()
            } else if stamped {
                SmallVec::from_elem(doc.get(ROW_ID).cloned().unwrap_or_default(), 1)
            } else {
                SmallVec::from_elem(Value::from(position), 1)
            };
            index.push(key);
            rows.push(
                columns
                    .iter()
                    .map(|c| doc.get_path(c).cloned().unwrap_or_default())
                    .collect(),
            );
        }

        Table {
            index_names,
            index,
            columns: columns.to_vec(),
            rows,
        }
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}\t{}", self.index_names.join(","), self.columns.join("\t"))?;
        for (key, values) in self.index.iter().zip(self.rows.iter()) {
            let key = key.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",");
            let values = values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("\t");
            writeln!(f, "{}\t{}", key, values)?;
        }
        Ok(())
    }
}

/// One column of a table with its row labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    index_names: Vec<String>,
    index: Vec<IndexKey>,
    values: Vec<Value>,
}

impl Column {
    /// A column with a positional index.
    pub fn new(name: &str, values: Vec<Value>) -> Column {
        Column {
            name: name.to_string(),
            index_names: vec![DEFAULT_INDEX_NAME.to_string()],
            index: (0..values.len())
                .map(|p| SmallVec::from_elem(Value::from(p), 1))
                .collect(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn index(&self) -> &[IndexKey] {
        &self.index
    }

    pub fn get(&self, position: usize) -> Option<&Value> {
        self.values.get(position)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// A one-column table named after this column, keeping the row labels.
    pub fn into_table(self) -> Table {
        Table {
            index_names: self.index_names,
            index: self.index,
            columns: vec![self.name],
            rows: self.values.into_iter().map(|v| vec![v]).collect(),
        }
    }
}

/// A single row of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    index: IndexKey,
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn index(&self) -> &IndexKey {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        let position = self.columns.iter().position(|c| c == column)?;
        self.values.get(position)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_document(&self) -> Document {
        self.columns
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }
}

/// Resolved value of a frame.
///
/// Indexer results collapse: one row with one column becomes a scalar and
/// one row with several columns becomes a row. Everything else, including
/// any result of a list or slice indexer, stays a table.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameValue {
    Table(Table),
    Row(Row),
    Scalar(Value),
}

impl FrameValue {
    /// Number of rows the value represents.
    pub fn len(&self) -> usize {
        match self {
            FrameValue::Table(table) => table.len(),
            FrameValue::Row(_) | FrameValue::Scalar(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            FrameValue::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_row(&self) -> Option<&Row> {
        match self {
            FrameValue::Row(row) => Some(row),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FrameValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_table(self) -> Option<Table> {
        match self {
            FrameValue::Table(table) => Some(table),
            _ => None,
        }
    }
}

/// Resolved value of a series.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesValue {
    Column(Column),
    Scalar(Value),
    /// Distinct values in first-seen order.
    Unique(Vec<Value>),
}

impl SeriesValue {
    pub fn len(&self) -> usize {
        match self {
            SeriesValue::Column(column) => column.len(),
            SeriesValue::Scalar(_) => 1,
            SeriesValue::Unique(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_column(&self) -> Option<&Column> {
        match self {
            SeriesValue::Column(column) => Some(column),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            SeriesValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// The plain values, whatever the shape.
    pub fn values(&self) -> Vec<Value> {
        match self {
            SeriesValue::Column(column) => column.values().to_vec(),
            SeriesValue::Scalar(value) => vec![value.clone()],
            SeriesValue::Unique(values) => values.clone(),
        }
    }
}

/// First free row-sequence number of `collection`: one past the highest
/// stamp, or 0 when no row is stamped. Stamps may have gaps, so this is not
/// the row count.
pub fn next_row_stamp(collection: &Collection) -> FrameResult<usize> {
    let options = FindOptions::new()
        .projection(vec![ROW_ID.to_string()])
        .sort(SortSpec::by(ROW_ID, SortOrder::Descending))
        .limit(1);
    let highest = collection
        .find(&Filter::All, &options)?
        .collect_documents()?
        .first()
        .and_then(|doc| doc.get(ROW_ID))
        .and_then(Value::as_i64);
    Ok(highest.map_or(0, |row| (row.max(-1) + 1) as usize))
}

/// Writes `table` into `collection`, stamping index columns and row-sequence
/// numbers. The collection is replaced unless `append` is set, in which case
/// numbering continues after the highest stamp already present.
pub fn write_table(collection: &Collection, table: &Table, append: bool) -> FrameResult<usize> {
    let start = if append {
        next_row_stamp(collection)?
    } else {
        collection.drop_collection()?;
        0
    };
    let written = collection.insert_many(table.to_stamped_documents(start))?;
    log::debug!(
        "Wrote {} row(s) to {} starting at row {}",
        written,
        collection.name(),
        start
    );
    Ok(written)
}
