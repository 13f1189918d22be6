use crate::common::{
    is_reserved_column, restore_index_order, Document, SortOrder, SortSpec, Value, DOC_ID, ROW_ID,
};
use crate::errors::{ErrorKind, FrameError, FrameResult};
use crate::filter::{Filter, Q};
use crate::frame::state::FrameState;
use crate::frame::{
    next_row_stamp, FrameCapability, FrameValue, Grouper, Inspection, LocIndexer, Series, Stat,
    Table,
};
use crate::frame_config::FrameConfig;
use crate::store::{make_index, Collection, FindOptions, IndexDefinition};
use crate::transform::{self, PendingTransform, PersistOptions, Persisted, TransformFn, TransformOptions};
use crate::view::FilteredCollection;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// A lazy, pandas-like frame over a document collection.
///
/// A frame only records what to fetch: the filtered view it reads from,
/// the columns, the sort order and skip/limit. Nothing touches the store
/// until [value](Frame::value), [table](Frame::table), [len](Frame::len) or
/// [persist](Frame::persist) is called.
///
/// Refining operations such as [query](Frame::query), [sort](Frame::sort) or
/// [select](Frame::select) return a new frame that shares the collection
/// handle; only [query_inplace](Frame::query_inplace) changes a frame in place.
///
/// # Examples
///
/// ```rust,ignore
/// use docframe::{q, frame::Frame};
///
/// let frame = Frame::new(collection)?;
/// let adults = frame.query(&q!(age__gte = 18))?.sort(&["-age"])?.head(10);
/// let table = adults.table()?;
/// ```
#[derive(Clone)]
pub struct Frame {
    view: FilteredCollection,
    state: Arc<FrameState>,
    config: FrameConfig,
    capabilities: Vec<Arc<dyn FrameCapability>>,
    transform: Option<Arc<PendingTransform>>,
}

impl Frame {
    /// Opens a frame over every document of `collection` with default settings.
    pub fn new(collection: Collection) -> FrameResult<Frame> {
        Frame::open(
            FilteredCollection::unfiltered(collection),
            FrameConfig::new(),
            Vec::new(),
            None,
        )
    }

    /// Opens a frame over a view. Without explicit `columns` the data
    /// columns of the first stored document are used.
    pub(crate) fn open(
        view: FilteredCollection,
        config: FrameConfig,
        capabilities: Vec<Arc<dyn FrameCapability>>,
        columns: Option<Vec<String>>,
    ) -> FrameResult<Frame> {
        let columns = match columns {
            Some(columns) => columns,
            None => data_columns(view.base())?,
        };
        Ok(Frame {
            view,
            state: Arc::new(FrameState::new(columns)),
            config,
            capabilities,
            transform: None,
        })
    }

    /// A frame over another collection with the same settings and capabilities.
    pub(crate) fn sibling_frame(
        &self,
        collection: Collection,
        columns: Option<Vec<String>>,
    ) -> FrameResult<Frame> {
        Frame::open(
            FilteredCollection::unfiltered(collection),
            self.config.clone(),
            self.capabilities.clone(),
            columns,
        )
    }

    fn refine(&self, state: FrameState) -> Frame {
        Frame {
            view: self.view.clone(),
            state: Arc::new(state),
            config: self.config.clone(),
            capabilities: self.capabilities.clone(),
            transform: None,
        }
    }

    pub(crate) fn narrowed(&self, filter: Filter, from_range: bool) -> Frame {
        Frame {
            view: self.view.narrow(filter),
            ..self.refine(self.state.from_indexer(from_range))
        }
    }

    pub(crate) fn with_force_columns(&self, columns: Vec<String>) -> Frame {
        self.refine(self.state.with_force_columns(columns))
    }

    pub(crate) fn with_transform(&self, pending: PendingTransform) -> Frame {
        Frame {
            transform: Some(Arc::new(pending)),
            ..self.refine((*self.state).clone())
        }
    }

    pub(crate) fn pending_transform(&self) -> Option<&Arc<PendingTransform>> {
        self.transform.as_ref()
    }

    pub(crate) fn state(&self) -> &FrameState {
        &self.state
    }

    /// Attaches a capability; it carries over to every frame derived from this one.
    pub fn with_capability(mut self, capability: Arc<dyn FrameCapability>) -> Frame {
        self.capabilities.push(capability);
        self
    }

    pub fn capabilities(&self) -> &[Arc<dyn FrameCapability>] {
        &self.capabilities
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// The filtered view this frame reads from.
    pub fn view(&self) -> &FilteredCollection {
        &self.view
    }

    /// The raw collection underneath.
    pub fn collection(&self) -> &Collection {
        self.view.base()
    }

    pub fn name(&self) -> String {
        self.view.name()
    }

    /// A new frame whose rows also satisfy `q`.
    pub fn query(&self, q: &Q) -> FrameResult<Frame> {
        Ok(self.with_filter(q.translate()?))
    }

    pub(crate) fn with_filter(&self, filter: Filter) -> Frame {
        Frame {
            view: self.view.narrow(filter),
            ..self.refine((*self.state).clone())
        }
    }

    /// Narrows this frame by `q` in place.
    pub fn query_inplace(&mut self, q: &Q) -> FrameResult<&mut Frame> {
        let filter = q.translate()?;
        self.view = self.view.narrow(filter);
        self.transform = None;
        Ok(self)
    }

    /// Sorts by signed column specs, `["-year", "name"]`.
    pub fn sort<S: AsRef<str>>(&self, specs: &[S]) -> FrameResult<Frame> {
        let sort = SortSpec::parse(specs)?;
        Ok(self.refine(self.state.with_sort(sort)))
    }

    /// At most `n` rows.
    pub fn head(&self, n: usize) -> Frame {
        let limit = self.state.limit.map_or(n, |limit| limit.min(n));
        self.refine(self.state.with_limit(limit))
    }

    /// The last `n` rows.
    pub fn tail(&self, n: usize) -> FrameResult<Frame> {
        let len = self.len()?;
        let skip = self.state.skip.unwrap_or(0) + len.saturating_sub(n);
        Ok(self.refine(self.state.with_skip(skip).with_limit(n.min(len))))
    }

    /// Skips the first `n` rows.
    pub fn skip(&self, n: usize) -> Frame {
        let skip = self.state.skip.unwrap_or(0) + n;
        let mut state = self.state.with_skip(skip);
        if let Some(limit) = self.state.limit {
            state = state.with_limit(limit.saturating_sub(n));
        }
        self.refine(state)
    }

    /// A frame restricted to `columns`, in the given order.
    ///
    /// # Errors
    ///
    /// Returns `UnknownColumn` for a name the frame does not have.
    pub fn select<S: AsRef<str>>(&self, columns: &[S]) -> FrameResult<Frame> {
        let known = self.known_columns();
        let mut selected = Vec::with_capacity(columns.len());
        for column in columns {
            let column = column.as_ref();
            if !known.iter().any(|k| k == column) {
                return Err(unknown_column(column, &known));
            }
            selected.push(column.to_string());
        }
        let forced = self
            .state
            .force_columns
            .iter()
            .filter(|c| selected.contains(c))
            .cloned()
            .collect();
        Ok(self.refine(self.state.with_columns(selected).with_force_columns(forced)))
    }

    /// A single-column series sharing this frame's view and state.
    pub fn column(&self, name: &str) -> FrameResult<Series> {
        let frame = self.select(&[name])?;
        Series::from_frame(frame, name)
    }

    /// The series of the column at `position`.
    pub fn iloc_column(&self, position: usize) -> FrameResult<Series> {
        let columns = self.columns();
        match columns.get(position) {
            Some(name) => self.column(name),
            None => {
                log::error!("Column position {} out of range for {} column(s)", position, columns.len());
                Err(FrameError::new(
                    &format!("Column position {} out of range", position),
                    ErrorKind::IndexError,
                ))
            }
        }
    }

    pub fn columns(&self) -> Vec<String> {
        self.state.columns.iter().cloned().collect()
    }

    fn known_columns(&self) -> Vec<String> {
        self.state.output_columns()
    }

    /// Stored index columns in level order.
    pub fn index_columns(&self) -> FrameResult<Vec<String>> {
        Ok(self
            .sample()?
            .map(|doc| restore_index_order(doc.keys()))
            .unwrap_or_default())
    }

    /// True when the base collection's stamps run `0..count` without gaps,
    /// so a stamp equals a row position.
    pub(crate) fn has_dense_row_stamp(&self) -> FrameResult<bool> {
        if !self.sample()?.is_some_and(|doc| doc.contains_key(ROW_ID)) {
            return Ok(false);
        }
        let base = self.view.base();
        Ok(next_row_stamp(base)? == base.count(&Filter::All)?)
    }

    fn sample(&self) -> FrameResult<Option<Document>> {
        self.view.base().find_one(&Filter::All)
    }

    /// Number of rows the frame resolves to, counted by the store.
    pub fn len(&self) -> FrameResult<usize> {
        let total = self.view.count(&Filter::All)?;
        let after_skip = total.saturating_sub(self.state.skip.unwrap_or(0));
        Ok(self.state.limit.map_or(after_skip, |limit| after_skip.min(limit)))
    }

    /// Alias of [len](Frame::len).
    pub fn count(&self) -> FrameResult<usize> {
        self.len()
    }

    pub fn is_empty(&self) -> FrameResult<bool> {
        Ok(self.len()? == 0)
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> FrameResult<(usize, usize)> {
        Ok((self.len()?, self.known_columns().len()))
    }

    pub fn ndim(&self) -> usize {
        2
    }

    /// Resolves the frame.
    ///
    /// Frames produced by an indexer collapse a single row: to a scalar when
    /// there is one column, to a row otherwise. Frames indexed by a list or
    /// slice, and all other frames, resolve to a table. A pending transform
    /// runs first and the result is read back from its output.
    pub fn value(&self) -> FrameResult<FrameValue> {
        if self.transform.is_some() {
            return self.run_pending()?.value();
        }
        let table = self.resolve_table()?;
        Ok(self.collapse(table))
    }

    /// Resolves the frame to a table, never collapsing.
    pub fn table(&self) -> FrameResult<Table> {
        if self.transform.is_some() {
            return self.run_pending()?.table();
        }
        self.resolve_table()
    }

    fn collapse(&self, table: Table) -> FrameValue {
        if !self.state.from_indexer || self.state.from_range || table.len() != 1 {
            return FrameValue::Table(table);
        }
        match table.columns().len() {
            0 => FrameValue::Table(table),
            1 => FrameValue::Scalar(table.rows()[0][0].clone()),
            _ => match table.row(0) {
                Some(row) => FrameValue::Row(row),
                None => FrameValue::Table(table),
            },
        }
    }

    pub(crate) fn before_resolve(&self) -> FrameResult<()> {
        for capability in &self.capabilities {
            capability.before_resolve(self)?;
        }
        Ok(())
    }

    pub(crate) fn after_resolve(&self, rows: usize) -> FrameResult<()> {
        for capability in &self.capabilities {
            capability.after_resolve(self, rows)?;
        }
        Ok(())
    }

    fn resolve_table(&self) -> FrameResult<Table> {
        self.before_resolve()?;
        let documents = self.find_documents()?;
        let table = Table::from_documents(&documents, &self.known_columns());
        self.after_resolve(table.len())?;
        Ok(table)
    }

    fn find_options(&self, sample: Option<&Document>) -> FindOptions {
        let index_fields = sample.map(|d| restore_index_order(d.keys())).unwrap_or_default();
        let stamped = sample.is_some_and(|d| d.contains_key(ROW_ID));

        let mut projection = self.known_columns();
        projection.extend(index_fields);
        if stamped {
            projection.push(ROW_ID.to_string());
        }

        let mut options = FindOptions::new().projection(projection);
        match &self.state.sort {
            Some(sort) => options = options.sort(sort.clone()),
            // chunked writes land out of order; the stamp restores it unless
            // a near predicate already orders by distance
            None if stamped && self.view.query().near_query().is_none() => {
                options = options.sort(SortSpec::by(ROW_ID, SortOrder::Ascending))
            }
            None => {}
        }
        if let Some(skip) = self.state.skip {
            options = options.skip(skip);
        }
        if let Some(limit) = self.state.limit {
            options = options.limit(limit);
        }
        options
    }

    fn find_documents(&self) -> FrameResult<Vec<Document>> {
        let sample = self.sample()?;
        let options = self.find_options(sample.as_ref());
        self.view.find(&Filter::All, &options)?.collect_documents()
    }

    /// Describes the query this frame sends. With `explain` the store is
    /// asked how many documents match and which indexes exist.
    pub fn inspect(&self, explain: bool) -> FrameResult<Inspection> {
        let explain = if explain {
            let mut details = Document::new();
            details.put("matched", self.view.count(&Filter::All)?);
            details.put(
                "indexes",
                self.view
                    .list_indexes()?
                    .iter()
                    .map(|i| i.name().to_string())
                    .collect::<Vec<_>>(),
            );
            details.put("near", self.view.query().near_query().is_some());
            Some(details)
        } else {
            None
        };
        Ok(Inspection {
            collection: self.name(),
            projection: self.known_columns(),
            query: self.view.query().to_document(),
            sort: self.state.sort.clone(),
            skip: self.state.skip,
            limit: self.state.limit,
            explain,
        })
    }

    /// Creates an index from signed column specs, see [make_index].
    pub fn create_index<S: AsRef<str>>(&self, specs: &[S], unique: bool) -> FrameResult<String> {
        let index = make_index(specs)?.unique(unique);
        self.view.create_index(&index)
    }

    pub fn list_indexes(&self) -> FrameResult<Vec<IndexDefinition>> {
        self.view.list_indexes()
    }

    /// Groups by `keys`; output is sorted by key unless disabled on the grouper.
    pub fn groupby<S: AsRef<str>>(&self, keys: &[S]) -> Grouper {
        Grouper::new(self.clone(), keys).sorted(self.config.group_sort())
    }

    /// One statistic over every data column, as a one-row table of
    /// `{column}_{stat}` fields.
    pub fn stat(&self, stat: Stat) -> FrameResult<Table> {
        Grouper::new(self.clone(), &[] as &[&str]).sorted(false).stat(stat)
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

    /// Label based access.
    pub fn loc(&self) -> LocIndexer<'_> {
        LocIndexer::new(self, false)
    }

    /// Position based access over the row-sequence stamp.
    pub fn iloc(&self) -> LocIndexer<'_> {
        LocIndexer::new(self, true)
    }

    /// Copies every row of `other` into this frame's collection.
    ///
    /// Copied rows get fresh identities and their row-sequence stamps
    /// continue after the highest stamp of this frame's collection.
    pub fn append(&self, other: &Frame) -> FrameResult<Frame> {
        let offset = next_row_stamp(self.view.base())? as i64;
        let documents = other
            .view
            .find(&Filter::All, &FindOptions::new())?
            .map(|doc| {
                doc.map(|mut doc| {
                    doc.remove(DOC_ID);
                    if let Some(row) = doc.get(ROW_ID).and_then(|v| v.as_i64()) {
                        doc.put(ROW_ID, row + offset);
                    }
                    doc
                })
            })
            .collect::<FrameResult<Vec<Document>>>()?;
        let appended = self.view.base().insert_many(documents)?;
        log::info!("Appended {} row(s) from {} to {}", appended, other.name(), self.name());
        Ok(self.refine((*self.state).clone()))
    }

    /// Records a chunked transform; it runs on [persist](Frame::persist) or
    /// [value](Frame::value).
    pub fn transform(&self, func: TransformFn, options: TransformOptions) -> FrameResult<Frame> {
        transform::prepare(self, func, options)
    }

    pub fn has_pending_transform(&self) -> bool {
        self.transform.is_some()
    }

    /// Runs the pending transform, or stores the frame as a dataset.
    pub fn persist(&self, options: PersistOptions) -> FrameResult<Persisted> {
        transform::persist(self, options)
    }

    fn run_pending(&self) -> FrameResult<Frame> {
        match transform::persist(self, PersistOptions::new())? {
            Persisted::Frame(frame) => Ok(frame),
            Persisted::Dataset(meta) => {
                log::error!("Transform without a store returned dataset {}", meta.name);
                Err(FrameError::new(
                    "Transform without a store returned a dataset",
                    ErrorKind::InternalError,
                ))
            }
        }
    }
}

impl Debug for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("collection", &self.name())
            .field("query", &self.view.query().to_document())
            .field("columns", &self.state.columns)
            .field("sort", &self.state.sort)
            .field("skip", &self.state.skip)
            .field("limit", &self.state.limit)
            .field("pending_transform", &self.transform.is_some())
            .finish()
    }
}

/// Data columns of the first stored document.
fn data_columns(collection: &Collection) -> FrameResult<Vec<String>> {
    Ok(collection
        .find_one(&Filter::All)?
        .map(|doc| {
            doc.keys()
                .filter(|k| !is_reserved_column(k))
                .cloned()
                .collect()
        })
        .unwrap_or_default())
}

pub(crate) fn unknown_column(column: &str, known: &[String]) -> FrameError {
    log::error!("Unknown column {}, frame has {:?}", column, known);
    FrameError::new(
        &format!("Unknown column '{}', known columns are {:?}", column, known),
        ErrorKind::UnknownColumn,
    )
}
