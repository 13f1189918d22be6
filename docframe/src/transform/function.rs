use crate::errors::FrameResult;
use crate::frame::{Column, Frame, Table};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// The rows handed to a transform function.
///
/// With worker-side resolution the chunk holds a resolved table; otherwise
/// it holds the lazy chunk frame and the function resolves what it needs.
#[derive(Debug, Clone)]
pub enum Chunk {
    Table(Table),
    Frame(Frame),
}

impl Chunk {
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Chunk::Table(table) => Some(table),
            Chunk::Frame(_) => None,
        }
    }

    /// The resolved table, for in-place edits.
    pub fn as_table_mut(&mut self) -> Option<&mut Table> {
        match self {
            Chunk::Table(table) => Some(table),
            Chunk::Frame(_) => None,
        }
    }

    pub fn as_frame(&self) -> Option<&Frame> {
        match self {
            Chunk::Frame(frame) => Some(frame),
            Chunk::Table(_) => None,
        }
    }

    /// The chunk's rows, resolving a lazy chunk.
    pub fn into_table(self) -> FrameResult<Table> {
        match self {
            Chunk::Table(table) => Ok(table),
            Chunk::Frame(frame) => frame.table(),
        }
    }
}

/// What a transform function returns for a chunk.
#[derive(Debug, Clone)]
pub enum ChunkResult {
    Table(Table),
    /// Stored as a one-column table named after the column.
    Column(Column),
}

impl ChunkResult {
    pub fn into_table(self) -> Table {
        match self {
            ChunkResult::Table(table) => table,
            ChunkResult::Column(column) => column.into_table(),
        }
    }
}

impl From<Table> for ChunkResult {
    fn from(table: Table) -> Self {
        ChunkResult::Table(table)
    }
}

impl From<Column> for ChunkResult {
    fn from(column: Column) -> Self {
        ChunkResult::Column(column)
    }
}

type ChunkFn = dyn Fn(&mut Chunk, usize) -> anyhow::Result<Option<ChunkResult>> + Send + Sync;

/// A user function applied to every chunk of a transform.
///
/// Returning `Ok(None)` keeps the chunk, including any in-place edits made
/// through [Chunk::as_table_mut]. An error aborts the whole transform.
///
/// ```rust,ignore
/// let double = TransformFn::new(|chunk| {
///     if let Some(table) = chunk.as_table_mut() {
///         let doubled = table.column("x").map(|c| c.values().iter().map(double).collect());
///         table.set_column("y", doubled.unwrap_or_default())?;
///     }
///     Ok(None)
/// });
/// ```
#[derive(Clone)]
pub struct TransformFn {
    inner: Arc<ChunkFn>,
}

impl TransformFn {
    pub fn new<F>(func: F) -> TransformFn
    where
        F: Fn(&mut Chunk) -> anyhow::Result<Option<ChunkResult>> + Send + Sync + 'static,
    {
        TransformFn {
            inner: Arc::new(move |chunk: &mut Chunk, _index: usize| func(chunk)),
        }
    }

    /// A function that also receives the chunk index.
    pub fn with_index<F>(func: F) -> TransformFn
    where
        F: Fn(&mut Chunk, usize) -> anyhow::Result<Option<ChunkResult>> + Send + Sync + 'static,
    {
        TransformFn {
            inner: Arc::new(func),
        }
    }

    /// Keeps every chunk unchanged; copies the frame in chunks.
    pub fn identity() -> TransformFn {
        TransformFn::new(|_| Ok(None))
    }

    pub(crate) fn call(&self, chunk: &mut Chunk, index: usize) -> anyhow::Result<Option<ChunkResult>> {
        (self.inner)(chunk, index)
    }
}

impl Debug for TransformFn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransformFn")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::val;

    #[test]
    fn index_is_passed_through() {
        let func = TransformFn::with_index(|chunk, index| {
            let table = chunk.as_table_mut().ok_or_else(|| anyhow::anyhow!("lazy chunk"))?;
            let rows = table.len();
            table.set_column("chunk", vec![val!(index); rows])?;
            Ok(None)
        });
        let mut chunk = Chunk::Table(Table::from_rows(&["x"], vec![vec![val!(1)]]).unwrap());
        assert!(func.call(&mut chunk, 4).unwrap().is_none());
        assert_eq!(chunk.as_table().unwrap().get(0, "chunk"), Some(&val!(4)));
    }

    #[test]
    fn column_result_becomes_table() {
        let func = TransformFn::new(|_| Ok(Some(Column::new("y", vec![val!(2)]).into())));
        let mut chunk = Chunk::Table(Table::new(&["x"]));
        let table = func.call(&mut chunk, 0).unwrap().unwrap().into_table();
        assert_eq!(table.columns(), &["y"]);
    }

    #[test]
    fn errors_surface() {
        let func = TransformFn::new(|_| Err(anyhow::anyhow!("bad chunk")));
        let mut chunk = Chunk::Table(Table::new(&["x"]));
        assert_eq!(func.call(&mut chunk, 0).unwrap_err().to_string(), "bad chunk");
    }
}
