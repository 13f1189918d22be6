use crate::common::SortSpec;
use im::Vector;

/// Immutable query state of a frame.
///
/// Refining a frame builds a new record from the old one; the persistent
/// vectors share their storage, so the copy stays cheap for wide frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FrameState {
    pub(crate) columns: Vector<String>,
    /// Columns the resolved table always has, filled with null when absent.
    pub(crate) force_columns: Vector<String>,
    pub(crate) sort: Option<SortSpec>,
    pub(crate) skip: Option<usize>,
    pub(crate) limit: Option<usize>,
    pub(crate) from_indexer: bool,
    pub(crate) from_range: bool,
}

impl FrameState {
    pub(crate) fn new(columns: Vec<String>) -> FrameState {
        FrameState {
            columns: dedup(columns),
            ..FrameState::default()
        }
    }

    pub(crate) fn with_columns(&self, columns: Vec<String>) -> FrameState {
        FrameState {
            columns: dedup(columns),
            ..self.clone()
        }
    }

    pub(crate) fn with_force_columns(&self, columns: Vec<String>) -> FrameState {
        FrameState {
            force_columns: dedup(columns),
            ..self.clone()
        }
    }

    pub(crate) fn with_sort(&self, sort: SortSpec) -> FrameState {
        FrameState {
            sort: if sort.is_empty() { None } else { Some(sort) },
            ..self.clone()
        }
    }

    pub(crate) fn with_skip(&self, skip: usize) -> FrameState {
        FrameState {
            skip: Some(skip),
            ..self.clone()
        }
    }

    pub(crate) fn with_limit(&self, limit: usize) -> FrameState {
        FrameState {
            limit: Some(limit),
            ..self.clone()
        }
    }

    pub(crate) fn from_indexer(&self, from_range: bool) -> FrameState {
        FrameState {
            from_indexer: true,
            from_range,
            ..self.clone()
        }
    }

    /// Requested columns followed by forced columns not already requested.
    pub(crate) fn output_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self.columns.iter().cloned().collect();
        for forced in self.force_columns.iter() {
            if !columns.contains(forced) {
                columns.push(forced.clone());
            }
        }
        columns
    }
}

fn dedup(columns: Vec<String>) -> Vector<String> {
    let mut unique = Vector::new();
    for column in columns {
        if !unique.contains(&column) {
            unique.push_back(column);
        }
    }
    unique
}
