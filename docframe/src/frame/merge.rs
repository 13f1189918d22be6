use crate::common::{SortOrder, SortSpec, DOC_ID};
use crate::errors::{ErrorKind, FrameError, FrameResult};
use crate::frame::Frame;
use crate::store::{LookupSpec, Pipeline, ProjectField, Stage, UnwindSpec};
use std::fmt::{Display, Formatter};

/// Join type of a [merge](Frame::merge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Join {
    /// Every left row, with nulls where the right side has no match.
    #[default]
    Left,
    /// Only left rows with at least one match.
    Inner,
    /// Every right row; runs as a left join with the operands swapped.
    Right,
}

impl Join {
    pub fn parse(how: &str) -> FrameResult<Join> {
        match how {
            "left" => Ok(Join::Left),
            "inner" => Ok(Join::Inner),
            "right" => Ok(Join::Right),
            other => {
                log::error!("Unsupported join type {}", other);
                Err(FrameError::new(
                    &format!("Unsupported join type '{}'", other),
                    ErrorKind::UnsupportedOperation,
                ))
            }
        }
    }
}

impl Display for Join {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Join::Left => write!(f, "left"),
            Join::Inner => write!(f, "inner"),
            Join::Right => write!(f, "right"),
        }
    }
}

/// Options of [Frame::merge].
///
/// ```rust,ignore
/// let merged = orders.merge(&customers, MergeOptions::on("customer").how(Join::Inner))?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    on: Vec<String>,
    left_on: Option<String>,
    right_on: Option<String>,
    how: Join,
    target: Option<String>,
    suffixes: Option<(String, String)>,
    sort: bool,
}

impl MergeOptions {
    pub fn new() -> MergeOptions {
        MergeOptions::default()
    }

    /// Joins on a column both sides share.
    pub fn on(column: &str) -> MergeOptions {
        MergeOptions {
            on: vec![column.to_string()],
            ..MergeOptions::default()
        }
    }

    /// Joins on several shared columns. Only a single key is supported when
    /// the merge runs.
    pub fn on_columns<S: AsRef<str>>(columns: &[S]) -> MergeOptions {
        MergeOptions {
            on: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            ..MergeOptions::default()
        }
    }

    pub fn left_on(mut self, column: &str) -> MergeOptions {
        self.left_on = Some(column.to_string());
        self
    }

    pub fn right_on(mut self, column: &str) -> MergeOptions {
        self.right_on = Some(column.to_string());
        self
    }

    pub fn how(mut self, how: Join) -> MergeOptions {
        self.how = how;
        self
    }

    /// Output collection; a unique temporary name is generated otherwise.
    pub fn target(mut self, name: &str) -> MergeOptions {
        self.target = Some(name.to_string());
        self
    }

    /// Suffixes for colliding left and right columns.
    pub fn suffixes(mut self, left: &str, right: &str) -> MergeOptions {
        self.suffixes = Some((left.to_string(), right.to_string()));
        self
    }

    /// Sorts the output by the join key.
    pub fn sort(mut self, sort: bool) -> MergeOptions {
        self.sort = sort;
        self
    }

    fn keys(&self) -> FrameResult<(String, String)> {
        if self.on.len() > 1 {
            log::error!("Merge on multiple keys {:?}", self.on);
            return Err(FrameError::new(
                "Merging on more than one key column is not supported",
                ErrorKind::UnsupportedOperation,
            ));
        }
        let on = self.on.first();
        match (self.left_on.as_ref().or(on), self.right_on.as_ref().or(on)) {
            (Some(left), Some(right)) => Ok((left.clone(), right.clone())),
            _ => {
                log::error!("Merge without key columns");
                Err(FrameError::new(
                    "Specify on, or both left_on and right_on",
                    ErrorKind::InvalidArgument,
                ))
            }
        }
    }

    fn swapped(&self) -> FrameResult<MergeOptions> {
        let (left, right) = self.keys()?;
        Ok(MergeOptions {
            on: Vec::new(),
            left_on: Some(right),
            right_on: Some(left),
            how: Join::Left,
            ..self.clone()
        })
    }
}

struct MergePlan {
    pipeline: Pipeline,
    target: String,
    columns: Vec<String>,
}

impl Frame {
    /// Joins this frame with `right` into a new collection.
    ///
    /// The result is a frame over the output collection that knows every
    /// expected column, so rows without a match resolve with nulls on the
    /// right-hand columns. The right frame's query is not applied; only its
    /// collection and columns are used.
    ///
    /// # Errors
    ///
    /// * `UnsupportedOperation` for more than one key column
    /// * `InvalidArgument` without keys, or when the target is this frame's
    ///   own collection
    pub fn merge(&self, right: &Frame, options: MergeOptions) -> FrameResult<Frame> {
        if options.how == Join::Right {
            return right.merge(self, options.swapped()?);
        }
        let plan = self.merge_plan(right, &options)?;
        if plan.target == self.name() {
            log::error!("Merge target {} is the source collection", plan.target);
            return Err(FrameError::new(
                "A merge cannot write into its own source collection",
                ErrorKind::InvalidArgument,
            ));
        }

        log::info!(
            "Merging {} with {} ({}) into {}",
            self.name(),
            right.name(),
            options.how,
            plan.target
        );
        log::debug!("Merge pipeline: {}", plan.pipeline);
        // $out leaves nothing to read back
        self.view().aggregate(&plan.pipeline)?.collect_documents()?;

        let output = self.collection().sibling(&plan.target)?;
        Ok(self
            .sibling_frame(output, Some(plan.columns.clone()))?
            .with_force_columns(plan.columns))
    }

    /// The pipeline [merge](Frame::merge) would run, without running it.
    pub fn merge_pipeline(&self, right: &Frame, options: MergeOptions) -> FrameResult<Pipeline> {
        if options.how == Join::Right {
            return right.merge_pipeline(self, options.swapped()?);
        }
        Ok(self
            .view()
            .effective_pipeline(&self.merge_plan(right, &options)?.pipeline))
    }

    fn merge_plan(&self, right: &Frame, options: &MergeOptions) -> FrameResult<MergePlan> {
        let (left_key, right_key) = options.keys()?;
        let (left_suffix, right_suffix) = options
            .suffixes
            .clone()
            .unwrap_or_else(|| self.config().merge_suffixes());
        let target = options.target.clone().unwrap_or_else(|| {
            format!(
                "{}{}",
                self.config().temp_merge_prefix(),
                uuid::Uuid::new_v4().simple()
            )
        });

        let as_field = format!("{}_{}", right.name().replace('.', "_"), right_key);
        let left_columns = self.columns();
        let right_columns = right.columns();

        let mut projection = vec![(DOC_ID.to_string(), ProjectField::Exclude)];
        let mut columns = Vec::with_capacity(left_columns.len() + right_columns.len());
        for column in &left_columns {
            if right_columns.contains(column) && *column != left_key {
                let renamed = format!("{}{}", column, left_suffix);
                projection.push((renamed.clone(), ProjectField::Path(column.clone())));
                columns.push(renamed);
            } else {
                projection.push((column.clone(), ProjectField::Include));
                columns.push(column.clone());
            }
        }
        for column in &right_columns {
            let source = format!("{}.{}", as_field, column);
            if *column == left_key && *column == right_key {
                continue;
            }
            let name = if left_columns.contains(column) {
                format!("{}{}", column, right_suffix)
            } else {
                column.clone()
            };
            projection.push((name.clone(), ProjectField::Path(source)));
            columns.push(name);
        }

        let mut pipeline = Pipeline::new()
            .stage(Stage::Lookup(LookupSpec {
                from: right.name(),
                local_field: left_key.clone(),
                foreign_field: right_key,
                as_field: as_field.clone(),
            }))
            .stage(Stage::Unwind(UnwindSpec {
                path: as_field.clone(),
                include_array_index: Some(format!("_index__{}", as_field)),
                preserve_null_and_empty: options.how != Join::Inner,
            }))
            .stage(Stage::Project(projection));
        if options.sort {
            pipeline.push(Stage::Sort(SortSpec::by(&left_key, SortOrder::Ascending)));
        }
        pipeline.push(Stage::Out(target.clone()));

        Ok(MergePlan {
            pipeline,
            target,
            columns,
        })
    }
}
