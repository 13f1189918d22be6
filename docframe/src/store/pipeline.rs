use crate::common::{Document, SortSpec, Value};
use crate::doc;
use crate::filter::Filter;
use std::fmt::{Display, Formatter};

/// Input of an accumulator: a field path or a constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(String),
    Literal(Value),
}

impl Operand {
    pub fn field(path: &str) -> Operand {
        Operand::Field(path.to_string())
    }

    fn to_value(&self) -> Value {
        match self {
            Operand::Field(path) => Value::from(format!("${}", path)),
            Operand::Literal(value) => value.clone(),
        }
    }
}

/// Per-group reduction used by a [Stage::Group].
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Sum(Operand),
    Avg(Operand),
    Min(Operand),
    Max(Operand),
    StdDevSamp(Operand),
    StdDevPop(Operand),
    /// Number of non-null values.
    Count(Operand),
    First(Operand),
    Last(Operand),
}

impl Accumulator {
    pub fn operand(&self) -> &Operand {
        match self {
            Accumulator::Sum(o)
            | Accumulator::Avg(o)
            | Accumulator::Min(o)
            | Accumulator::Max(o)
            | Accumulator::StdDevSamp(o)
            | Accumulator::StdDevPop(o)
            | Accumulator::Count(o)
            | Accumulator::First(o)
            | Accumulator::Last(o) => o,
        }
    }

    fn to_document(&self) -> Document {
        let operand = self.operand().to_value();
        match self {
            Accumulator::Sum(_) => doc! { "$sum": operand },
            Accumulator::Avg(_) => doc! { "$avg": operand },
            Accumulator::Min(_) => doc! { "$min": operand },
            Accumulator::Max(_) => doc! { "$max": operand },
            Accumulator::StdDevSamp(_) => doc! { "$stdDevSamp": operand },
            Accumulator::StdDevPop(_) => doc! { "$stdDevPop": operand },
            Accumulator::Count(_) => doc! {
                "$sum": { "$cond": [{ "$ifNull": [operand, false] }, 1, 0] }
            },
            Accumulator::First(_) => doc! { "$first": operand },
            Accumulator::Last(_) => doc! { "$last": operand },
        }
    }
}

/// `$group`: one output document per distinct key combination.
///
/// The output `_id` is a document `{key: value, ..}`, or null when there
/// are no keys and the whole input forms a single group.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupSpec {
    pub keys: Vec<String>,
    pub accumulators: Vec<(String, Accumulator)>,
}

/// `$lookup`: embeds matching documents of another collection as an array.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupSpec {
    pub from: String,
    pub local_field: String,
    pub foreign_field: String,
    pub as_field: String,
}

/// `$unwind`: one output document per array element.
#[derive(Debug, Clone, PartialEq)]
pub struct UnwindSpec {
    pub path: String,
    pub include_array_index: Option<String>,
    pub preserve_null_and_empty: bool,
}

/// One output field of a `$project` stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectField {
    Include,
    Exclude,
    /// Copy from another (possibly nested) path.
    Path(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Group(GroupSpec),
    Sort(SortSpec),
    Skip(usize),
    Limit(usize),
    Lookup(LookupSpec),
    Unwind(UnwindSpec),
    Project(Vec<(String, ProjectField)>),
    /// Replaces the named sibling collection with the pipeline output.
    Out(String),
}

impl Stage {
    pub fn to_document(&self) -> Document {
        match self {
            Stage::Match(filter) => doc! { "$match": (filter.to_document()) },
            Stage::Group(group) => {
                let id = if group.keys.is_empty() {
                    Value::Null
                } else {
                    Value::Document(
                        group
                            .keys
                            .iter()
                            .map(|k| (k.clone(), Value::from(format!("${}", k))))
                            .collect(),
                    )
                };
                let mut spec = doc! { "_id": id };
                for (name, acc) in &group.accumulators {
                    spec.put(name, acc.to_document());
                }
                doc! { "$group": spec }
            }
            Stage::Sort(sort) => {
                let spec: Document = sort
                    .keys()
                    .iter()
                    .map(|(k, o)| (k.clone(), Value::from(o.direction())))
                    .collect();
                doc! { "$sort": spec }
            }
            Stage::Skip(n) => doc! { "$skip": (*n) },
            Stage::Limit(n) => doc! { "$limit": (*n) },
            Stage::Lookup(lookup) => doc! {
                "$lookup": {
                    from: (lookup.from.as_str()),
                    localField: (lookup.local_field.as_str()),
                    foreignField: (lookup.foreign_field.as_str()),
                    "as": (lookup.as_field.as_str()),
                }
            },
            Stage::Unwind(unwind) => {
                let mut spec = doc! {
                    path: (format!("${}", unwind.path)),
                    preserveNullAndEmptyArrays: (unwind.preserve_null_and_empty),
                };
                if let Some(index) = &unwind.include_array_index {
                    spec.put("includeArrayIndex", index.as_str());
                }
                doc! { "$unwind": spec }
            }
            Stage::Project(fields) => {
                let spec: Document = fields
                    .iter()
                    .map(|(name, field)| {
                        let value = match field {
                            ProjectField::Include => Value::from(1),
                            ProjectField::Exclude => Value::from(0),
                            ProjectField::Path(path) => Value::from(format!("${}", path)),
                        };
                        (name.clone(), value)
                    })
                    .collect();
                doc! { "$project": spec }
            }
            Stage::Out(name) => doc! { "$out": (name.as_str()) },
        }
    }
}

/// Ordered list of aggregation stages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Pipeline {
        Pipeline { stages: Vec::new() }
    }

    pub fn stage(mut self, stage: Stage) -> Pipeline {
        self.stages.push(stage);
        self
    }

    pub fn push(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    /// Inserts a stage in front of all others.
    pub fn prepend(&mut self, stage: Stage) {
        self.stages.insert(0, stage);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Target of a trailing `$out` stage.
    pub fn output_collection(&self) -> Option<&str> {
        match self.stages.last() {
            Some(Stage::Out(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn to_documents(&self) -> Vec<Document> {
        self.stages.iter().map(|s| s.to_document()).collect()
    }
}

impl From<Vec<Stage>> for Pipeline {
    fn from(stages: Vec<Stage>) -> Self {
        Pipeline { stages }
    }
}

impl Display for Pipeline {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.to_documents().iter().map(|d| d.to_string()).collect();
        write!(f, "[{}]", rendered.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SortOrder;

    #[test]
    fn group_renders_key_document() {
        let stage = Stage::Group(GroupSpec {
            keys: vec!["x".to_string()],
            accumulators: vec![("y_sum".to_string(), Accumulator::Sum(Operand::field("y")))],
        });
        assert_eq!(
            stage.to_document().to_string(),
            "{\"$group\": {\"_id\": {\"x\": \"$x\"}, \"y_sum\": {\"$sum\": \"$y\"}}}"
        );
    }

    #[test]
    fn group_without_keys_uses_null_id() {
        let stage = Stage::Group(GroupSpec::default());
        assert_eq!(stage.to_document().to_string(), "{\"$group\": {\"_id\": null}}");
    }

    #[test]
    fn prepend_puts_stage_first() {
        let mut pipeline = Pipeline::new()
            .stage(Stage::Sort(SortSpec::by("x", SortOrder::Ascending)))
            .stage(Stage::Out("target".to_string()));
        pipeline.prepend(Stage::Match(Filter::eq("x", 1)));
        assert!(matches!(pipeline.stages()[0], Stage::Match(_)));
        assert_eq!(pipeline.output_collection(), Some("target"));
        assert_eq!(pipeline.len(), 3);
    }

    #[test]
    fn unwind_and_lookup_render() {
        let lookup = Stage::Lookup(LookupSpec {
            from: "right".to_string(),
            local_field: "k".to_string(),
            foreign_field: "k".to_string(),
            as_field: "right_k".to_string(),
        });
        let rendered = lookup.to_document().to_string();
        assert!(rendered.contains("\"localField\": \"k\""));
        let unwind = Stage::Unwind(UnwindSpec {
            path: "right_k".to_string(),
            include_array_index: Some("_index__right_k".to_string()),
            preserve_null_and_empty: true,
        });
        let rendered = unwind.to_document().to_string();
        assert!(rendered.contains("\"path\": \"$right_k\""));
        assert!(rendered.contains("includeArrayIndex"));
    }
}
