use super::collection::{order_by_distance, sort_documents};
use super::database::InMemoryDatabase;
use crate::common::{Document, Value, DOC_ID};
use crate::errors::FrameResult;
use crate::filter::matches;
use crate::store::{
    Accumulator, CollectionProvider, GroupSpec, LookupSpec, Operand, Pipeline, ProjectField,
    Stage, UnwindSpec,
};
use indexmap::IndexMap;

/// Runs an aggregation pipeline over a snapshot of documents.
pub(crate) fn run_pipeline(
    input: Vec<Document>,
    pipeline: &Pipeline,
    database: &InMemoryDatabase,
) -> FrameResult<Vec<Document>> {
    let mut documents = input;
    for stage in pipeline.stages() {
        documents = match stage {
            Stage::Match(filter) => {
                let matched = documents.into_iter().filter(|d| matches(filter, d)).collect();
                order_by_distance(filter, matched)
            }
            Stage::Group(group) => run_group(documents, group),
            Stage::Sort(sort) => {
                sort_documents(&mut documents, sort);
                documents
            }
            Stage::Skip(n) => documents.into_iter().skip(*n).collect(),
            Stage::Limit(n) => documents.into_iter().take(*n).collect(),
            Stage::Lookup(lookup) => run_lookup(documents, lookup, database),
            Stage::Unwind(unwind) => run_unwind(documents, unwind),
            Stage::Project(fields) => documents.into_iter().map(|d| run_project(d, fields)).collect(),
            Stage::Out(name) => {
                let target = database.collection(name);
                target.drop_collection()?;
                let written = target.insert_many(documents)?;
                log::debug!("$out wrote {} document(s) to {}", written, name);
                Vec::new()
            }
        };
    }
    Ok(documents)
}

fn operand_value(doc: &Document, operand: &Operand) -> Option<Value> {
    match operand {
        Operand::Field(path) => doc.get_path(path).cloned(),
        Operand::Literal(value) => Some(value.clone()),
    }
}

fn run_group(documents: Vec<Document>, group: &GroupSpec) -> Vec<Document> {
    // first-seen order of keys, like a hash aggregation streaming its input
    let mut groups: IndexMap<Value, Vec<Document>> = IndexMap::new();
    for doc in documents {
        let id = if group.keys.is_empty() {
            Value::Null
        } else {
            Value::Document(
                group
                    .keys
                    .iter()
                    .map(|k| (k.clone(), doc.get_path(k).cloned().unwrap_or_default()))
                    .collect(),
            )
        };
        groups.entry(id).or_default().push(doc);
    }

    groups
        .into_iter()
        .map(|(id, members)| {
            let mut out = Document::with_capacity(group.accumulators.len() + 1);
            out.put(DOC_ID, id);
            for (name, accumulator) in &group.accumulators {
                out.put(name, accumulate(&members, accumulator));
            }
            out
        })
        .collect()
}

fn accumulate(members: &[Document], accumulator: &Accumulator) -> Value {
    let values: Vec<Value> = members
        .iter()
        .filter_map(|doc| operand_value(doc, accumulator.operand()))
        .filter(|v| !v.is_null())
        .collect();
    let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();

    match accumulator {
        Accumulator::Sum(_) => {
            let numeric: Vec<&Value> = values.iter().filter(|v| v.is_number()).collect();
            if numeric.iter().all(|v| matches!(v, Value::I64(_))) {
                Value::I64(numeric.iter().filter_map(|v| v.as_i64()).sum())
            } else {
                Value::F64(numbers.iter().sum())
            }
        }
        Accumulator::Avg(_) => {
            if numbers.is_empty() {
                Value::Null
            } else {
                Value::F64(numbers.iter().sum::<f64>() / numbers.len() as f64)
            }
        }
        Accumulator::Min(_) => values.iter().min().cloned().unwrap_or_default(),
        Accumulator::Max(_) => values.iter().max().cloned().unwrap_or_default(),
        Accumulator::StdDevSamp(_) => std_dev(&numbers, 1),
        Accumulator::StdDevPop(_) => std_dev(&numbers, 0),
        Accumulator::Count(_) => Value::I64(values.len() as i64),
        Accumulator::First(_) => values.first().cloned().unwrap_or_default(),
        Accumulator::Last(_) => values.last().cloned().unwrap_or_default(),
    }
}

fn std_dev(numbers: &[f64], ddof: usize) -> Value {
    if numbers.len() <= ddof {
        return Value::Null;
    }
    let n = numbers.len() as f64;
    let mean = numbers.iter().sum::<f64>() / n;
    let squares: f64 = numbers.iter().map(|x| (x - mean).powi(2)).sum();
    Value::F64((squares / (n - ddof as f64)).sqrt())
}

fn run_lookup(documents: Vec<Document>, lookup: &LookupSpec, database: &InMemoryDatabase) -> Vec<Document> {
    let foreign = database.documents(&lookup.from);
    documents
        .into_iter()
        .map(|mut doc| {
            let local = doc.get_path(&lookup.local_field).cloned().unwrap_or_default();
            let matched: Vec<Value> = foreign
                .iter()
                .filter(|f| {
                    let value = f.get_path(&lookup.foreign_field).cloned().unwrap_or_default();
                    match &local {
                        Value::Array(items) => items.contains(&value),
                        other => *other == value,
                    }
                })
                .cloned()
                .map(Value::Document)
                .collect();
            doc.put(&lookup.as_field, Value::Array(matched));
            doc
        })
        .collect()
}

fn run_unwind(documents: Vec<Document>, unwind: &UnwindSpec) -> Vec<Document> {
    let mut output = Vec::with_capacity(documents.len());
    for doc in documents {
        let items = match doc.get_path(&unwind.path) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other.clone()],
        };

        if items.is_empty() {
            if unwind.preserve_null_and_empty {
                let mut kept = doc;
                if matches!(kept.get(&unwind.path), Some(Value::Array(_))) {
                    kept.remove(&unwind.path);
                }
                if let Some(index_field) = &unwind.include_array_index {
                    kept.put(index_field, Value::Null);
                }
                output.push(kept);
            }
            continue;
        }

        for (position, item) in items.into_iter().enumerate() {
            let mut unwound = doc.clone();
            unwound.put(&unwind.path, item);
            if let Some(index_field) = &unwind.include_array_index {
                unwound.put(index_field, position);
            }
            output.push(unwound);
        }
    }
    output
}

fn run_project(doc: Document, fields: &[(String, ProjectField)]) -> Document {
    let inclusion = fields
        .iter()
        .any(|(_, f)| matches!(f, ProjectField::Include | ProjectField::Path(_)));

    if !inclusion {
        let mut kept = doc;
        for (name, _) in fields {
            kept.remove(name);
        }
        return kept;
    }

    let id_excluded = fields
        .iter()
        .any(|(name, f)| name == DOC_ID && matches!(f, ProjectField::Exclude));
    let mut projected = Document::with_capacity(fields.len() + 1);
    if !id_excluded {
        if let Some(id) = doc.get(DOC_ID) {
            projected.put(DOC_ID, id.clone());
        }
    }
    for (name, field) in fields {
        let source = match field {
            ProjectField::Include => doc.get_path(name),
            ProjectField::Path(path) => doc.get_path(path),
            ProjectField::Exclude => None,
        };
        if let Some(value) = source {
            projected.put(name, value.clone());
        }
    }
    projected
}
