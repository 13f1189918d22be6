use crate::common::{Document, Value};
use crate::doc;
use crate::errors::FrameResult;
use crate::filter::NearQuery;
use regex::Regex;
use std::fmt::{Debug, Display, Formatter};

/// A compiled regular expression that compares by its source text.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> FrameResult<Pattern> {
        let regex = Regex::new(source)?;
        Ok(Pattern {
            source: source.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Debug for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/", self.source)
    }
}

/// Comparison applied to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    Regex(Pattern),
    Near(NearQuery),
}

impl Operator {
    fn native_name(&self) -> &'static str {
        match self {
            Operator::Eq(_) => "$eq",
            Operator::Ne(_) => "$ne",
            Operator::Gt(_) => "$gt",
            Operator::Gte(_) => "$gte",
            Operator::Lt(_) => "$lt",
            Operator::Lte(_) => "$lte",
            Operator::In(_) => "$in",
            Operator::Nin(_) => "$nin",
            Operator::Exists(_) => "$exists",
            Operator::Regex(_) => "$regex",
            Operator::Near(_) => "$near",
        }
    }

    fn native_operand(&self) -> Value {
        match self {
            Operator::Eq(v)
            | Operator::Ne(v)
            | Operator::Gt(v)
            | Operator::Gte(v)
            | Operator::Lt(v)
            | Operator::Lte(v) => v.clone(),
            Operator::In(values) | Operator::Nin(values) => Value::Array(values.clone()),
            Operator::Exists(flag) => Value::Bool(*flag),
            Operator::Regex(pattern) => Value::from(pattern.source()),
            Operator::Near(near) => Value::Document(near.to_document()),
        }
    }
}

/// Immutable predicate tree produced by the query translator.
///
/// `Filter::All` matches every document and is the identity of [Filter::and].
/// Conjunctions are flattened as they are built, so combining the base filter
/// of a view with a caller filter never nests deeper than needed.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    #[default]
    All,
    Field { field: String, op: Operator },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn all() -> Filter {
        Filter::All
    }

    pub fn field(field: &str, op: Operator) -> Filter {
        Filter::Field {
            field: field.to_string(),
            op,
        }
    }

    pub fn eq<V: Into<Value>>(field: &str, value: V) -> Filter {
        Filter::field(field, Operator::Eq(value.into()))
    }

    pub fn gte<V: Into<Value>>(field: &str, value: V) -> Filter {
        Filter::field(field, Operator::Gte(value.into()))
    }

    pub fn lte<V: Into<Value>>(field: &str, value: V) -> Filter {
        Filter::field(field, Operator::Lte(value.into()))
    }

    pub fn is_in(field: &str, values: Vec<Value>) -> Filter {
        Filter::field(field, Operator::In(values))
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Filter::All)
    }

    /// Logical AND; `All` on either side yields the other side.
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::All, other) => other,
            (this, Filter::All) => this,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), other) => {
                left.push(other);
                Filter::And(left)
            }
            (this, Filter::And(right)) => {
                let mut all = vec![this];
                all.extend(right);
                Filter::And(all)
            }
            (this, other) => Filter::And(vec![this, other]),
        }
    }

    /// Logical OR; `All` on either side matches everything.
    pub fn or(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::All, _) | (_, Filter::All) => Filter::All,
            (Filter::Or(mut left), Filter::Or(right)) => {
                left.extend(right);
                Filter::Or(left)
            }
            (Filter::Or(mut left), other) => {
                left.push(other);
                Filter::Or(left)
            }
            (this, other) => Filter::Or(vec![this, other]),
        }
    }

    pub fn negate(self) -> Filter {
        match self {
            Filter::Not(inner) => *inner,
            other => Filter::Not(Box::new(other)),
        }
    }

    /// The geo predicate that decides result order, if any.
    ///
    /// Only a `near` at the top level or inside the top-level conjunction
    /// orders results; one nested under OR/NOT is a plain predicate.
    pub fn near_query(&self) -> Option<(&str, &NearQuery)> {
        match self {
            Filter::Field {
                field,
                op: Operator::Near(near),
            } => Some((field.as_str(), near)),
            Filter::And(filters) => filters.iter().find_map(|f| f.near_query()),
            _ => None,
        }
    }

    /// Renders the filter in the store's native query syntax.
    pub fn to_document(&self) -> Document {
        match self {
            Filter::All => Document::new(),
            Filter::Field { field, op } => {
                let mut doc = Document::new();
                match op {
                    Operator::Eq(value) if !value.is_document() => {
                        doc.put(field, value.clone());
                    }
                    other => {
                        let mut operand = Document::new();
                        operand.put(other.native_name(), other.native_operand());
                        doc.put(field, operand);
                    }
                }
                doc
            }
            Filter::And(filters) => doc! { "$and": (render_all(filters)) },
            Filter::Or(filters) => doc! { "$or": (render_all(filters)) },
            Filter::Not(inner) => doc! { "$nor": [(inner.to_document())] },
        }
    }
}

fn render_all(filters: &[Filter]) -> Value {
    Value::Array(
        filters
            .iter()
            .map(|f| Value::Document(f.to_document()))
            .collect(),
    )
}

impl Display for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_document())
    }
}
