use crate::common::Value;
use crate::errors::{ErrorKind, FrameError, FrameResult};
use crate::filter::{Filter, NearQuery, Operator, Pattern};
use std::ops::{BitAnd, BitOr, Not};

/// Comparison suffixes understood after a `__` separator.
pub const SUFFIXES: &[&str] = &[
    "eq",
    "ne",
    "gt",
    "gte",
    "lt",
    "lte",
    "in",
    "nin",
    "exists",
    "isnull",
    "regex",
    "contains",
    "startswith",
    "endswith",
    "near",
];

/// Translates keyword pairs into a conjunctive [Filter].
///
/// Each key is `column` or `column__suffix`. Nested columns use dots
/// (`location.city__eq`). An empty pair list translates to [Filter::All].
pub fn translate<K: AsRef<str>>(pairs: &[(K, Value)]) -> FrameResult<Filter> {
    let mut filter = Filter::All;
    for (key, value) in pairs {
        filter = filter.and(translate_pair(key.as_ref(), value)?);
    }
    log::debug!("Translated {} keyword(s) into {}", pairs.len(), filter);
    Ok(filter)
}

fn split_key(key: &str) -> FrameResult<(&str, &str)> {
    let (field, suffix) = match key.rsplit_once("__") {
        Some((field, suffix)) => (field, suffix),
        None => (key, "eq"),
    };
    if !SUFFIXES.contains(&suffix) {
        return Err(invalid(&format!("Unknown filter suffix '{}' in '{}'", suffix, key)));
    }
    if field.is_empty() {
        return Err(invalid(&format!("Missing column name in filter '{}'", key)));
    }
    Ok((field, suffix))
}

fn translate_pair(key: &str, value: &Value) -> FrameResult<Filter> {
    let (field, suffix) = split_key(key)?;
    let op = match suffix {
        "eq" => Operator::Eq(value.clone()),
        "ne" => Operator::Ne(value.clone()),
        "gt" => Operator::Gt(value.clone()),
        "gte" => Operator::Gte(value.clone()),
        "lt" => Operator::Lt(value.clone()),
        "lte" => Operator::Lte(value.clone()),
        "in" => Operator::In(expect_list(key, value)?),
        "nin" => Operator::Nin(expect_list(key, value)?),
        "exists" => Operator::Exists(expect_bool(key, value)?),
        "isnull" => {
            if expect_bool(key, value)? {
                Operator::Eq(Value::Null)
            } else {
                Operator::Ne(Value::Null)
            }
        }
        "regex" => Operator::Regex(Pattern::new(expect_str(key, value)?)?),
        "contains" => {
            let text = regex::escape(expect_str(key, value)?);
            Operator::Regex(Pattern::new(&text)?)
        }
        "startswith" => {
            let text = regex::escape(expect_str(key, value)?);
            Operator::Regex(Pattern::new(&format!("^{}", text))?)
        }
        "endswith" => {
            let text = regex::escape(expect_str(key, value)?);
            Operator::Regex(Pattern::new(&format!("{}$", text))?)
        }
        "near" => Operator::Near(NearQuery::parse(value)?),
        other => return Err(invalid(&format!("Unknown filter suffix '{}'", other))),
    };
    Ok(Filter::field(field, op))
}

fn invalid(message: &str) -> FrameError {
    log::error!("{}", message);
    FrameError::new(message, ErrorKind::InvalidFilter)
}

fn expect_list(key: &str, value: &Value) -> FrameResult<Vec<Value>> {
    match value {
        Value::Array(values) => Ok(values.clone()),
        other => Err(invalid(&format!("Filter '{}' expects a list, got {}", key, other))),
    }
}

fn expect_bool(key: &str, value: &Value) -> FrameResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| invalid(&format!("Filter '{}' expects true or false, got {}", key, value)))
}

fn expect_str<'a>(key: &str, value: &'a Value) -> FrameResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| invalid(&format!("Filter '{}' expects a string, got {}", key, value)))
}

/// Keyword filter with logical combinators.
///
/// Terms inside one `Q` are AND-ed. `Q`s combine with `&`, `|` and `!`;
/// nothing is validated until [Q::translate] runs.
///
/// ```rust
/// use docframe::q;
///
/// let q = q!(x__gt = 5, kind = "a") | q!(y__in = vec![1, 2]);
/// assert!(q.translate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub enum Q {
    Terms(Vec<(String, Value)>),
    Filter(Filter),
    And(Box<Q>, Box<Q>),
    Or(Box<Q>, Box<Q>),
    Not(Box<Q>),
}

impl Q {
    /// An empty `Q` that matches everything.
    pub fn new() -> Q {
        Q::Terms(Vec::new())
    }

    pub fn kw<V: Into<Value>>(key: &str, value: V) -> Q {
        Q::Terms(vec![(key.to_string(), value.into())])
    }

    pub fn from_pairs<K: Into<String>>(pairs: Vec<(K, Value)>) -> Q {
        Q::Terms(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Adds another AND-ed keyword term.
    pub fn and_kw<V: Into<Value>>(self, key: &str, value: V) -> Q {
        match self {
            Q::Terms(mut terms) => {
                terms.push((key.to_string(), value.into()));
                Q::Terms(terms)
            }
            other => Q::And(Box::new(other), Box::new(Q::kw(key, value))),
        }
    }

    pub fn translate(&self) -> FrameResult<Filter> {
        match self {
            Q::Terms(terms) => translate(terms),
            Q::Filter(filter) => Ok(filter.clone()),
            Q::And(left, right) => Ok(left.translate()?.and(right.translate()?)),
            Q::Or(left, right) => Ok(left.translate()?.or(right.translate()?)),
            Q::Not(inner) => Ok(inner.translate()?.negate()),
        }
    }
}

impl Default for Q {
    fn default() -> Self {
        Q::new()
    }
}

impl From<Filter> for Q {
    fn from(filter: Filter) -> Self {
        Q::Filter(filter)
    }
}

impl<K: Into<String>> From<Vec<(K, Value)>> for Q {
    fn from(pairs: Vec<(K, Value)>) -> Self {
        Q::from_pairs(pairs)
    }
}

impl BitAnd for Q {
    type Output = Q;

    fn bitand(self, rhs: Q) -> Q {
        Q::And(Box::new(self), Box::new(rhs))
    }
}

impl BitOr for Q {
    type Output = Q;

    fn bitor(self, rhs: Q) -> Q {
        Q::Or(Box::new(self), Box::new(rhs))
    }
}

impl Not for Q {
    type Output = Q;

    fn not(self) -> Q {
        Q::Not(Box::new(self))
    }
}

/// Builds a [Q] from `key = value` keyword terms.
///
/// ```rust
/// use docframe::q;
///
/// let q = q!(x = 0, y__gte = 2.5, "location.city__startswith" = "Z");
/// ```
#[macro_export]
macro_rules! q {
    () => {
        $crate::filter::Q::new()
    };
    ($($key:tt = $value:expr),+ $(,)?) => {
        $crate::filter::Q::from_pairs(vec![
            $(($crate::common::normalize(stringify!($key)), $crate::common::Value::from($value))),+
        ])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, q, val};

    #[test]
    fn bare_column_means_equality() {
        let f = q!(x = 0).translate().unwrap();
        assert_eq!(f, Filter::eq("x", 0));
    }

    #[test]
    fn multiple_terms_are_anded() {
        let f = q!(x = 1, y__gt = 2).translate().unwrap();
        assert_eq!(
            f,
            Filter::And(vec![
                Filter::eq("x", 1),
                Filter::field("y", Operator::Gt(val!(2))),
            ])
        );
    }

    #[test]
    fn unknown_suffix_is_invalid_filter() {
        let err = q!(x__between = 3).translate().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidFilter);
    }

    #[test]
    fn missing_column_is_invalid_filter() {
        let err = q!("__gt" = 3).translate().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidFilter);
    }

    #[test]
    fn in_requires_list() {
        assert!(q!(x__in = vec![1, 2]).translate().is_ok());
        let err = q!(x__in = 1).translate().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidFilter);
    }

    #[test]
    fn isnull_maps_to_null_equality() {
        assert_eq!(
            q!(x__isnull = true).translate().unwrap(),
            Filter::eq("x", Value::Null)
        );
        assert_eq!(
            q!(x__isnull = false).translate().unwrap(),
            Filter::field("x", Operator::Ne(Value::Null))
        );
    }

    #[test]
    fn string_helpers_escape_input() {
        let f = q!(name__contains = "a.b").translate().unwrap();
        match f {
            Filter::Field { op: Operator::Regex(p), .. } => {
                assert!(p.is_match("xa.by"));
                assert!(!p.is_match("axb"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn near_with_bounds_renders_native() {
        let spec = doc! { location: [8.54, 47.37], maxd: 1 };
        let f = q!(location__near = spec).translate().unwrap();
        let rendered = f.to_string();
        assert!(rendered.contains("$near"));
        assert!(rendered.contains("$maxDistance"));
    }

    #[test]
    fn near_without_coordinates_fails() {
        let err = q!(location__near = doc! { maxd: 1 }).translate().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidFilter);
    }

    #[test]
    fn combinators() {
        let f = (q!(x = 1) | q!(x = 2)).translate().unwrap();
        assert_eq!(f, Filter::Or(vec![Filter::eq("x", 1), Filter::eq("x", 2)]));
        let f = (!q!(x = 1) & q!(y = 2)).translate().unwrap();
        assert_eq!(
            f,
            Filter::And(vec![Filter::eq("x", 1).negate(), Filter::eq("y", 2)])
        );
    }

    #[test]
    fn empty_q_matches_all() {
        assert!(Q::new().translate().unwrap().is_all());
    }

    #[test]
    fn and_kw_extends_terms() {
        let f = Q::kw("x", 1).and_kw("y__lte", 4).translate().unwrap();
        assert_eq!(
            f,
            Filter::And(vec![Filter::eq("x", 1), Filter::lte("y", 4)])
        );
    }
}
