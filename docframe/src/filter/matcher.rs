use crate::common::{Document, Value};
use crate::filter::{Filter, Operator};
use std::cmp::Ordering;

/// Evaluates a filter against one document the way a document store does.
///
/// Arrays match when any element matches, ordering comparisons only apply
/// between values of the same type class, and `Eq(Null)` also matches a
/// missing field.
pub fn matches(filter: &Filter, doc: &Document) -> bool {
    match filter {
        Filter::All => true,
        Filter::Field { field, op } => matches_field(doc.get_path(field), op),
        Filter::And(filters) => filters.iter().all(|f| matches(f, doc)),
        Filter::Or(filters) => filters.iter().any(|f| matches(f, doc)),
        Filter::Not(inner) => !matches(inner, doc),
    }
}

fn matches_field(value: Option<&Value>, op: &Operator) -> bool {
    match op {
        Operator::Eq(expected) => equals(value, expected),
        Operator::Ne(expected) => !equals(value, expected),
        Operator::Gt(bound) => compares(value, bound, |o| o == Ordering::Greater),
        Operator::Gte(bound) => compares(value, bound, |o| o != Ordering::Less),
        Operator::Lt(bound) => compares(value, bound, |o| o == Ordering::Less),
        Operator::Lte(bound) => compares(value, bound, |o| o != Ordering::Greater),
        Operator::In(values) => values.iter().any(|v| equals(value, v)),
        Operator::Nin(values) => !values.iter().any(|v| equals(value, v)),
        Operator::Exists(flag) => value.is_some() == *flag,
        Operator::Regex(pattern) => any_element(value, |v| {
            v.as_str().map_or(false, |text| pattern.is_match(text))
        }),
        Operator::Near(near) => value.map_or(false, |v| near.distance_within(v).is_some()),
    }
}

fn equals(value: Option<&Value>, expected: &Value) -> bool {
    match value {
        None => expected.is_null(),
        Some(actual) if actual == expected => true,
        Some(Value::Array(items)) => items.iter().any(|item| item == expected),
        Some(_) => false,
    }
}

fn same_type_class(a: &Value, b: &Value) -> bool {
    (a.is_number() && b.is_number()) || std::mem::discriminant(a) == std::mem::discriminant(b)
}

fn compares<F: Fn(Ordering) -> bool>(value: Option<&Value>, bound: &Value, accept: F) -> bool {
    any_element(value, |v| same_type_class(v, bound) && accept(v.cmp(bound)))
}

fn any_element<F: Fn(&Value) -> bool>(value: Option<&Value>, test: F) -> bool {
    match value {
        None => false,
        Some(Value::Array(items)) => items.iter().any(&test),
        Some(v) => test(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, q};

    fn check(q: crate::filter::Q, doc: &Document) -> bool {
        matches(&q.translate().unwrap(), doc)
    }

    #[test]
    fn equality_and_ranges() {
        let d = doc! { x: 0, y: 5, name: "Zurich" };
        assert!(check(q!(x = 0), &d));
        assert!(check(q!(x = 0, y__gt = 4), &d));
        assert!(!check(q!(y__gt = 5), &d));
        assert!(check(q!(y__gte = 5, y__lte = 5.0), &d));
        assert!(check(q!(name__startswith = "Zu"), &d));
    }

    #[test]
    fn type_brackets_for_ranges() {
        let d = doc! { x: "10" };
        assert!(!check(q!(x__gt = 5), &d));
        assert!(!check(q!(x__lt = 5), &d));
    }

    #[test]
    fn missing_field_semantics() {
        let d = doc! { x: 1 };
        assert!(check(q!(y__isnull = true), &d));
        assert!(!check(q!(y__exists = true), &d));
        assert!(check(q!(y__ne = 3), &d));
        assert!(!check(q!(y__lt = 3), &d));
    }

    #[test]
    fn arrays_match_any_element() {
        let d = doc! { tags: ["a", "b"], scores: [1, 9] };
        assert!(check(q!(tags = "b"), &d));
        assert!(check(q!(scores__gt = 8), &d));
        assert!(check(q!(tags__in = vec!["z", "a"]), &d));
        assert!(!check(q!(tags__nin = vec!["a"]), &d));
    }

    #[test]
    fn nested_paths() {
        let d = doc! { location: { city: "Bern" } };
        assert!(check(q!("location.city" = "Bern"), &d));
    }

    #[test]
    fn or_and_not() {
        let d = doc! { x: 2 };
        assert!(check(q!(x = 1) | q!(x = 2), &d));
        assert!(!check(!q!(x = 2), &d));
    }
}
