use crate::common::Value;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

/// A schemaless record: column name to value, in insertion order.
///
/// Field order matters for frames because the first document of a
/// collection decides the default column order, so `Document` keeps keys in
/// the order they were written rather than sorting them.
///
/// Nested fields are addressed with dotted paths (`"location.city"`), and
/// array elements with numeric segments (`"tags.0"`).
#[derive(Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document {
    data: IndexMap<String, Value>,
}

impl Document {
    pub fn new() -> Document {
        Document { data: IndexMap::new() }
    }

    pub fn with_capacity(capacity: usize) -> Document {
        Document {
            data: IndexMap::with_capacity(capacity),
        }
    }

    /// Sets a top-level field and returns the previous value, if any.
    /// An existing key keeps its position.
    pub fn put<V: Into<Value>>(&mut self, key: &str, value: V) -> Option<Value> {
        self.data.insert(key.to_string(), value.into())
    }

    /// Returns a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Resolves a dotted path through nested documents and arrays.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.data.get(path) {
            return Some(value);
        }

        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.data.get(first)?;
        for segment in segments {
            current = match current {
                Value::Document(doc) => doc.get(segment)?,
                Value::Array(values) => values.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Keeps only fields for which the predicate returns true.
    pub fn retain<F: FnMut(&str, &Value) -> bool>(&mut self, mut keep: F) {
        self.data.retain(|k, v| keep(k, v));
    }

    /// Copies every field of `other` into this document, overwriting duplicates.
    pub fn merge(&mut self, other: &Document) {
        for (key, value) in other.iter() {
            self.data.insert(key.clone(), value.clone());
        }
    }

    fn sorted_entries(&self) -> Vec<(&String, &Value)> {
        let mut entries: Vec<_> = self.data.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub(crate) fn to_json(&self) -> String {
        let fields: Vec<String> = self
            .data
            .iter()
            .map(|(k, v)| format!("\"{}\": {}", k, v.to_json()))
            .collect();
        format!("{{{}}}", fields.join(", "))
    }
}

impl PartialOrd for Document {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Document {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sorted_entries().cmp(&other.sorted_entries())
    }
}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (key, value) in self.sorted_entries() {
            key.hash(state);
            value.hash(state);
        }
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Document {
            data: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

#[doc(hidden)]
pub fn normalize(key: &str) -> String {
    key.trim_matches('"').to_string()
}

/// Builds a [Document] from `key: value` pairs.
///
/// Keys may be identifiers or string literals. Values may be literals,
/// parenthesized expressions, nested `{ .. }` documents or `[ .. ]` arrays.
///
/// ```rust
/// use docframe::doc;
///
/// let d = doc! {
///     "name": "Zurich",
///     location: { "type": "Point", coordinates: [8.55, 47.36] },
///     rank: (1 + 1),
/// };
/// assert_eq!(d.len(), 3);
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::common::Document::new()
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::doc_value;

            let mut doc = $crate::common::Document::new();
            $(
                doc.put(&$crate::common::normalize(stringify!($key)), $crate::doc_value!($value));
            )*
            doc
        }
    };
}

/// Value conversion used by [doc!] for nested documents and arrays.
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, val};

    fn location() -> Document {
        doc! {
            name: "Bern",
            location: {
                "type": "Point",
                coordinates: [7.44, 46.95],
            },
            tags: ["capital", "old-town"],
        }
    }

    #[test]
    fn keeps_insertion_order() {
        let d = doc! { z: 1, a: 2, m: 3 };
        let keys: Vec<&String> = d.keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn put_existing_key_keeps_position() {
        let mut d = doc! { a: 1, b: 2 };
        let old = d.put("a", 10);
        assert_eq!(old, Some(val!(1)));
        assert_eq!(d.keys().next().map(|k| k.as_str()), Some("a"));
        assert_eq!(d.get("a"), Some(&val!(10)));
    }

    #[test]
    fn dotted_path_lookup() {
        let d = location();
        assert_eq!(d.get_path("location.type"), Some(&val!("Point")));
        assert_eq!(d.get_path("location.coordinates.1"), Some(&val!(46.95)));
        assert_eq!(d.get_path("tags.0"), Some(&val!("capital")));
        assert_eq!(d.get_path("location.missing"), None);
        assert_eq!(d.get_path("name.first"), None);
    }

    #[test]
    fn equality_ignores_field_order() {
        let a = doc! { x: 1, y: 2 };
        let b = doc! { y: 2, x: 1 };
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn remove_and_retain() {
        let mut d = doc! { "_id": 1, a: 2, "_om#rowid": 0 };
        d.retain(|k, _| !k.starts_with("_om#"));
        assert!(!d.contains_key("_om#rowid"));
        assert_eq!(d.remove("_id"), Some(val!(1)));
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn merge_overwrites() {
        let mut a = doc! { x: 1, y: 2 };
        a.merge(&doc! { y: 3, z: 4 });
        assert_eq!(a.get("y"), Some(&val!(3)));
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn collect_from_pairs() {
        let d: Document = vec![("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(d.get("b"), Some(&val!(2)));
    }
}
