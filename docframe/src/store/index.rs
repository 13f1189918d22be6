use crate::common::{Document, Value};
use crate::errors::{ErrorKind, FrameError, FrameResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexDirection {
    Ascending,
    Descending,
    /// Spherical geo index on GeoJSON points.
    GeoSphere,
}

impl IndexDirection {
    fn name_prefix(&self) -> &'static str {
        match self {
            IndexDirection::Ascending => "asc",
            IndexDirection::Descending => "desc",
            IndexDirection::GeoSphere => "geo",
        }
    }

    fn native(&self) -> Value {
        match self {
            IndexDirection::Ascending => Value::from(1),
            IndexDirection::Descending => Value::from(-1),
            IndexDirection::GeoSphere => Value::from("2dsphere"),
        }
    }
}

/// Keys, name and uniqueness of an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    keys: Vec<(String, IndexDirection)>,
    name: String,
    unique: bool,
}

impl IndexDefinition {
    pub fn keys(&self) -> &[(String, IndexDirection)] {
        &self.keys
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn unique(mut self, unique: bool) -> IndexDefinition {
        self.unique = unique;
        self
    }

    /// Native key document, e.g. `{"a": 1, "loc": "2dsphere"}`.
    pub fn key_document(&self) -> Document {
        self.keys
            .iter()
            .map(|(field, direction)| (field.clone(), direction.native()))
            .collect()
    }
}

/// Builds an index from signed column specs.
///
/// `+col` or `col` is ascending, `-col` descending and `@col` a spherical geo
/// index. The name joins `asc_col`, `desc_col` and `geo_col` parts with `__`,
/// so the same specs always yield the same name.
///
/// ```rust
/// use docframe::store::make_index;
///
/// let index = make_index(&["+a", "-b", "@loc"]).unwrap();
/// assert_eq!(index.name(), "asc_a__desc_b__geo_loc");
/// ```
pub fn make_index<S: AsRef<str>>(columns: &[S]) -> FrameResult<IndexDefinition> {
    if columns.is_empty() {
        log::error!("Index requested without columns");
        return Err(FrameError::new(
            "An index needs at least one column",
            ErrorKind::InvalidArgument,
        ));
    }

    let mut keys = Vec::with_capacity(columns.len());
    let mut name_parts = Vec::with_capacity(columns.len());
    for spec in columns {
        let spec = spec.as_ref().trim();
        let (field, direction) = match spec.chars().next() {
            Some('-') => (&spec[1..], IndexDirection::Descending),
            Some('@') => (&spec[1..], IndexDirection::GeoSphere),
            Some('+') => (&spec[1..], IndexDirection::Ascending),
            _ => (spec, IndexDirection::Ascending),
        };
        if field.is_empty() {
            log::error!("Empty index column in {:?}", spec);
            return Err(FrameError::new(
                &format!("Invalid index column '{}'", spec),
                ErrorKind::InvalidArgument,
            ));
        }
        name_parts.push(format!("{}_{}", direction.name_prefix(), field));
        keys.push((field.to_string(), direction));
    }

    Ok(IndexDefinition {
        keys,
        name: name_parts.join("__"),
        unique: false,
    })
}
