use crate::errors::{ErrorKind, FrameError, FrameResult};
use std::fmt::{Display, Formatter};

/// Direction of a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Native direction number (`1` or `-1`).
    pub fn direction(&self) -> i64 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

/// Ordered list of signed sort keys.
///
/// Parsed from pandas-style specs where a `-` prefix means descending and a
/// `+` prefix or no prefix means ascending: `["-year", "+name", "id"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SortSpec {
    keys: Vec<(String, SortOrder)>,
}

impl SortSpec {
    pub fn new() -> SortSpec {
        SortSpec { keys: Vec::new() }
    }

    pub fn by(field: &str, order: SortOrder) -> SortSpec {
        SortSpec::new().then_by(field, order)
    }

    pub fn then_by(mut self, field: &str, order: SortOrder) -> SortSpec {
        self.keys.push((field.to_string(), order));
        self
    }

    /// Parses signed column specs into a sort key list.
    pub fn parse<S: AsRef<str>>(specs: &[S]) -> FrameResult<SortSpec> {
        let mut keys = Vec::with_capacity(specs.len());
        for spec in specs {
            let spec = spec.as_ref().trim();
            let (field, order) = match spec.chars().next() {
                Some('-') => (&spec[1..], SortOrder::Descending),
                Some('+') => (&spec[1..], SortOrder::Ascending),
                _ => (spec, SortOrder::Ascending),
            };
            if field.is_empty() {
                log::error!("Empty sort key in {:?}", spec);
                return Err(FrameError::new(
                    &format!("Invalid sort key '{}'", spec),
                    ErrorKind::InvalidArgument,
                ));
            }
            keys.push((field.to_string(), order));
        }
        Ok(SortSpec { keys })
    }

    pub fn keys(&self) -> &[(String, SortOrder)] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Display for SortSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .keys
            .iter()
            .map(|(field, order)| format!("\"{}\": {}", field, order.direction()))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_signed_keys() {
        let spec = SortSpec::parse(&["-year", "+name", "id"]).unwrap();
        assert_eq!(
            spec.keys(),
            &[
                ("year".to_string(), SortOrder::Descending),
                ("name".to_string(), SortOrder::Ascending),
                ("id".to_string(), SortOrder::Ascending),
            ]
        );
    }

    #[test]
    fn parse_rejects_bare_sign() {
        let err = SortSpec::parse(&["-"]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
    }

    #[test]
    fn display_uses_native_directions() {
        let spec = SortSpec::by("a", SortOrder::Ascending).then_by("b", SortOrder::Descending);
        assert_eq!(spec.to_string(), "{\"a\": 1, \"b\": -1}");
    }
}
