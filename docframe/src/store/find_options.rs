use crate::common::{SortOrder, SortSpec};

/// Options for a find call: projection, sort, skip and limit.
///
/// ```rust,ignore
/// use docframe::store::FindOptions;
///
/// let options = FindOptions::new()
///     .projection(vec!["x".into(), "y".into()])
///     .skip(10)
///     .limit(20);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub(crate) projection: Option<Vec<String>>,
    pub(crate) sort: Option<SortSpec>,
    pub(crate) skip: Option<usize>,
    pub(crate) limit: Option<usize>,
}

/// Creates `FindOptions` sorted by one field.
pub fn order_by(field_name: &str, sort_order: SortOrder) -> FindOptions {
    FindOptions::new().sort(SortSpec::by(field_name, sort_order))
}

/// Creates `FindOptions` that skips a number of results.
pub fn skip_by(skip: usize) -> FindOptions {
    FindOptions::new().skip(skip)
}

/// Creates `FindOptions` that limits the number of results.
pub fn limit_to(limit: usize) -> FindOptions {
    FindOptions::new().limit(limit)
}

impl FindOptions {
    pub fn new() -> FindOptions {
        FindOptions::default()
    }

    /// Restricts returned fields. The identity field is always returned.
    pub fn projection(mut self, fields: Vec<String>) -> FindOptions {
        self.projection = Some(fields);
        self
    }

    /// An empty sort spec leaves natural order in place.
    pub fn sort(mut self, sort: SortSpec) -> FindOptions {
        self.sort = if sort.is_empty() { None } else { Some(sort) };
        self
    }

    pub fn skip(mut self, skip: usize) -> FindOptions {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: usize) -> FindOptions {
        self.limit = Some(limit);
        self
    }

    pub fn projection_fields(&self) -> Option<&Vec<String>> {
        self.projection.as_ref()
    }

    pub fn sort_spec(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn skip_count(&self) -> Option<usize> {
        self.skip
    }

    pub fn limit_count(&self) -> Option<usize> {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let options = FindOptions::new()
            .projection(vec!["a".to_string()])
            .skip(5)
            .limit(10);
        assert_eq!(options.projection_fields(), Some(&vec!["a".to_string()]));
        assert_eq!(options.skip_count(), Some(5));
        assert_eq!(options.limit_count(), Some(10));
        assert!(options.sort_spec().is_none());
    }

    #[test]
    fn empty_sort_is_dropped() {
        let options = FindOptions::new().sort(SortSpec::new());
        assert!(options.sort_spec().is_none());
    }

    #[test]
    fn helper_constructors() {
        assert_eq!(skip_by(3).skip_count(), Some(3));
        assert_eq!(limit_to(7).limit_count(), Some(7));
        let sorted = order_by("x", SortOrder::Descending);
        assert_eq!(
            sorted.sort_spec().map(|s| s.keys().to_vec()),
            Some(vec![("x".to_string(), SortOrder::Descending)])
        );
    }
}
