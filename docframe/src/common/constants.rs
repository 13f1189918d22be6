use itertools::Itertools;

/// Identity field assigned by the store.
pub const DOC_ID: &str = "_id";

/// Prefix marking a stored column as part of the logical row index.
/// Stored as `_idx#<position>_<label>`.
pub const INDEX_PREFIX: &str = "_idx";

/// Prefix of engine-owned bookkeeping columns.
pub const BOOKKEEPING_PREFIX: &str = "_om#";

/// Row-sequence stamp used to restore global order after chunked writes.
pub const ROW_ID: &str = "_om#rowid";

/// Default name of the row index when a table has no index columns.
pub const DEFAULT_INDEX_NAME: &str = "index";

pub fn is_index_column(field: &str) -> bool {
    field.starts_with(INDEX_PREFIX)
}

pub fn is_bookkeeping_column(field: &str) -> bool {
    field.starts_with(BOOKKEEPING_PREFIX)
}

/// True for identity, index and bookkeeping fields, which never show up
/// as user-facing data columns.
pub fn is_reserved_column(field: &str) -> bool {
    field == DOC_ID || is_index_column(field) || is_bookkeeping_column(field)
}

/// Stored name of the index column at `position` with user label `label`.
pub fn index_column_name(position: usize, label: &str) -> String {
    format!("{}#{}_{}", INDEX_PREFIX, position, label)
}

/// Splits a stored index column name into its position and label.
///
/// Names that carry no position (`_idx_label` or a bare `_idx`) get
/// `usize::MAX` so they order after positioned columns.
pub fn parse_index_column(field: &str) -> Option<(usize, String)> {
    let rest = field.strip_prefix(INDEX_PREFIX)?;
    if let Some(positioned) = rest.strip_prefix('#') {
        let (position, label) = positioned.split_once('_')?;
        let position = position.parse::<usize>().ok()?;
        return Some((position, label.to_string()));
    }
    let label = rest.strip_prefix('_').unwrap_or(rest);
    Some((usize::MAX, label.to_string()))
}

/// Returns the stored index columns among `fields`, ordered by position.
pub fn restore_index_order<'a, I>(fields: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    fields
        .into_iter()
        .filter(|f| is_index_column(f))
        .filter_map(|f| parse_index_column(f).map(|(pos, _)| (pos, f.clone())))
        .sorted_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, f)| f)
        .collect()
}

/// User-facing label of a stored index column; other names pass through.
pub fn index_label(field: &str) -> String {
    match parse_index_column(field) {
        Some((_, label)) if !label.is_empty() => label,
        _ => field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_families() {
        assert!(is_reserved_column("_id"));
        assert!(is_reserved_column("_idx#0_key"));
        assert!(is_reserved_column(ROW_ID));
        assert!(!is_reserved_column("id"));
        assert!(!is_reserved_column("x"));
    }

    #[test]
    fn index_column_round_trip() {
        let name = index_column_name(1, "city_name");
        assert_eq!(name, "_idx#1_city_name");
        assert_eq!(parse_index_column(&name), Some((1, "city_name".to_string())));
        assert_eq!(index_label(&name), "city_name");
    }

    #[test]
    fn restore_order_by_position() {
        let fields = vec![
            "x".to_string(),
            "_idx#1_b".to_string(),
            "_idx#0_a".to_string(),
            "_om#rowid".to_string(),
        ];
        assert_eq!(restore_index_order(&fields), vec!["_idx#0_a", "_idx#1_b"]);
    }

    #[test]
    fn unpositioned_index_sorts_last() {
        let fields = vec!["_idx_z".to_string(), "_idx#0_a".to_string()];
        assert_eq!(restore_index_order(&fields), vec!["_idx#0_a", "_idx_z"]);
        assert_eq!(index_label("_idx_z"), "z");
    }
}
