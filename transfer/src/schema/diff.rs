use std::collections::HashSet;

use crate::types::Column;
use crate::types::markers::{ARTIE_PREFIX, ONLY_SET_DELETE_COLUMN_MARKER};

/// Columns present on only one side of a comparison.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffResult {
    /// Known to the destination but absent from the source: candidates for deletion.
    pub source_columns_missing: Vec<Column>,
    /// Observed in the source but absent from the destination: need to be added.
    pub target_columns_missing: Vec<Column>,
}

/// Compares two column sets by lower-cased name, preserving each side's order.
///
/// Returned columns carry lower-cased names.
pub fn diff(source_columns: &[Column], target_columns: &[Column]) -> DiffResult {
    let source = normalize(source_columns);
    let target = normalize(target_columns);

    let source_names = source.iter().map(|c| c.name().to_string()).collect::<HashSet<_>>();
    let target_names = target.iter().map(|c| c.name().to_string()).collect::<HashSet<_>>();

    DiffResult {
        source_columns_missing: target
            .into_iter()
            .filter(|column| !source_names.contains(column.name()))
            .collect(),
        target_columns_missing: source
            .into_iter()
            .filter(|column| !target_names.contains(column.name()))
            .collect(),
    }
}

/// Diffs the columns and drops bookkeeping columns the table does not write.
///
/// Returns `(source_columns_missing, target_columns_missing)`.
pub fn diff_and_filter(
    source_columns: &[Column],
    target_columns: &[Column],
    columns_to_keep: &[String],
) -> (Vec<Column>, Vec<Column>) {
    let result = diff(source_columns, target_columns);

    (
        filter_columns(result.source_columns_missing, columns_to_keep),
        filter_columns(result.target_columns_missing, columns_to_keep),
    )
}

/// Lower-cases names and keeps the first column of any repeated name.
fn normalize(columns: &[Column]) -> Vec<Column> {
    let mut seen = HashSet::new();
    columns
        .iter()
        .map(|column| {
            let name = column.name().to_lowercase();
            column.clone().with_name(name)
        })
        .filter(|column| seen.insert(column.name().to_string()))
        .collect()
}

fn filter_columns(columns: Vec<Column>, columns_to_keep: &[String]) -> Vec<Column> {
    columns
        .into_iter()
        .filter(|column| !should_skip_column(column.name(), columns_to_keep))
        .collect()
}

fn should_skip_column(name: &str, columns_to_keep: &[String]) -> bool {
    if name == ONLY_SET_DELETE_COLUMN_MARKER {
        return true;
    }

    if columns_to_keep.iter().any(|keep| keep.eq_ignore_ascii_case(name)) {
        return false;
    }

    name.contains(ARTIE_PREFIX)
}
