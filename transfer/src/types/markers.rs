//! Names of the bookkeeping columns and values added to replicated tables.

/// Prefix shared by every bookkeeping column and temporary table.
pub const ARTIE_PREFIX: &str = "__artie";

/// Soft-delete marker column.
pub const DELETE_COLUMN_MARKER: &str = "__artie_delete";

/// Set when only the delete marker should be written for a row, leaving other columns intact.
pub const ONLY_SET_DELETE_COLUMN_MARKER: &str = "__artie_only_set_delete";

pub const UPDATED_AT_COLUMN_MARKER: &str = "__artie_updated_at";

pub const DATABASE_UPDATED_AT_COLUMN_MARKER: &str = "__artie_db_updated_at";

pub const OPERATION_COLUMN_MARKER: &str = "__artie_operation";

pub const SOURCE_METADATA_COLUMN_MARKER: &str = "__artie_source_metadata";

pub const FULL_SOURCE_TABLE_NAME_COLUMN_MARKER: &str = "__artie_full_source_table_name";

/// Value emitted by the source when an unchanged TOAST column was not included in the event.
pub const TOAST_UNAVAILABLE_VALUE: &str = "__debezium_unavailable_value";

/// Returns `true` if `name` carries the bookkeeping prefix, ignoring case.
pub fn has_artie_prefix(name: &str) -> bool {
    name.to_lowercase().contains(ARTIE_PREFIX)
}
