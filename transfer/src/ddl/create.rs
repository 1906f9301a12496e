use transfer_config::shared::Mode;

use crate::bail;
use crate::destination::{Dialect, TableIdentifier};
use crate::error::{ErrorKind, EtlResult};
use crate::types::Column;

/// Builds the `CREATE TABLE` statement for `columns`, skipping columns of unknown kind.
///
/// Primary keys are declared only for replication-mode tables: history tables are append-only
/// and hold many rows per key.
pub fn build_create_table_sql<T>(
    dialect: &T,
    table_id: &TableIdentifier,
    temporary: bool,
    mode: Mode,
    columns: &[Column],
) -> EtlResult<String>
where
    T: Dialect + ?Sized,
{
    if columns.is_empty() {
        bail!(
            ErrorKind::InvalidDdlOperation,
            "Cannot create a table without columns",
            format!("table `{table_id}`")
        );
    }

    let mut column_defs = Vec::with_capacity(columns.len() + 1);
    let mut primary_keys = Vec::new();
    for column in columns.iter().filter(|column| !column.should_skip()) {
        if column.is_primary_key() && mode == Mode::Replication {
            primary_keys.push(column.name().to_string());
        }

        column_defs.push(format!(
            "{} {}",
            dialect.quote_identifier(column.name()),
            dialect.data_type_for_kind(&column.kind_details, column.is_primary_key())
        ));
    }

    if column_defs.is_empty() {
        bail!(
            ErrorKind::InvalidDdlOperation,
            "Cannot create a table without valid columns",
            format!("table `{table_id}`")
        );
    }

    if !primary_keys.is_empty() {
        column_defs.push(dialect.build_primary_key_clause(&primary_keys));
    }

    Ok(dialect.build_create_table_query(table_id, temporary, &column_defs))
}
