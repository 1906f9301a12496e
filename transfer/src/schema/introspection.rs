use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::bail;
use crate::destination::{CatalogRow, DefaultValueStrategy, Destination, Dialect, TableIdentifier};
use crate::error::{ErrorKind, EtlResult};
use crate::schema::{DestinationTableConfig, DestinationTableConfigMap};
use crate::types::Column;

/// Column comment written once a column's default has been backfilled.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ColumnComment {
    backfilled: bool,
}

/// Returns the cached config of `table_id`, introspecting the destination on first access.
///
/// A table that does not exist yields an empty config flagged for creation. A column whose
/// native type cannot be mapped fails the call.
pub async fn get_table_config<D>(
    destination: &D,
    config_map: &DestinationTableConfigMap,
    table_id: &TableIdentifier,
    drop_deleted_columns: bool,
) -> EtlResult<Arc<DestinationTableConfig>>
where
    D: Destination,
{
    if let Some(config) = config_map.get(table_id) {
        debug!(table = %table_id, "table config cache hit");
        return Ok(config);
    }

    let dialect = destination.dialect();
    let query = dialect.build_describe_table_query(table_id);
    let rows = match destination.query(&query).await {
        Ok(rows) => rows,
        Err(err) if dialect.is_table_does_not_exist_err(&err) => {
            debug!(table = %table_id, "table does not exist yet");
            Vec::new()
        }
        Err(err) => return Err(err),
    };

    let columns = rows
        .iter()
        .map(|row| build_column_from_row(dialect, table_id, row))
        .collect::<EtlResult<Vec<_>>>()?;

    debug!(table = %table_id, columns = columns.len(), "introspected destination table");

    Ok(config_map.insert(
        table_id,
        DestinationTableConfig::new(columns, drop_deleted_columns),
    ))
}

fn build_column_from_row<T>(
    dialect: &T,
    table_id: &TableIdentifier,
    row: &CatalogRow,
) -> EtlResult<Column>
where
    T: Dialect + ?Sized,
{
    let Some(name) = row.get(dialect.describe_column_name_label()) else {
        bail!(
            ErrorKind::InvalidData,
            "Describe row is missing the column name",
            format!("table `{table_id}`, label `{}`", dialect.describe_column_name_label())
        );
    };

    let data_type = row
        .get(dialect.describe_data_type_label())
        .unwrap_or_default()
        .to_lowercase();
    let precision_hint = dialect.describe_precision_label().and_then(|label| row.get(label));

    let kind_details = dialect.kind_for_data_type(&data_type, precision_hint)?;
    if kind_details.is_invalid() {
        bail!(
            ErrorKind::SchemaIntegrity,
            "Destination column type could not be mapped",
            format!("column `{name}` of table `{table_id}` has type `{data_type}`")
        );
    }

    let mut column = Column::new(name.to_lowercase(), kind_details);
    match dialect.default_value_strategy() {
        DefaultValueStrategy::Backfill => {
            if let Some(comment) = row
                .get(dialect.describe_description_label())
                .filter(|comment| !comment.is_empty())
            {
                match serde_json::from_str::<ColumnComment>(comment) {
                    Ok(comment) => column.set_backfilled(comment.backfilled),
                    Err(err) => {
                        // Comments owned by users must never be overwritten by a backfill.
                        warn!(
                            table = %table_id,
                            column = name,
                            comment,
                            error = %err,
                            "column comment is not a backfill marker, treating column as backfilled"
                        );
                        column.set_backfilled(true);
                    }
                }
            }
        }
        DefaultValueStrategy::Native => {
            if row
                .get(dialect.describe_default_value_label())
                .is_some_and(|value| !value.is_empty())
            {
                column.set_backfilled(true);
            }
        }
        DefaultValueStrategy::NotImplemented => {}
    }

    Ok(column)
}
