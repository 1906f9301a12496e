use metrics::counter;
use tracing::{debug, info};
use transfer_config::shared::{TopicConfig, unique_database_and_schema};

use crate::ddl::{drop_temporary_table, should_delete_from_name};
use crate::destination::{Destination, Dialect, TableIdentifier};
use crate::error::{EtlError, EtlResult};
use crate::metrics::TRANSFER_TEMP_TABLES_SWEPT_TOTAL;

const TABLE_NAME_LABEL: &str = "table_name";
const TABLE_SCHEMA_LABEL: &str = "table_schema";

/// Drops every expired temporary table in the schemas the topics write to.
///
/// Each distinct database and schema is scanned once. A failed catalog query or drop does not
/// stop the sweep; all failures are returned together at the end. Returns the number of
/// tables dropped.
pub async fn sweep_temporary_tables<D>(
    destination: &D,
    topic_configs: &[TopicConfig],
) -> EtlResult<usize>
where
    D: Destination,
{
    let mut swept = 0;
    let mut errors: Vec<EtlError> = Vec::new();

    for pair in unique_database_and_schema(topic_configs) {
        let query = destination
            .dialect()
            .build_sweep_query(&pair.database, &pair.schema);

        let rows = match destination.query(&query).await {
            Ok(rows) => rows,
            Err(err) => {
                errors.push(err);
                continue;
            }
        };

        for row in rows {
            let Some(table_name) = row.get(TABLE_NAME_LABEL) else {
                continue;
            };

            if !should_delete_from_name(table_name) {
                debug!(table = table_name, "temporary table has not expired yet");
                continue;
            }

            let schema = row.get(TABLE_SCHEMA_LABEL).unwrap_or(&pair.schema);
            let table_id = TableIdentifier::new(&pair.database, schema, table_name)
                .with_temporary(true);

            match drop_temporary_table(destination, &table_id, true).await {
                Ok(()) => {
                    info!(table = %table_id, "dropped expired temporary table");
                    counter!(TRANSFER_TEMP_TABLES_SWEPT_TOTAL).increment(1);
                    swept += 1;
                }
                Err(err) => errors.push(err),
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors.into());
    }

    Ok(swept)
}
