use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use rand::Rng;
use tracing::{info, warn};
use transfer_config::shared::{Mode, SharedDestinationSettings};

use crate::bail;
use crate::ddl::build_create_table_sql;
use crate::destination::{ColumnOperation, Destination, Dialect, TableIdentifier};
use crate::error::{ErrorKind, EtlResult};
use crate::metrics::{OPERATION_LABEL, TRANSFER_DDL_STATEMENTS_TOTAL};
use crate::schema::DestinationTableConfig;
use crate::types::Column;

/// Parameters of one [`alter_table`] call.
#[derive(Debug, Clone, Copy)]
pub struct AlterTableArgs<'a> {
    pub table_id: &'a TableIdentifier,
    pub table_config: &'a DestinationTableConfig,
    pub settings: &'a SharedDestinationSettings,
    pub mode: Mode,
    /// Create the table with the columns instead of altering it.
    pub create_table: bool,
    pub temporary_table: bool,
    pub operation: ColumnOperation,
    /// Latest event time of the batch, used to debounce column drops.
    pub cdc_time: DateTime<Utc>,
    /// Whether the batch holds anything besides deletes.
    pub contain_other_operations: bool,
}

impl AlterTableArgs<'_> {
    fn validate(&self) -> EtlResult<()> {
        if self.operation == ColumnOperation::Delete && self.create_table {
            bail!(
                ErrorKind::InvalidDdlOperation,
                "Cannot drop columns while creating a table",
                format!("table `{}`", self.table_id)
            );
        }

        if self.temporary_table && !self.create_table {
            bail!(
                ErrorKind::InvalidDdlOperation,
                "Temporary tables can only be created, not altered",
                format!("table `{}`", self.table_id)
            );
        }

        Ok(())
    }
}

/// Creates a table or applies one column operation to it, then updates the cached config.
///
/// Columns of unknown kind are ignored, and a column is only dropped once
/// [`DestinationTableConfig::should_delete_column`] allows it. Each column gets its own
/// `ALTER TABLE`. Errors reporting that the column already exists are swallowed so that DDL can
/// be replayed; any other error aborts the call before the cache is touched.
pub async fn alter_table<D>(
    destination: &D,
    args: &AlterTableArgs<'_>,
    columns: &[Column],
) -> EtlResult<()>
where
    D: Destination,
{
    args.validate()?;

    let columns = columns
        .iter()
        .filter(|column| !column.should_skip())
        .filter(|column| {
            args.operation != ColumnOperation::Delete
                || args.table_config.should_delete_column(
                    column.name(),
                    args.cdc_time,
                    args.contain_other_operations,
                )
        })
        .cloned()
        .collect::<Vec<_>>();

    if columns.is_empty() {
        return Ok(());
    }

    let dialect = destination.dialect();
    if args.create_table {
        let query = build_create_table_sql(
            dialect,
            args.table_id,
            args.temporary_table,
            args.mode,
            &columns,
        )?;

        info!(table = %args.table_id, %query, "creating table");
        match destination.exec(&query).await {
            Ok(_) => {}
            Err(err) if dialect.is_column_already_exists_err(&err) => {}
            Err(err) => return Err(err),
        }
        counter!(TRANSFER_DDL_STATEMENTS_TOTAL, OPERATION_LABEL => "create").increment(1);
    } else {
        for column in &columns {
            let query = build_alter_column_query(dialect, args.table_id, args.operation, column);

            info!(table = %args.table_id, %query, operation = %args.operation, "altering table");
            match args.operation {
                ColumnOperation::Add => add_column(destination, args.settings, &query).await?,
                ColumnOperation::Delete => match destination.exec(&query).await {
                    Ok(_) => {}
                    Err(err) if dialect.is_column_already_exists_err(&err) => {}
                    Err(err) => return Err(err),
                },
            }
            counter!(TRANSFER_DDL_STATEMENTS_TOTAL, OPERATION_LABEL => args.operation.as_str())
                .increment(1);
        }
    }

    // The staging schema is not the target's schema.
    if !args.temporary_table {
        args.table_config
            .mutate_in_memory_columns(args.operation, &columns);
    }

    Ok(())
}

fn build_alter_column_query<T>(
    dialect: &T,
    table_id: &TableIdentifier,
    operation: ColumnOperation,
    column: &Column,
) -> String
where
    T: Dialect + ?Sized,
{
    let column_sql = match operation {
        ColumnOperation::Add => format!(
            "{} {}",
            dialect.quote_identifier(column.name()),
            dialect.data_type_for_kind(&column.kind_details, column.is_primary_key())
        ),
        ColumnOperation::Delete => dialect.quote_identifier(column.name()),
    };

    dialect.build_alter_column_query(table_id, operation, &column_sql)
}

/// Runs an `ADD COLUMN`, retrying retryable destination errors with exponential backoff.
async fn add_column<D>(
    destination: &D,
    settings: &SharedDestinationSettings,
    query: &str,
) -> EtlResult<()>
where
    D: Destination,
{
    let mut attempt = 0;
    loop {
        attempt += 1;

        let err = match destination.exec(query).await {
            Ok(_) => return Ok(()),
            Err(err) if destination.dialect().is_column_already_exists_err(&err) => return Ok(()),
            Err(err) => err,
        };

        if !destination.is_retryable_error(&err) || attempt >= settings.ddl_max_attempts {
            return Err(err);
        }

        let delay = calculate_backoff(settings, attempt);
        warn!(
            %query,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "failed to add column, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Doubles the initial delay on each attempt up to the configured cap, plus up to 30% jitter.
fn calculate_backoff(settings: &SharedDestinationSettings, attempt: u32) -> Duration {
    let multiplier = 2f64.powi(attempt.saturating_sub(1) as i32);
    let base_delay_ms = settings.ddl_retry_initial_delay_ms as f64 * multiplier;
    let capped_delay_ms = base_delay_ms.min(settings.ddl_retry_max_delay_ms as f64);

    let jitter_factor = rand::rng().random::<f64>() * 0.3;
    Duration::from_millis((capped_delay_ms * (1.0 + jitter_factor)) as u64)
}
