use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::histogram;
use tracing::{debug, info, warn};
use transfer_config::shared::{SharedDestinationSettings, TopicConfig};

use crate::{bail, etl_error};
use crate::buffer::TableData;
use crate::ddl::{
    AlterTableArgs, alter_table, drop_temporary_table, sweep_temporary_tables, temp_table_id,
    temp_table_id_with_suffix,
};
use crate::destination::{
    ColumnOperation, Destination, Dialect, ExecResult, MergeQueryArgs, TableIdentifier,
};
use crate::error::{ErrorKind, EtlResult};
use crate::merge::{backfill_column, exec_statements};
use crate::metrics::{TABLE_LABEL, TRANSFER_MERGE_DURATION_SECONDS, register_metrics};
use crate::schema::{
    DestinationTableConfig, DestinationTableConfigMap, diff_and_filter, get_table_config,
};
use crate::types::Column;
use crate::types::markers::has_artie_prefix;

/// Options of [`Orchestrator::merge`].
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Extra predicates added to the merge join, for example a partition filter.
    pub additional_equality_strings: Vec<String>,
}

/// Options of [`Orchestrator::append`].
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Staging table to load into instead of the target. It is created by the load.
    pub temp_table_id: Option<TableIdentifier>,
}

/// Flushes buffered tables into a destination.
///
/// The orchestrator owns the destination handle, the table config cache shared by every
/// table of the destination, and the settings governing DDL and merges. It is safe to flush
/// different tables concurrently; a single [`TableData`] must be flushed by one caller at a time.
#[derive(Debug)]
pub struct Orchestrator<D> {
    destination: D,
    config_map: DestinationTableConfigMap,
    settings: SharedDestinationSettings,
}

impl<D> Orchestrator<D>
where
    D: Destination,
{
    pub fn new(destination: D, settings: SharedDestinationSettings) -> Self {
        register_metrics();

        Self {
            destination,
            config_map: DestinationTableConfigMap::new(),
            settings,
        }
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    pub fn config_map(&self) -> &DestinationTableConfigMap {
        &self.config_map
    }

    /// Returns the cached config of `table_id`, introspecting the destination on first access.
    pub async fn get_table_config(
        &self,
        table_id: &TableIdentifier,
        drop_deleted_columns: bool,
    ) -> EtlResult<Arc<DestinationTableConfig>> {
        get_table_config(
            &self.destination,
            &self.config_map,
            table_id,
            drop_deleted_columns,
        )
        .await
    }

    /// Merges the buffered rows of `table_data` into their destination table.
    ///
    /// The destination schema is evolved first: missing columns are added (creating the table
    /// if needed), columns gone from the source are dropped once their deletion is confirmed,
    /// and pending defaults are backfilled. The rows are then staged in a temporary table and
    /// merged into the target. The temporary table is dropped whatever the outcome.
    ///
    /// The buffer is not wiped; the caller does so once the flush is acknowledged.
    pub async fn merge(
        &self,
        table_data: &mut TableData,
        options: &MergeOptions,
    ) -> EtlResult<()> {
        if table_data.should_skip_update() {
            return Ok(());
        }

        let started = Instant::now();
        let table_id = self
            .destination
            .identifier_for(&table_data.topic_config().database_and_schema(), table_data.name());
        let table_config = self
            .get_table_config(&table_id, table_data.topic_config().drop_deleted_columns)
            .await?;

        let (source_columns_missing, target_columns_missing) = diff_and_filter(
            table_data.in_memory_columns().get_columns(),
            table_config.columns().get_columns(),
            &table_data.build_columns_to_keep(),
        );
        table_config.audit_columns_to_delete(&source_columns_missing);

        let cdc_time = table_data.latest_cdc_ts().unwrap_or_else(Utc::now);
        let add_args = AlterTableArgs {
            table_id: &table_id,
            table_config: &table_config,
            settings: &self.settings,
            mode: table_data.mode(),
            create_table: table_config.create_table(),
            temporary_table: false,
            operation: ColumnOperation::Add,
            cdc_time,
            contain_other_operations: table_data.contain_other_operations(),
        };
        alter_table(&self.destination, &add_args, &target_columns_missing).await?;

        let delete_args = AlterTableArgs {
            create_table: false,
            operation: ColumnOperation::Delete,
            ..add_args
        };
        alter_table(&self.destination, &delete_args, &source_columns_missing).await?;

        table_data.merge_columns_from_destination(table_config.columns().get_columns())?;

        self.backfill_columns(table_data, &table_config, &table_id)
            .await?;

        let temp_table_id =
            temp_table_id_with_suffix(&table_id, table_data.temporary_table_suffix());
        let result = self
            .merge_through_temporary_table(
                table_data,
                &table_config,
                &table_id,
                &temp_table_id,
                options,
            )
            .await;
        // Runs on every exit path of the staging step.
        let cleanup = drop_temporary_table(&self.destination, &temp_table_id, false).await;

        histogram!(
            TRANSFER_MERGE_DURATION_SECONDS,
            TABLE_LABEL => table_id.to_string(),
        )
        .record(started.elapsed().as_secs_f64());

        result.and(cleanup)?;

        info!(
            table = %table_id,
            rows = table_data.number_of_rows(),
            "merged buffered rows"
        );

        Ok(())
    }

    async fn backfill_columns(
        &self,
        table_data: &mut TableData,
        table_config: &DestinationTableConfig,
        table_id: &TableIdentifier,
    ) -> EtlResult<()> {
        let pending = table_data
            .in_memory_columns()
            .get_columns()
            .iter()
            .filter(|column| !column.should_skip() && !has_artie_prefix(column.name()))
            .filter(|column| column.should_backfill())
            .cloned()
            .collect::<Vec<_>>();

        for mut column in pending {
            backfill_column(&self.destination, &column, table_id).await?;

            table_config.upsert_column_backfilled(column.name(), true);
            column.set_backfilled(true);
            table_data.upsert_in_memory_column(column);
        }

        Ok(())
    }

    async fn merge_through_temporary_table(
        &self,
        table_data: &TableData,
        table_config: &DestinationTableConfig,
        table_id: &TableIdentifier,
        temp_table_id: &TableIdentifier,
        options: &MergeOptions,
    ) -> EtlResult<()> {
        self.destination
            .prepare_temporary_table(table_data, table_config, temp_table_id, table_id, true)
            .await?;

        let primary_keys = resolve_primary_keys(table_data, table_id)?;
        let columns = table_data.in_memory_columns().valid_columns();
        if columns.is_empty() {
            bail!(
                ErrorKind::MissingColumns,
                "No valid columns to merge",
                format!("table `{table_id}`")
            );
        }

        let dialect = self.destination.dialect();
        let sub_query = temp_table_id.fully_qualified_name(dialect);
        let queries = dialect.build_merge_queries(&MergeQueryArgs {
            table_id,
            sub_query: &sub_query,
            primary_keys: &primary_keys,
            additional_equality_strings: &options.additional_equality_strings,
            columns: &columns,
            soft_delete: table_data.topic_config().soft_delete,
            contains_hard_deletes: table_data.contains_hard_deletes(),
        })?;

        debug!(table = %table_id, statements = queries.len(), "executing merge");
        let results = exec_statements(&self.destination, &queries).await?;

        if self.settings.enable_merge_assertion {
            assert_rows_affected(&results, table_data.number_of_rows(), table_id)?;
        }

        Ok(())
    }

    /// Appends the buffered rows of `table_data` to their destination table.
    ///
    /// Missing columns are added (creating the table if needed) but none are dropped, nothing
    /// is backfilled and no merge runs. Rows load into `options.temp_table_id` when set,
    /// otherwise straight into the target.
    pub async fn append(
        &self,
        table_data: &mut TableData,
        options: &AppendOptions,
    ) -> EtlResult<()> {
        if table_data.should_skip_update() {
            return Ok(());
        }

        let table_id = self
            .destination
            .identifier_for(&table_data.topic_config().database_and_schema(), table_data.name());
        let table_config = self
            .get_table_config(&table_id, table_data.topic_config().drop_deleted_columns)
            .await?;

        // Appends never drop columns.
        let (_, target_columns_missing) = diff_and_filter(
            table_data.in_memory_columns().get_columns(),
            table_config.columns().get_columns(),
            &table_data.build_columns_to_keep(),
        );

        let args = AlterTableArgs {
            table_id: &table_id,
            table_config: &table_config,
            settings: &self.settings,
            mode: table_data.mode(),
            create_table: table_config.create_table(),
            temporary_table: false,
            operation: ColumnOperation::Add,
            cdc_time: table_data.latest_cdc_ts().unwrap_or_else(Utc::now),
            contain_other_operations: table_data.contain_other_operations(),
        };
        alter_table(&self.destination, &args, &target_columns_missing).await?;

        table_data.merge_columns_from_destination(table_config.columns().get_columns())?;

        let (load_table_id, create_table) = match &options.temp_table_id {
            Some(temp_table_id) => (temp_table_id, true),
            None => (&table_id, false),
        };
        self.destination
            .prepare_temporary_table(
                table_data,
                &table_config,
                load_table_id,
                &table_id,
                create_table,
            )
            .await?;

        info!(
            table = %table_id,
            load_table = %load_table_id,
            rows = table_data.number_of_rows(),
            "appended buffered rows"
        );

        Ok(())
    }

    /// Removes rows sharing a primary key from `table_id`, keeping one row per key.
    ///
    /// The surviving row is the most recent by `__artie_updated_at` when
    /// `include_artie_updated_at` is set. The statements run in one transaction and the
    /// staging table they use is dropped afterwards.
    pub async fn dedupe(
        &self,
        table_id: &TableIdentifier,
        primary_keys: &[String],
        include_artie_updated_at: bool,
    ) -> EtlResult<()> {
        if primary_keys.is_empty() {
            bail!(
                ErrorKind::MissingPrimaryKey,
                "Cannot dedupe a table without primary keys",
                format!("table `{table_id}`")
            );
        }

        let staging_table_id = temp_table_id(table_id);
        let queries = self.destination.dialect().build_dedupe_queries(
            table_id,
            &staging_table_id,
            primary_keys,
            include_artie_updated_at,
        );

        let result = exec_statements(&self.destination, &queries).await;
        let cleanup = drop_temporary_table(&self.destination, &staging_table_id, false).await;
        result.and(cleanup)?;

        info!(table = %table_id, "deduped table");

        Ok(())
    }

    /// Drops expired temporary tables in every schema the topics write to.
    pub async fn sweep(&self, topic_configs: &[TopicConfig]) -> EtlResult<usize> {
        let swept = sweep_temporary_tables(&self.destination, topic_configs).await?;
        if swept > 0 {
            info!(swept, destination = D::name(), "swept expired temporary tables");
        }

        Ok(swept)
    }
}

fn resolve_primary_keys(
    table_data: &TableData,
    table_id: &TableIdentifier,
) -> EtlResult<Vec<Column>> {
    if table_data.primary_keys().is_empty() {
        bail!(
            ErrorKind::MissingPrimaryKey,
            "Table has no primary keys",
            format!("table `{table_id}`")
        );
    }

    table_data
        .primary_keys()
        .iter()
        .map(|key| {
            table_data
                .in_memory_columns()
                .get_column(key)
                .cloned()
                .ok_or_else(|| {
                    etl_error!(
                        ErrorKind::MissingPrimaryKey,
                        "Primary key is not a buffered column",
                        format!("primary key `{key}` of table `{table_id}`")
                    )
                })
        })
        .collect()
}

/// Fails when the destination reports fewer affected rows than were merged.
///
/// Skipped when any statement does not report affected rows.
fn assert_rows_affected(
    results: &[ExecResult],
    expected_rows: usize,
    table_id: &TableIdentifier,
) -> EtlResult<()> {
    let Some(rows_affected) = results
        .iter()
        .map(|result| result.rows_affected)
        .sum::<Option<u64>>()
    else {
        warn!(
            table = %table_id,
            "destination does not report affected rows, skipping merge assertion"
        );
        return Ok(());
    };

    if rows_affected < expected_rows as u64 {
        bail!(
            ErrorKind::MergeAssertionFailed,
            "Merge affected fewer rows than were buffered",
            format!("table `{table_id}`: expected at least {expected_rows}, got {rows_affected}")
        );
    }

    Ok(())
}
