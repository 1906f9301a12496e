use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;
use transfer_config::shared::{DatabaseAndSchemaPair, SharedDestinationSettings};

use crate::buffer::TableData;
use crate::ddl::{AlterTableArgs, alter_table};
use crate::destination::{
    CatalogRow, ColumnOperation, Destination, Dialect, ExecResult, TableIdentifier, Transaction,
};
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
use crate::schema::DestinationTableConfig;
use crate::test_utils::TestDialect;
use crate::types::{Column, Value};

/// Final state of a transaction opened on a [`MemoryDestination`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    Open,
    Committed,
    RolledBack,
}

/// Statements executed inside one transaction, including the one that failed.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub statements: Vec<String>,
    pub outcome: TransactionOutcome,
}

/// Rows loaded through [`Destination::prepare_temporary_table`].
#[derive(Debug, Clone)]
pub struct LoadRecord {
    pub table_id: TableIdentifier,
    pub parent_table_id: TableIdentifier,
    pub created: bool,
    pub rows: Vec<HashMap<String, Value>>,
}

#[derive(Debug)]
struct Failure {
    pattern: String,
    message: String,
    /// [`None`] fails forever.
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct Inner {
    statements: Vec<String>,
    queries: Vec<String>,
    transactions: Vec<TransactionRecord>,
    failures: Vec<Failure>,
    retryable_error_message: Option<String>,
    rows_affected: Option<u64>,
    /// Describe rows keyed by fully qualified table name.
    tables: HashMap<String, Vec<CatalogRow>>,
    query_results: Vec<(String, Vec<CatalogRow>)>,
    dropped_tables: Vec<TableIdentifier>,
    loads: Vec<LoadRecord>,
}

impl Inner {
    /// Returns the injected error for `query`, consuming one use of it.
    fn take_failure(&mut self, query: &str) -> Option<EtlError> {
        let failure = self.failures.iter_mut().find(|failure| {
            query.contains(&failure.pattern) && failure.remaining.is_none_or(|left| left > 0)
        })?;

        if let Some(remaining) = failure.remaining.as_mut() {
            *remaining -= 1;
        }

        Some(etl_error!(
            ErrorKind::DestinationQueryFailed,
            "Query failed",
            failure.message.clone()
        ))
    }
}

/// In-memory destination for tests.
///
/// Every statement is recorded in execution order, failed ones included. The catalog is
/// configured up front: tables registered through [`MemoryDestination::set_table_columns`]
/// answer describe queries, any other table reports that it does not exist. Failures are
/// injected by statement substring.
#[derive(Debug, Clone)]
pub struct MemoryDestination {
    dialect: TestDialect,
    inner: Arc<RwLock<Inner>>,
}

impl Default for MemoryDestination {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::with_dialect(TestDialect::default())
    }

    pub fn with_dialect(dialect: TestDialect) -> Self {
        Self {
            dialect,
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Returns every executed statement, including statements run in transactions.
    pub async fn statements(&self) -> Vec<String> {
        self.inner.read().await.statements.clone()
    }

    /// Returns every catalog query.
    pub async fn queries(&self) -> Vec<String> {
        self.inner.read().await.queries.clone()
    }

    pub async fn clear_statements(&self) {
        let mut inner = self.inner.write().await;
        inner.statements.clear();
        inner.queries.clear();
    }

    pub async fn transactions(&self) -> Vec<TransactionRecord> {
        self.inner.read().await.transactions.clone()
    }

    pub async fn dropped_tables(&self) -> Vec<TableIdentifier> {
        self.inner.read().await.dropped_tables.clone()
    }

    pub async fn loads(&self) -> Vec<LoadRecord> {
        self.inner.read().await.loads.clone()
    }

    /// Fails every statement containing `pattern` with `message`.
    pub async fn fail_on(&self, pattern: &str, message: &str) {
        self.push_failure(pattern, message, None).await;
    }

    /// Fails the next `times` statements containing `pattern` with `message`.
    pub async fn fail_times(&self, pattern: &str, message: &str, times: usize) {
        self.push_failure(pattern, message, Some(times)).await;
    }

    async fn push_failure(&self, pattern: &str, message: &str, remaining: Option<usize>) {
        self.inner.write().await.failures.push(Failure {
            pattern: pattern.to_string(),
            message: message.to_string(),
            remaining,
        });
    }

    /// Errors mentioning `message` are reported as retryable.
    pub async fn set_retryable_error_message(&self, message: &str) {
        self.inner.write().await.retryable_error_message = Some(message.to_string());
    }

    /// Sets the affected row count reported for every statement.
    pub async fn set_rows_affected(&self, rows_affected: Option<u64>) {
        self.inner.write().await.rows_affected = rows_affected;
    }

    /// Registers `table_id` in the catalog with `columns`.
    ///
    /// Backfilled columns carry the backfill comment.
    pub async fn set_table_columns(&self, table_id: &TableIdentifier, columns: &[Column]) {
        let rows = columns
            .iter()
            .map(|column| {
                let data_type = self
                    .dialect
                    .data_type_for_kind(&column.kind_details, column.is_primary_key());
                let description = column
                    .backfilled()
                    .then(|| r#"{"backfilled": true}"#.to_string());

                CatalogRow::new([
                    ("column_name", Some(column.name().to_string())),
                    ("data_type", Some(data_type)),
                    ("description", description),
                    ("default_value", None),
                ])
            })
            .collect();

        self.set_describe_rows(table_id, rows).await;
    }

    /// Registers `table_id` in the catalog with raw describe rows.
    pub async fn set_describe_rows(&self, table_id: &TableIdentifier, rows: Vec<CatalogRow>) {
        let key = table_id.fully_qualified_name(&self.dialect);
        self.inner.write().await.tables.insert(key, rows);
    }

    /// Answers catalog queries containing `pattern` with `rows`.
    pub async fn set_query_result(&self, pattern: &str, rows: Vec<CatalogRow>) {
        self.inner
            .write()
            .await
            .query_results
            .push((pattern.to_string(), rows));
    }

    /// Lists `tables` in the sweep catalog of `database`.`schema`.
    pub async fn set_catalog_tables(&self, database: &str, schema: &str, tables: &[String]) {
        let rows = tables
            .iter()
            .map(|table| {
                CatalogRow::new([
                    ("table_name", Some(table.clone())),
                    ("table_schema", Some(schema.to_string())),
                ])
            })
            .collect();

        let pattern = format!(
            "table_catalog = {} AND table_schema = {}",
            self.dialect.quote_literal(database),
            self.dialect.quote_literal(schema)
        );
        self.set_query_result(&pattern, rows).await;
    }

    async fn record(&self, query: &str) -> EtlResult<ExecResult> {
        let mut inner = self.inner.write().await;
        inner.statements.push(query.to_string());

        if let Some(err) = inner.take_failure(query) {
            return Err(err);
        }

        Ok(ExecResult {
            rows_affected: inner.rows_affected,
        })
    }
}

impl Destination for MemoryDestination {
    type Dialect = TestDialect;

    type Transaction = MemoryTransaction;

    fn name() -> &'static str {
        "memory"
    }

    fn dialect(&self) -> &Self::Dialect {
        &self.dialect
    }

    fn identifier_for(&self, pair: &DatabaseAndSchemaPair, table: &str) -> TableIdentifier {
        TableIdentifier::new(&pair.database, &pair.schema, table)
    }

    async fn exec(&self, query: &str) -> EtlResult<ExecResult> {
        self.record(query).await
    }

    async fn query(&self, query: &str) -> EtlResult<Vec<CatalogRow>> {
        let mut inner = self.inner.write().await;
        inner.queries.push(query.to_string());

        if let Some(err) = inner.take_failure(query) {
            return Err(err);
        }

        if let Some(table) = query.strip_prefix("DESCRIBE TABLE ") {
            return match inner.tables.get(table) {
                Some(rows) => Ok(rows.clone()),
                None => Err(etl_error!(
                    ErrorKind::DestinationQueryFailed,
                    "Query failed",
                    format!("relation {table} does not exist")
                )),
            };
        }

        Ok(inner
            .query_results
            .iter()
            .find(|(pattern, _)| query.contains(pattern.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn begin(&self) -> EtlResult<Self::Transaction> {
        let mut inner = self.inner.write().await;
        inner.transactions.push(TransactionRecord {
            statements: Vec::new(),
            outcome: TransactionOutcome::Open,
        });

        Ok(MemoryTransaction {
            destination: self.clone(),
            index: inner.transactions.len() - 1,
        })
    }

    async fn prepare_temporary_table(
        &self,
        table_data: &TableData,
        table_config: &DestinationTableConfig,
        temp_table_id: &TableIdentifier,
        parent_table_id: &TableIdentifier,
        create_temp_table: bool,
    ) -> EtlResult<()> {
        if create_temp_table {
            let settings = SharedDestinationSettings::default();
            let args = AlterTableArgs {
                table_id: temp_table_id,
                table_config,
                settings: &settings,
                mode: table_data.mode(),
                create_table: true,
                temporary_table: true,
                operation: ColumnOperation::Add,
                cdc_time: Utc::now(),
                contain_other_operations: true,
            };
            alter_table(self, &args, table_data.in_memory_columns().get_columns()).await?;
        }

        let query = format!("LOAD INTO {}", temp_table_id.fully_qualified_name(&self.dialect));
        self.record(&query).await?;

        let rows = table_data
            .rows()
            .into_iter()
            .map(|row| row.values().clone())
            .collect::<Vec<_>>();
        info!(table = %temp_table_id, rows = rows.len(), "loaded rows");

        self.inner.write().await.loads.push(LoadRecord {
            table_id: temp_table_id.clone(),
            parent_table_id: parent_table_id.clone(),
            created: create_temp_table,
            rows,
        });

        Ok(())
    }

    async fn drop_table(&self, table_id: &TableIdentifier) -> EtlResult<()> {
        let query = format!(
            "DROP TABLE IF EXISTS {}",
            table_id.fully_qualified_name(&self.dialect)
        );
        self.record(&query).await?;
        self.inner.write().await.dropped_tables.push(table_id.clone());

        Ok(())
    }

    fn is_retryable_error(&self, err: &EtlError) -> bool {
        // No caller holds the lock while classifying an error.
        self.inner
            .try_read()
            .ok()
            .and_then(|inner| inner.retryable_error_message.clone())
            .is_some_and(|message| err.mentions(&message))
    }
}

/// Transaction on a [`MemoryDestination`].
#[derive(Debug)]
pub struct MemoryTransaction {
    destination: MemoryDestination,
    index: usize,
}

impl MemoryTransaction {
    async fn finish(self, outcome: TransactionOutcome) {
        if let Some(record) = self
            .destination
            .inner
            .write()
            .await
            .transactions
            .get_mut(self.index)
        {
            record.outcome = outcome;
        }
    }
}

impl Transaction for MemoryTransaction {
    async fn exec(&mut self, query: &str) -> EtlResult<ExecResult> {
        if let Some(record) = self
            .destination
            .inner
            .write()
            .await
            .transactions
            .get_mut(self.index)
        {
            record.statements.push(query.to_string());
        }

        self.destination.record(query).await
    }

    async fn commit(self) -> EtlResult<()> {
        self.finish(TransactionOutcome::Committed).await;
        Ok(())
    }

    async fn rollback(self) -> EtlResult<()> {
        self.finish(TransactionOutcome::RolledBack).await;
        Ok(())
    }
}
