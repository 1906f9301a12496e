use std::collections::HashMap;
use std::future::Future;

use transfer_config::shared::DatabaseAndSchemaPair;

use crate::buffer::TableData;
use crate::destination::{Dialect, TableIdentifier};
use crate::error::{EtlError, EtlResult};
use crate::schema::DestinationTableConfig;

/// Outcome of a statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// [`None`] when the destination does not report affected rows.
    pub rows_affected: Option<u64>,
}

/// One row returned by a catalog query, keyed by lower-cased column label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogRow {
    values: HashMap<String, Option<String>>,
}

impl CatalogRow {
    pub fn new<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: AsRef<str>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(label, value)| (label.as_ref().to_lowercase(), value))
                .collect(),
        }
    }

    /// Returns the non-null value of `label`, matched case-insensitively.
    pub fn get(&self, label: &str) -> Option<&str> {
        self.values
            .get(&label.to_lowercase())
            .and_then(|value| value.as_deref())
    }
}

/// An open transaction on a destination.
///
/// Dropping a transaction without committing must not apply its statements.
pub trait Transaction: Send {
    fn exec(&mut self, query: &str) -> impl Future<Output = EtlResult<ExecResult>> + Send;

    fn commit(self) -> impl Future<Output = EtlResult<()>> + Send;

    fn rollback(self) -> impl Future<Output = EtlResult<()>> + Send;
}

/// A warehouse that buffered tables are merged into.
///
/// Implementations own their connection handling. Every SQL string they receive was built by
/// their [`Dialect`].
pub trait Destination: Send + Sync {
    type Dialect: Dialect;

    type Transaction: Transaction;

    /// Returns the name of the destination.
    fn name() -> &'static str;

    fn dialect(&self) -> &Self::Dialect;

    /// Resolves the identifier of `table` for a topic's database and schema.
    fn identifier_for(&self, pair: &DatabaseAndSchemaPair, table: &str) -> TableIdentifier;

    fn exec(&self, query: &str) -> impl Future<Output = EtlResult<ExecResult>> + Send;

    fn query(&self, query: &str) -> impl Future<Output = EtlResult<Vec<CatalogRow>>> + Send;

    fn begin(&self) -> impl Future<Output = EtlResult<Self::Transaction>> + Send;

    /// Loads the buffered rows into `temp_table_id` through the destination's bulk-load path.
    ///
    /// When `create_temp_table` is set the table is created first, with the buffer's in-memory
    /// columns (the delete marker included) and an expiry matching the name's timestamp where
    /// supported. `table_config` only carries the target's cached schema.
    fn prepare_temporary_table(
        &self,
        table_data: &TableData,
        table_config: &DestinationTableConfig,
        temp_table_id: &TableIdentifier,
        parent_table_id: &TableIdentifier,
        create_temp_table: bool,
    ) -> impl Future<Output = EtlResult<()>> + Send;

    fn drop_table(&self, table_id: &TableIdentifier) -> impl Future<Output = EtlResult<()>> + Send {
        async move {
            let query = format!(
                "DROP TABLE IF EXISTS {}",
                table_id.fully_qualified_name(self.dialect())
            );
            self.exec(&query).await?;

            Ok(())
        }
    }

    /// Returns `true` if the connection should be re-established and the flush retried.
    fn is_retryable_error(&self, _err: &EtlError) -> bool {
        false
    }
}
