use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::destination::{ColumnOperation, TableIdentifier};
use crate::types::{Column, Columns};

/// Hours a column must stay missing from the source before it is dropped.
pub const DELETION_CONFIDENCE_PADDING_HOURS: i64 = 4;

#[derive(Debug)]
struct TableConfigState {
    columns: Columns,
    /// Column name to the instant after which it may be dropped.
    columns_to_delete: HashMap<String, DateTime<Utc>>,
    create_table: bool,
    drop_deleted_columns: bool,
}

/// Cached view of one destination table's schema.
///
/// Mutated in place after each successful DDL statement. All access goes through an internal
/// lock, so one instance can be shared by concurrent flushes.
#[derive(Debug)]
pub struct DestinationTableConfig {
    state: RwLock<TableConfigState>,
}

impl DestinationTableConfig {
    /// Creates a config. An empty column set means the table still has to be created.
    pub fn new(columns: Vec<Column>, drop_deleted_columns: bool) -> Self {
        let create_table = columns.is_empty();
        Self {
            state: RwLock::new(TableConfigState {
                columns: Columns::new(columns),
                columns_to_delete: HashMap::new(),
                create_table,
                drop_deleted_columns,
            }),
        }
    }

    pub fn create_table(&self) -> bool {
        self.state.read().create_table
    }

    pub fn drop_deleted_columns(&self) -> bool {
        self.state.read().drop_deleted_columns
    }

    /// Returns a snapshot of the known columns.
    pub fn columns(&self) -> Columns {
        self.state.read().columns.clone()
    }

    pub fn columns_to_delete(&self) -> HashMap<String, DateTime<Utc>> {
        self.state.read().columns_to_delete.clone()
    }

    /// Decides whether a column missing from the source may be dropped now.
    ///
    /// The first sighting only records a deadline `now + padding`; the column is dropped once an
    /// event newer than that deadline still lacks it. Batches made only of deletes never drop
    /// columns, since deletes carry little more than primary keys.
    pub fn should_delete_column(
        &self,
        name: &str,
        cdc_time: DateTime<Utc>,
        contain_other_operations: bool,
    ) -> bool {
        if !contain_other_operations {
            return false;
        }

        let mut state = self.state.write();
        if !state.drop_deleted_columns {
            return false;
        }

        if let Some(delete_after) = state.columns_to_delete.get(name) {
            return cdc_time > *delete_after;
        }

        let delete_after = Utc::now() + TimeDelta::hours(DELETION_CONFIDENCE_PADDING_HOURS);
        info!(column = name, %delete_after, "column scheduled for deletion");
        state.columns_to_delete.insert(name.to_string(), delete_after);

        false
    }

    /// Applies a successful DDL operation to the cached schema.
    ///
    /// Added columns are inserted or overwritten and lose any pending deletion; the table is
    /// no longer considered missing. Deleted columns are removed along with their deadline.
    pub fn mutate_in_memory_columns(&self, operation: ColumnOperation, columns: &[Column]) {
        let mut state = self.state.write();
        match operation {
            ColumnOperation::Add => {
                for column in columns {
                    state.columns.upsert_column(column.clone());
                    state.columns_to_delete.remove(column.name());
                }
                state.create_table = false;
            }
            ColumnOperation::Delete => {
                for column in columns {
                    state.columns.delete_column(column.name());
                    state.columns_to_delete.remove(column.name());
                }
            }
        }
    }

    /// Records the backfill state of a column. Unknown columns are ignored.
    pub fn upsert_column_backfilled(&self, name: &str, backfilled: bool) {
        if !self.state.write().columns.set_backfilled(name, backfilled) {
            debug!(column = name, "backfilled column is not in the table config");
        }
    }

    /// Discards pending deletions for columns that are no longer missing, so a column that
    /// reappears restarts its debounce.
    pub fn audit_columns_to_delete(&self, columns_missing: &[Column]) {
        let mut state = self.state.write();
        if !state.drop_deleted_columns {
            return;
        }

        state
            .columns_to_delete
            .retain(|name, _| columns_missing.iter().any(|column| column.has_name(name)));
    }
}

/// Process-wide cache of [`DestinationTableConfig`]s keyed by table identity.
///
/// Cheap to clone. The outer lock is held only to look up or insert an entry, so flushes of
/// different tables never wait on each other.
#[derive(Debug, Clone, Default)]
pub struct DestinationTableConfigMap {
    configs: Arc<RwLock<HashMap<String, Arc<DestinationTableConfig>>>>,
}

impl DestinationTableConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table_id: &TableIdentifier) -> Option<Arc<DestinationTableConfig>> {
        self.configs.read().get(&table_id.to_string()).cloned()
    }

    /// Stores `config` unless another flush already stored one, returning the cached entry.
    pub fn insert(
        &self,
        table_id: &TableIdentifier,
        config: DestinationTableConfig,
    ) -> Arc<DestinationTableConfig> {
        self.configs
            .write()
            .entry(table_id.to_string())
            .or_insert_with(|| Arc::new(config))
            .clone()
    }

    /// Forgets a table, forcing the next access to introspect it again.
    pub fn remove(&self, table_id: &TableIdentifier) {
        self.configs.write().remove(&table_id.to_string());
    }

    pub fn len(&self) -> usize {
        self.configs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.read().is_empty()
    }
}
