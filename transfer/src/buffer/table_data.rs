use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::debug;
use transfer_config::shared::{BufferConfig, Mode, TopicConfig};

use crate::bail;
use crate::buffer::row::{Row, approx_row_size};
use crate::ddl::random_suffix;
use crate::error::{ErrorKind, EtlResult};
use crate::types::markers::{
    DATABASE_UPDATED_AT_COLUMN_MARKER, DELETE_COLUMN_MARKER,
    FULL_SOURCE_TABLE_NAME_COLUMN_MARKER, ONLY_SET_DELETE_COLUMN_MARKER,
    OPERATION_COLUMN_MARKER, SOURCE_METADATA_COLUMN_MARKER, UPDATED_AT_COLUMN_MARKER,
};
use crate::types::{Column, Columns, Kind, Value};

/// Why a buffer should be flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    Rows,
    Size,
}

impl FlushReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushReason::Rows => "rows",
            FlushReason::Size => "size",
        }
    }
}

impl fmt::Display for FlushReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
enum RowStore {
    /// Latest row per primary key.
    Keyed(HashMap<String, Row>),
    /// Every row in arrival order.
    Appended(Vec<Row>),
}

/// Buffered changes for one destination table.
///
/// In replication mode rows are keyed by their primary key string and successive events for
/// the same key are folded into one row. In history mode every event is appended.
///
/// A buffer is owned by a single flush cycle at a time and performs no locking.
#[derive(Debug)]
pub struct TableData {
    mode: Mode,
    name: String,
    topic_config: TopicConfig,
    primary_keys: Vec<String>,
    in_memory_columns: Columns,
    rows: RowStore,
    approx_size: usize,
    latest_cdc_ts: Option<DateTime<Utc>>,
    /// Set once any non-delete event was buffered. A delete-only batch never drops columns.
    contain_other_operations: bool,
    contains_hard_deletes: bool,
    temporary_table_suffix: String,
}

impl TableData {
    /// Creates an empty buffer. A non-empty `primary_keys_override` on the topic replaces
    /// `primary_keys`.
    pub fn new(
        mode: Mode,
        name: impl Into<String>,
        topic_config: TopicConfig,
        primary_keys: Vec<String>,
        in_memory_columns: Columns,
    ) -> Self {
        let primary_keys = if topic_config.primary_keys_override.is_empty() {
            primary_keys
        } else {
            topic_config.primary_keys_override.clone()
        };

        let rows = match mode {
            Mode::Replication => RowStore::Keyed(HashMap::new()),
            Mode::History => RowStore::Appended(Vec::new()),
        };

        Self {
            mode,
            name: name.into(),
            topic_config,
            primary_keys,
            in_memory_columns,
            rows,
            approx_size: 0,
            latest_cdc_ts: None,
            contain_other_operations: false,
            contains_hard_deletes: false,
            temporary_table_suffix: random_suffix(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Destination table name, honoring the topic's override.
    pub fn name(&self) -> &str {
        self.topic_config.table_name.as_deref().unwrap_or(&self.name)
    }

    pub fn topic_config(&self) -> &TopicConfig {
        &self.topic_config
    }

    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    pub fn in_memory_columns(&self) -> &Columns {
        &self.in_memory_columns
    }

    pub fn add_in_memory_column(&mut self, column: Column) {
        self.in_memory_columns.add_column(column);
    }

    pub fn upsert_in_memory_column(&mut self, column: Column) {
        self.in_memory_columns.upsert_column(column);
    }

    pub fn approx_size(&self) -> usize {
        self.approx_size
    }

    pub fn latest_cdc_ts(&self) -> Option<DateTime<Utc>> {
        self.latest_cdc_ts
    }

    /// Advances the latest event time. Older timestamps are ignored.
    pub fn update_latest_cdc_ts(&mut self, ts: DateTime<Utc>) {
        if self.latest_cdc_ts.is_none_or(|latest| ts > latest) {
            self.latest_cdc_ts = Some(ts);
        }
    }

    pub fn contain_other_operations(&self) -> bool {
        self.contain_other_operations
    }

    pub fn contains_hard_deletes(&self) -> bool {
        self.contains_hard_deletes
    }

    pub fn temporary_table_suffix(&self) -> &str {
        &self.temporary_table_suffix
    }

    pub fn number_of_rows(&self) -> usize {
        match &self.rows {
            RowStore::Keyed(rows) => rows.len(),
            RowStore::Appended(rows) => rows.len(),
        }
    }

    /// Returns `true` when there is nothing to flush.
    pub fn should_skip_update(&self) -> bool {
        self.number_of_rows() == 0 || self.in_memory_columns.is_empty()
    }

    /// Returns the buffered rows. Keyed rows come back in no particular order.
    pub fn rows(&self) -> Vec<&Row> {
        match &self.rows {
            RowStore::Keyed(rows) => rows.values().collect(),
            RowStore::Appended(rows) => rows.iter().collect(),
        }
    }

    /// Returns the row buffered for `key`. Always [`None`] in history mode.
    pub fn row(&self, key: &str) -> Option<&Row> {
        match &self.rows {
            RowStore::Keyed(rows) => rows.get(key),
            RowStore::Appended(_) => None,
        }
    }

    /// Folds one change event into the buffer.
    ///
    /// TOAST placeholders are resolved from the row previously buffered for `key`. A delete for
    /// a known key keeps every previously observed column missing from its payload, and keeps
    /// the previous row's only-set-delete flag so a redelivered delete changes nothing.
    pub fn insert_row(
        &mut self,
        key: impl Into<String>,
        mut values: HashMap<String, Value>,
        delete: bool,
    ) {
        // The merge reads the marker to tell deletes apart, soft or hard.
        values
            .entry(DELETE_COLUMN_MARKER.to_string())
            .or_insert(Value::Bool(delete));

        match &mut self.rows {
            RowStore::Appended(rows) => {
                let row = Row::new(values);
                self.approx_size = self.approx_size.saturating_add(row.approx_size());
                rows.push(row);
            }
            RowStore::Keyed(rows) => {
                let key = key.into();
                let mut previous_size = 0;

                if let Some(previous) = rows.get(&key) {
                    previous_size = previous.approx_size();

                    for (column, value) in values.iter_mut() {
                        if value.is_toast_unavailable()
                            && let Some(previous_value) = previous.get(column)
                        {
                            *value = previous_value.clone();
                        }
                    }

                    if delete {
                        for (column, previous_value) in previous.values() {
                            if !values.contains_key(column) {
                                values.insert(column.clone(), previous_value.clone());
                            }
                        }

                        if let Some(only_set_delete) = previous.get(ONLY_SET_DELETE_COLUMN_MARKER) {
                            values.insert(
                                ONLY_SET_DELETE_COLUMN_MARKER.to_string(),
                                only_set_delete.clone(),
                            );
                        }
                    }
                }

                let row = Row::new(values);
                self.approx_size = self
                    .approx_size
                    .saturating_sub(previous_size)
                    .saturating_add(row.approx_size());
                rows.insert(key, row);
            }
        }

        if !delete {
            self.contain_other_operations = true;
        } else if !self.topic_config.soft_delete {
            self.contains_hard_deletes = true;
        }
    }

    /// Returns why the buffer should be flushed now, if it should.
    ///
    /// The row threshold is checked before the size threshold.
    pub fn should_flush(&self, config: &BufferConfig) -> Option<FlushReason> {
        if self.number_of_rows() as u64 > config.buffer_rows {
            return Some(FlushReason::Rows);
        }

        if self.approx_size as u64 > config.flush_size_bytes() {
            return Some(FlushReason::Size);
        }

        None
    }

    /// Adopts the destination's view of every in-memory column it also knows.
    ///
    /// The destination is authoritative for kind, string precision, integer width, decimal
    /// details and the backfilled flag. An in-memory decimal keeps its kind when the
    /// destination reports an integer, since NUMERIC values without a fractional part are
    /// read back as integers.
    pub fn merge_columns_from_destination(
        &mut self,
        destination_columns: &[Column],
    ) -> EtlResult<()> {
        let matches = self
            .in_memory_columns
            .get_columns()
            .iter()
            .filter_map(|column| {
                destination_columns
                    .iter()
                    .find(|destination| destination.has_name(column.name()))
            })
            .collect::<Vec<_>>();

        if let Some(invalid) = matches.iter().find(|column| column.kind_details.is_invalid()) {
            bail!(
                ErrorKind::SchemaIntegrity,
                "Destination column has an invalid kind",
                format!("column `{}` of table `{}`", invalid.name(), self.name())
            );
        }

        for column in self.in_memory_columns.iter_mut() {
            let Some(found) = matches.iter().find(|found| found.has_name(column.name())) else {
                continue;
            };

            let keep_decimal = column.kind() == Kind::Decimal && found.kind() == Kind::Integer;
            if !keep_decimal {
                column.kind_details.kind = found.kind();
                if found.kind_details.optional_string_precision.is_some() {
                    column.kind_details.optional_string_precision =
                        found.kind_details.optional_string_precision;
                }
                if found.kind_details.optional_integer_kind.is_some() {
                    column.kind_details.optional_integer_kind =
                        found.kind_details.optional_integer_kind;
                }
                column.kind_details.extended_decimal_details =
                    found.kind_details.extended_decimal_details;
            }

            column.set_backfilled(found.backfilled());
        }

        Ok(())
    }

    /// Returns the bookkeeping columns this table writes to the destination.
    pub fn build_columns_to_keep(&self) -> Vec<String> {
        let config = &self.topic_config;
        let mut columns = Vec::new();

        if config.soft_delete {
            columns.push(DELETE_COLUMN_MARKER.to_string());
        }
        if config.include_artie_updated_at {
            columns.push(UPDATED_AT_COLUMN_MARKER.to_string());
        }
        if config.include_database_updated_at {
            columns.push(DATABASE_UPDATED_AT_COLUMN_MARKER.to_string());
        }
        if self.mode == Mode::History || config.include_artie_operation {
            columns.push(OPERATION_COLUMN_MARKER.to_string());
        }
        if config.include_source_metadata {
            columns.push(SOURCE_METADATA_COLUMN_MARKER.to_string());
        }
        if config.include_full_source_table_name {
            columns.push(FULL_SOURCE_TABLE_NAME_COLUMN_MARKER.to_string());
        }

        columns
    }

    /// Clears buffered rows after a successful flush and draws a new temporary table suffix.
    ///
    /// Columns and operation flags are kept.
    pub fn wipe(&mut self) {
        match &mut self.rows {
            RowStore::Keyed(rows) => rows.clear(),
            RowStore::Appended(rows) => rows.clear(),
        }
        self.approx_size = 0;
        self.temporary_table_suffix = random_suffix();

        debug!(table = self.name(), "wiped buffered rows");
    }

    /// Recomputes the buffer size from scratch.
    pub fn recompute_approx_size(&self) -> usize {
        self.rows()
            .into_iter()
            .map(|row| approx_row_size(row.values()))
            .sum()
    }
}
