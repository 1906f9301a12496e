use std::collections::HashMap;

use chrono::{DateTime, Utc};
use transfer::buffer::TableData;
use transfer::destination::TableIdentifier;
use transfer::types::markers::DELETE_COLUMN_MARKER;
use transfer::types::{Column, Columns, Kind, Value};
use transfer_config::shared::{Mode, SharedDestinationSettings, TopicConfig};

pub const DATABASE: &str = "db";
pub const SCHEMA: &str = "public";
pub const TABLE: &str = "orders";

pub fn topic_config() -> TopicConfig {
    TopicConfig {
        database: DATABASE.to_string(),
        schema: SCHEMA.to_string(),
        topic: "db.public.orders".to_string(),
        ..TopicConfig::default()
    }
}

pub fn table_id() -> TableIdentifier {
    TableIdentifier::new(DATABASE, SCHEMA, TABLE)
}

pub fn settings() -> SharedDestinationSettings {
    SharedDestinationSettings {
        ddl_max_attempts: 2,
        ddl_retry_initial_delay_ms: 1,
        ddl_retry_max_delay_ms: 1,
        ..SharedDestinationSettings::default()
    }
}

pub fn columns() -> Columns {
    Columns::new([
        Column::new("id", Kind::Integer).with_primary_key(true),
        Column::new("name", Kind::String),
        Column::new(DELETE_COLUMN_MARKER, Kind::Boolean),
    ])
}

pub fn table_data(mode: Mode, topic_config: TopicConfig, columns: Columns) -> TableData {
    TableData::new(mode, TABLE, topic_config, vec!["id".to_string()], columns)
}

pub fn row(id: i64, name: &str) -> HashMap<String, Value> {
    HashMap::from([
        ("id".to_string(), Value::Int(id)),
        ("name".to_string(), Value::from(name)),
    ])
}

pub fn insert(table_data: &mut TableData, id: i64, name: &str, at: DateTime<Utc>) {
    table_data.insert_row(id.to_string(), row(id, name), false);
    table_data.update_latest_cdc_ts(at);
}

pub fn is_temporary_table(statement: &str, prefix: &str) -> bool {
    statement.starts_with(prefix) && statement.contains("___artie_")
}
