use chrono::Utc;
use transfer::ddl::temp_table_id;
use transfer::merge::{AppendOptions, Orchestrator};
use transfer::test_utils::MemoryDestination;
use transfer::types::{Column, Kind};
use transfer_config::shared::{Mode, TopicConfig};
use transfer_telemetry::tracing::init_test_tracing;

use crate::common::{columns, insert, settings, table_data, table_id, topic_config};

#[tokio::test]
async fn append_loads_straight_into_target() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let mut data = table_data(Mode::History, topic_config(), columns());
    insert(&mut data, 1, "dana", Utc::now());
    insert(&mut data, 1, "dana v2", Utc::now());

    orchestrator
        .append(&mut data, &AppendOptions::default())
        .await
        .unwrap();

    let statements = destination.statements().await;
    assert_eq!(
        statements,
        vec![
            r#"CREATE TABLE IF NOT EXISTS "db"."public"."orders" ("id" BIGINT,"name" TEXT)"#.to_string(),
            r#"LOAD INTO "db"."public"."orders""#.to_string(),
        ]
    );

    let loads = destination.loads().await;
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].table_id, table_id());
    assert!(!loads[0].created);
    assert_eq!(loads[0].rows.len(), 2);
    assert!(destination.dropped_tables().await.is_empty());
}

#[tokio::test]
async fn append_into_staging_table_creates_it() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    let orchestrator = Orchestrator::new(destination.clone(), settings());
    let staging = temp_table_id(&table_id());

    let mut data = table_data(Mode::History, topic_config(), columns());
    insert(&mut data, 1, "dana", Utc::now());

    orchestrator
        .append(
            &mut data,
            &AppendOptions {
                temp_table_id: Some(staging.clone()),
            },
        )
        .await
        .unwrap();

    let loads = destination.loads().await;
    assert_eq!(loads[0].table_id, staging);
    assert_eq!(loads[0].parent_table_id, table_id());
    assert!(loads[0].created);

    let statements = destination.statements().await;
    assert_eq!(statements.len(), 3);
    assert!(statements[1].contains(staging.table()));

    // The staging table does not change the target's cached schema.
    let cached = orchestrator.config_map().get(&table_id()).unwrap();
    assert!(cached.columns().get_column("__artie_delete").is_none());
}

#[tokio::test]
async fn append_never_drops_columns() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    destination
        .set_table_columns(
            &table_id(),
            &[
                Column::new("id", Kind::Integer),
                Column::new("name", Kind::String),
                Column::new("__artie_operation", Kind::String),
                Column::new("legacy", Kind::String),
            ],
        )
        .await;
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let config = TopicConfig {
        drop_deleted_columns: true,
        ..topic_config()
    };
    let mut data = table_data(Mode::History, config, columns());
    insert(&mut data, 1, "dana", Utc::now());

    orchestrator
        .append(&mut data, &AppendOptions::default())
        .await
        .unwrap();

    assert_eq!(
        destination.statements().await,
        vec![r#"LOAD INTO "db"."public"."orders""#.to_string()]
    );
    let cached = orchestrator.config_map().get(&table_id()).unwrap();
    assert!(cached.columns_to_delete().is_empty());
}
