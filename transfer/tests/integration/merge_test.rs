use chrono::{TimeDelta, Utc};
use transfer::buffer::TableData;
use transfer::destination::TableIdentifier;
use transfer::error::ErrorKind;
use transfer::merge::{MergeOptions, Orchestrator};
use transfer::test_utils::{MemoryDestination, TestDialect, TransactionOutcome};
use transfer::types::markers::DELETE_COLUMN_MARKER;
use transfer::types::{Column, Columns, Kind, Value};
use transfer_config::shared::{Mode, SharedDestinationSettings, TopicConfig};
use transfer_telemetry::tracing::init_test_tracing;

use crate::common::{
    DATABASE, SCHEMA, columns, insert, is_temporary_table, settings, table_data, table_id,
    topic_config,
};

#[tokio::test]
async fn merge_creates_missing_table_and_cleans_up_temporary_table() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let mut data = table_data(Mode::Replication, topic_config(), columns());
    insert(&mut data, 1, "dana", Utc::now());
    insert(&mut data, 2, "sam", Utc::now());

    orchestrator.merge(&mut data, &MergeOptions::default()).await.unwrap();

    let statements = destination.statements().await;
    assert_eq!(statements.len(), 5, "{statements:#?}");
    assert_eq!(
        statements[0],
        r#"CREATE TABLE IF NOT EXISTS "db"."public"."orders" ("id" BIGINT,"name" TEXT,PRIMARY KEY ("id"))"#
    );
    assert!(is_temporary_table(&statements[1], r#"CREATE TABLE IF NOT EXISTS "db"."public"."orders___artie_"#));
    assert!(statements[1].contains(r#""__artie_delete" BOOLEAN"#));
    assert!(statements[2].starts_with("LOAD INTO"));
    assert!(statements[3].starts_with(r#"MERGE INTO "db"."public"."orders" tgt"#));
    assert!(!statements[3].contains("THEN DELETE"));
    assert!(statements[4].starts_with("DROP TABLE IF EXISTS"));

    let dropped = destination.dropped_tables().await;
    assert_eq!(dropped.len(), 1);
    assert!(dropped[0].is_temporary());
    assert!(dropped[0].table().contains(data.temporary_table_suffix()));

    let loads = destination.loads().await;
    assert_eq!(loads[0].rows.len(), 2);
    assert_eq!(loads[0].parent_table_id, table_id());

    let config = orchestrator.config_map().get(&table_id()).unwrap();
    assert!(!config.create_table());
    assert_eq!(config.columns().len(), 2);
}

#[tokio::test]
async fn merge_adds_new_columns_and_reuses_cached_config() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    destination
        .set_table_columns(
            &table_id(),
            &[
                Column::new("id", Kind::Integer).with_primary_key(true),
                Column::new("name", Kind::String),
            ],
        )
        .await;
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let mut in_memory = columns();
    in_memory.add_column(Column::new("total", Kind::Float));
    let mut data = table_data(Mode::Replication, topic_config(), in_memory);
    insert(&mut data, 1, "dana", Utc::now());

    orchestrator.merge(&mut data, &MergeOptions::default()).await.unwrap();
    data.wipe();
    insert(&mut data, 2, "sam", Utc::now());
    orchestrator.merge(&mut data, &MergeOptions::default()).await.unwrap();

    let statements = destination.statements().await;
    let alters = statements
        .iter()
        .filter(|statement| statement.starts_with("ALTER TABLE"))
        .collect::<Vec<_>>();
    assert_eq!(
        alters,
        vec![r#"ALTER TABLE "db"."public"."orders" ADD COLUMN "total" DOUBLE"#]
    );

    let describes = destination
        .queries()
        .await
        .into_iter()
        .filter(|query| query.starts_with("DESCRIBE TABLE"))
        .count();
    assert_eq!(describes, 1);
}

#[tokio::test]
async fn failed_merge_still_drops_temporary_table() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    destination.fail_on("MERGE INTO", "syntax error at or near MERGE").await;
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let mut data = table_data(Mode::Replication, topic_config(), columns());
    insert(&mut data, 1, "dana", Utc::now());

    let err = orchestrator
        .merge(&mut data, &MergeOptions::default())
        .await
        .unwrap_err();

    assert!(err.mentions("syntax error"));
    assert_eq!(destination.dropped_tables().await.len(), 1);
    assert_eq!(data.number_of_rows(), 1);
}

#[tokio::test]
async fn failed_load_still_drops_temporary_table() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    destination.fail_on("LOAD INTO", "bucket not found").await;
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let mut data = table_data(Mode::Replication, topic_config(), columns());
    insert(&mut data, 1, "dana", Utc::now());

    let err = orchestrator
        .merge(&mut data, &MergeOptions::default())
        .await
        .unwrap_err();

    assert!(err.mentions("bucket not found"));
    assert!(
        !destination
            .statements()
            .await
            .iter()
            .any(|statement| statement.starts_with("MERGE INTO"))
    );
    assert_eq!(destination.dropped_tables().await.len(), 1);
}

#[tokio::test]
async fn cleanup_failure_does_not_fail_the_merge() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    destination.fail_on("DROP TABLE", "permission denied").await;
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let mut data = table_data(Mode::Replication, topic_config(), columns());
    insert(&mut data, 1, "dana", Utc::now());

    orchestrator.merge(&mut data, &MergeOptions::default()).await.unwrap();

    assert!(destination.dropped_tables().await.is_empty());
}

#[tokio::test]
async fn hard_deletes_are_merged_with_delete_clause() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let mut data = table_data(Mode::Replication, topic_config(), columns());
    insert(&mut data, 1, "dana", Utc::now());
    data.insert_row("2", crate::common::row(2, "sam"), true);

    orchestrator.merge(&mut data, &MergeOptions::default()).await.unwrap();

    let merge = destination
        .statements()
        .await
        .into_iter()
        .find(|statement| statement.starts_with("MERGE INTO"))
        .unwrap();
    assert!(merge.contains(r#"WHEN MATCHED AND stg."__artie_delete" THEN DELETE"#));

    let load = &destination.loads().await[0];
    let deleted = load
        .rows
        .iter()
        .find(|row| row.get("id") == Some(&Value::Int(2)))
        .unwrap();
    assert_eq!(deleted.get(DELETE_COLUMN_MARKER), Some(&Value::Bool(true)));
}

#[tokio::test]
async fn soft_delete_tables_keep_the_delete_marker_column() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let config = TopicConfig {
        soft_delete: true,
        ..topic_config()
    };
    let mut data = table_data(Mode::Replication, config, columns());
    insert(&mut data, 1, "dana", Utc::now());
    data.insert_row("1", crate::common::row(1, "dana"), true);

    orchestrator.merge(&mut data, &MergeOptions::default()).await.unwrap();

    let statements = destination.statements().await;
    assert!(statements[0].contains(r#""__artie_delete" BOOLEAN"#));
    assert!(!data.contains_hard_deletes());
    let merge = statements
        .iter()
        .find(|statement| statement.starts_with("MERGE INTO"))
        .unwrap();
    assert!(!merge.contains("THEN DELETE"));
}

#[tokio::test]
async fn columns_are_dropped_only_after_confidence_padding() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    destination
        .set_table_columns(
            &table_id(),
            &[
                Column::new("id", Kind::Integer).with_primary_key(true),
                Column::new("name", Kind::String),
                Column::new("legacy", Kind::String),
            ],
        )
        .await;
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let config = TopicConfig {
        drop_deleted_columns: true,
        ..topic_config()
    };
    let mut data = table_data(Mode::Replication, config, columns());
    insert(&mut data, 1, "dana", Utc::now());

    orchestrator.merge(&mut data, &MergeOptions::default()).await.unwrap();
    let drops = |statements: Vec<String>| {
        statements
            .into_iter()
            .filter(|statement| statement.contains("DROP COLUMN"))
            .collect::<Vec<_>>()
    };
    assert!(drops(destination.statements().await).is_empty());

    let cached = orchestrator.config_map().get(&table_id()).unwrap();
    assert!(cached.columns_to_delete().contains_key("legacy"));

    data.wipe();
    insert(&mut data, 2, "sam", Utc::now() + TimeDelta::hours(5));
    orchestrator.merge(&mut data, &MergeOptions::default()).await.unwrap();

    assert_eq!(
        drops(destination.statements().await),
        vec![r#"ALTER TABLE "db"."public"."orders" DROP COLUMN "legacy""#.to_string()]
    );
    assert!(cached.columns().get_column("legacy").is_none());
}

#[tokio::test]
async fn reappearing_column_restarts_the_drop_debounce() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    destination
        .set_table_columns(
            &table_id(),
            &[
                Column::new("id", Kind::Integer).with_primary_key(true),
                Column::new("name", Kind::String),
                Column::new("legacy", Kind::String),
            ],
        )
        .await;
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let config = TopicConfig {
        drop_deleted_columns: true,
        ..topic_config()
    };
    let t0 = Utc::now();

    let mut without_legacy = table_data(Mode::Replication, config.clone(), columns());
    insert(&mut without_legacy, 1, "dana", t0);
    orchestrator
        .merge(&mut without_legacy, &MergeOptions::default())
        .await
        .unwrap();

    let cached = orchestrator.config_map().get(&table_id()).unwrap();
    assert!(cached.columns_to_delete().contains_key("legacy"));

    let mut with_legacy_columns = columns();
    with_legacy_columns.add_column(Column::new("legacy", Kind::String));
    let mut with_legacy = table_data(Mode::Replication, config, with_legacy_columns);
    insert(&mut with_legacy, 2, "sam", t0 + TimeDelta::hours(1));
    orchestrator
        .merge(&mut with_legacy, &MergeOptions::default())
        .await
        .unwrap();
    assert!(cached.columns_to_delete().is_empty());

    destination.clear_statements().await;
    without_legacy.wipe();
    insert(&mut without_legacy, 3, "kim", t0 + TimeDelta::hours(30));
    orchestrator
        .merge(&mut without_legacy, &MergeOptions::default())
        .await
        .unwrap();

    assert!(
        !destination
            .statements()
            .await
            .iter()
            .any(|statement| statement.contains("DROP COLUMN"))
    );
    assert!(cached.columns().get_column("legacy").is_some());
    assert!(cached.columns_to_delete().contains_key("legacy"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_merges_of_different_tables_both_commit() {
    init_test_tracing();
    let destination =
        MemoryDestination::with_dialect(TestDialect::default().with_multi_statement_merge());
    let orchestrator = Orchestrator::new(destination.clone(), settings());
    let customers_id = TableIdentifier::new(DATABASE, SCHEMA, "customers");

    let mut orders = table_data(Mode::Replication, topic_config(), columns());
    insert(&mut orders, 1, "dana", Utc::now());
    let mut customers = TableData::new(
        Mode::Replication,
        "customers",
        topic_config(),
        vec!["id".to_string()],
        columns(),
    );
    insert(&mut customers, 1, "sam", Utc::now());

    let options = MergeOptions::default();
    let (orders_result, customers_result) = tokio::join!(
        orchestrator.merge(&mut orders, &options),
        orchestrator.merge(&mut customers, &options),
    );
    orders_result.unwrap();
    customers_result.unwrap();

    assert_eq!(orchestrator.config_map().len(), 2);
    for table_id in [table_id(), customers_id] {
        let config = orchestrator.config_map().get(&table_id).unwrap();
        assert!(!config.create_table());
        assert_eq!(config.columns().len(), 2);
    }

    let transactions = destination.transactions().await;
    assert_eq!(transactions.len(), 2);
    assert!(
        transactions
            .iter()
            .all(|transaction| transaction.outcome == TransactionOutcome::Committed)
    );
    assert_eq!(destination.dropped_tables().await.len(), 2);
}

#[tokio::test]
async fn delete_only_batches_never_drop_columns() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    destination
        .set_table_columns(
            &table_id(),
            &[
                Column::new("id", Kind::Integer).with_primary_key(true),
                Column::new("name", Kind::String),
                Column::new("legacy", Kind::String),
            ],
        )
        .await;
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let config = TopicConfig {
        drop_deleted_columns: true,
        ..topic_config()
    };
    let mut data = table_data(Mode::Replication, config, columns());
    data.insert_row("1", crate::common::row(1, "dana"), true);
    data.update_latest_cdc_ts(Utc::now() + TimeDelta::hours(5));

    orchestrator.merge(&mut data, &MergeOptions::default()).await.unwrap();

    let cached = orchestrator.config_map().get(&table_id()).unwrap();
    assert!(cached.columns_to_delete().is_empty());
    assert!(
        !destination
            .statements()
            .await
            .iter()
            .any(|statement| statement.contains("DROP COLUMN"))
    );
}

#[tokio::test]
async fn defaults_are_backfilled_once() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    destination
        .set_table_columns(
            &table_id(),
            &[
                Column::new("id", Kind::Integer).with_primary_key(true),
                Column::new("name", Kind::String),
            ],
        )
        .await;
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let mut in_memory = columns();
    in_memory
        .add_column(Column::new("status", Kind::String).with_default_value(Value::from("new")));
    let mut data = table_data(Mode::Replication, topic_config(), in_memory);
    insert(&mut data, 1, "dana", Utc::now());

    orchestrator.merge(&mut data, &MergeOptions::default()).await.unwrap();
    data.wipe();
    insert(&mut data, 2, "sam", Utc::now());
    orchestrator.merge(&mut data, &MergeOptions::default()).await.unwrap();

    let statements = destination.statements().await;
    let backfills = statements
        .iter()
        .filter(|statement| statement.starts_with("UPDATE") || statement.starts_with("COMMENT"))
        .collect::<Vec<_>>();
    assert_eq!(
        backfills,
        vec![
            r#"UPDATE "db"."public"."orders" as t SET t."status" = 'new' WHERE t."status" IS NULL;"#,
            r#"COMMENT ON COLUMN "db"."public"."orders"."status" IS '{"backfilled": true}';"#,
        ]
    );

    let add = statements
        .iter()
        .position(|statement| statement.contains(r#"ADD COLUMN "status""#))
        .unwrap();
    let update = statements
        .iter()
        .position(|statement| statement.starts_with("UPDATE"))
        .unwrap();
    assert!(add < update);

    let cached = orchestrator.config_map().get(&table_id()).unwrap();
    assert!(cached.columns().get_column("status").unwrap().backfilled());
    assert!(data.in_memory_columns().get_column("status").unwrap().backfilled());
}

#[tokio::test]
async fn merge_assertion_rejects_short_counts() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    destination.set_rows_affected(Some(1)).await;
    let settings = SharedDestinationSettings {
        enable_merge_assertion: true,
        ..settings()
    };
    let orchestrator = Orchestrator::new(destination.clone(), settings);

    let mut data = table_data(Mode::Replication, topic_config(), columns());
    insert(&mut data, 1, "dana", Utc::now());
    insert(&mut data, 2, "sam", Utc::now());

    let err = orchestrator
        .merge(&mut data, &MergeOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MergeAssertionFailed);
    assert_eq!(destination.dropped_tables().await.len(), 1);
}

#[tokio::test]
async fn multi_statement_merges_run_in_one_transaction() {
    init_test_tracing();
    let destination =
        MemoryDestination::with_dialect(TestDialect::default().with_multi_statement_merge());
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let mut data = table_data(Mode::Replication, topic_config(), columns());
    insert(&mut data, 1, "dana", Utc::now());
    data.insert_row("2", crate::common::row(2, "sam"), true);

    orchestrator.merge(&mut data, &MergeOptions::default()).await.unwrap();

    let transactions = destination.transactions().await;
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].outcome, TransactionOutcome::Committed);
    assert_eq!(transactions[0].statements.len(), 3);
    assert!(transactions[0].statements[2].starts_with("DELETE FROM"));
}

#[tokio::test]
async fn additional_equality_strings_join_the_merge() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let mut data = table_data(Mode::Replication, topic_config(), columns());
    insert(&mut data, 1, "dana", Utc::now());

    let options = MergeOptions {
        additional_equality_strings: vec![r#"tgt."day" = '2024-01-01'"#.to_string()],
    };
    orchestrator.merge(&mut data, &options).await.unwrap();

    let merge = destination
        .statements()
        .await
        .into_iter()
        .find(|statement| statement.starts_with("MERGE INTO"))
        .unwrap();
    assert!(merge.contains(r#"ON tgt."id" = stg."id" AND tgt."day" = '2024-01-01'"#));
}

#[tokio::test]
async fn missing_primary_key_fails_after_staging() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let config = TopicConfig {
        primary_keys_override: vec!["uuid".to_string()],
        ..topic_config()
    };
    let mut data = table_data(Mode::Replication, config, columns());
    insert(&mut data, 1, "dana", Utc::now());

    let err = orchestrator
        .merge(&mut data, &MergeOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingPrimaryKey);
    assert_eq!(destination.dropped_tables().await.len(), 1);
}

#[tokio::test]
async fn empty_buffers_are_skipped() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let mut data = table_data(Mode::Replication, topic_config(), columns());
    orchestrator.merge(&mut data, &MergeOptions::default()).await.unwrap();

    let mut no_columns = table_data(Mode::Replication, topic_config(), Columns::default());
    no_columns.insert_row("1", crate::common::row(1, "dana"), false);
    orchestrator
        .merge(&mut no_columns, &MergeOptions::default())
        .await
        .unwrap();

    assert!(destination.statements().await.is_empty());
    assert!(destination.queries().await.is_empty());
}

#[tokio::test]
async fn destination_schema_drift_fails_before_staging() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    destination
        .set_describe_rows(
            &table_id(),
            vec![transfer::destination::CatalogRow::new([
                ("column_name", Some("id".to_string())),
                ("data_type", Some("geography".to_string())),
            ])],
        )
        .await;
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let mut data = table_data(Mode::Replication, topic_config(), columns());
    insert(&mut data, 1, "dana", Utc::now());

    let err = orchestrator
        .merge(&mut data, &MergeOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaIntegrity);
    assert!(destination.statements().await.is_empty());
}
