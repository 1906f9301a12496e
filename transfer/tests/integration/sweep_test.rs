use chrono::{TimeDelta, Utc};
use transfer::ddl::TEMPORARY_TABLE_TTL_HOURS;
use transfer::merge::Orchestrator;
use transfer::test_utils::MemoryDestination;
use transfer_config::shared::TopicConfig;
use transfer_telemetry::tracing::init_test_tracing;

use crate::common::{DATABASE, SCHEMA, settings, topic_config};

fn expired(table: &str) -> String {
    format!("{table}___artie_abcde_{}", (Utc::now() - TimeDelta::hours(1)).timestamp())
}

fn live(table: &str) -> String {
    let expires_at = Utc::now() + TimeDelta::hours(TEMPORARY_TABLE_TTL_HOURS);
    format!("{table}___artie_fghij_{}", expires_at.timestamp())
}

#[tokio::test]
async fn sweep_drops_only_expired_temporary_tables() {
    init_test_tracing();
    let expired_orders = expired("orders");
    let expired_users = expired("users");
    let destination = MemoryDestination::new();
    destination
        .set_catalog_tables(
            DATABASE,
            SCHEMA,
            &[
                expired_orders.clone(),
                live("orders"),
                expired_users.clone(),
                "__artie_audit".to_string(),
            ],
        )
        .await;
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    // Both topics share one schema, which is scanned once.
    let topics = [
        topic_config(),
        TopicConfig {
            topic: "db.public.users".to_string(),
            ..topic_config()
        },
    ];
    let swept = orchestrator.sweep(&topics).await.unwrap();

    assert_eq!(swept, 2);
    assert_eq!(destination.queries().await.len(), 1);

    let dropped = destination
        .dropped_tables()
        .await
        .into_iter()
        .map(|table_id| table_id.table().to_string())
        .collect::<Vec<_>>();
    assert_eq!(dropped, vec![expired_orders, expired_users]);
}

#[tokio::test]
async fn sweep_reports_failures_after_trying_every_table() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    destination
        .set_catalog_tables(DATABASE, SCHEMA, &[expired("orders"), expired("users")])
        .await;
    destination.fail_on("orders___artie_", "permission denied").await;
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let err = orchestrator.sweep(&[topic_config()]).await.unwrap_err();

    assert!(err.mentions("permission denied"));
    assert_eq!(destination.dropped_tables().await.len(), 1);
}

#[tokio::test]
async fn sweep_scans_each_schema() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    destination
        .set_catalog_tables(DATABASE, "staging", &[expired("orders")])
        .await;
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let topics = [
        topic_config(),
        TopicConfig {
            schema: "staging".to_string(),
            ..topic_config()
        },
    ];
    let swept = orchestrator.sweep(&topics).await.unwrap();

    assert_eq!(swept, 1);
    assert_eq!(destination.queries().await.len(), 2);
    assert_eq!(destination.dropped_tables().await[0].schema(), "staging");
}
