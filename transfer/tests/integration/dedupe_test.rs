use transfer::error::ErrorKind;
use transfer::merge::Orchestrator;
use transfer::test_utils::{MemoryDestination, TransactionOutcome};
use transfer_telemetry::tracing::init_test_tracing;

use crate::common::{settings, table_id};

#[tokio::test]
async fn dedupe_runs_in_transaction_and_drops_staging_table() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    orchestrator
        .dedupe(&table_id(), &["id".to_string()], true)
        .await
        .unwrap();

    let transactions = destination.transactions().await;
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].outcome, TransactionOutcome::Committed);
    assert_eq!(transactions[0].statements.len(), 3);
    assert!(transactions[0].statements[0].contains(r#"ORDER BY "id", "__artie_updated_at" DESC"#));

    let dropped = destination.dropped_tables().await;
    assert_eq!(dropped.len(), 1);
    assert!(dropped[0].table().starts_with("orders___artie_"));
}

#[tokio::test]
async fn failed_dedupe_rolls_back_and_still_drops_staging_table() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    destination.fail_on("DELETE FROM", "lock timeout").await;
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let err = orchestrator
        .dedupe(&table_id(), &["id".to_string()], false)
        .await
        .unwrap_err();

    assert!(err.mentions("lock timeout"));
    assert_eq!(
        destination.transactions().await[0].outcome,
        TransactionOutcome::RolledBack
    );
    assert_eq!(destination.dropped_tables().await.len(), 1);
}

#[tokio::test]
async fn dedupe_requires_primary_keys() {
    init_test_tracing();
    let destination = MemoryDestination::new();
    let orchestrator = Orchestrator::new(destination.clone(), settings());

    let err = orchestrator.dedupe(&table_id(), &[], false).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingPrimaryKey);
    assert!(destination.statements().await.is_empty());
}
