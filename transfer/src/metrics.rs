//! Metrics emitted while reconciling and merging tables.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};

static REGISTER_METRICS: Once = Once::new();

/// Label for the fully qualified table name.
pub const TABLE_LABEL: &str = "table";

/// Label for the kind of DDL statement (`create`, `add`, `delete`).
pub const OPERATION_LABEL: &str = "operation";

/// Duration of a merge from schema reconciliation to temporary table cleanup.
/// Labels: `table`.
pub const TRANSFER_MERGE_DURATION_SECONDS: &str = "transfer_merge_duration_seconds";

/// DDL statements applied to destinations.
/// Labels: `operation`.
pub const TRANSFER_DDL_STATEMENTS_TOTAL: &str = "transfer_ddl_statements_total";

/// Expired temporary tables dropped by the sweep.
pub const TRANSFER_TEMP_TABLES_SWEPT_TOTAL: &str = "transfer_temp_tables_swept_total";

/// Registers metric descriptions. Only the first call has an effect.
pub fn register_metrics() {
    REGISTER_METRICS.call_once(|| {
        describe_histogram!(
            TRANSFER_MERGE_DURATION_SECONDS,
            Unit::Seconds,
            "Duration of a merge into a destination table, labeled by table"
        );

        describe_counter!(
            TRANSFER_DDL_STATEMENTS_TOTAL,
            Unit::Count,
            "DDL statements applied to destination tables, labeled by operation"
        );

        describe_counter!(
            TRANSFER_TEMP_TABLES_SWEPT_TOTAL,
            Unit::Count,
            "Expired temporary tables dropped by the sweep"
        );
    });
}
