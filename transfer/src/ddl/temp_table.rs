use chrono::{TimeDelta, Utc};
use tracing::warn;

use crate::destination::{Destination, TableIdentifier};
use crate::error::EtlResult;
use crate::types::markers::ARTIE_PREFIX;

/// Hours a temporary table lives before the sweep may drop it.
pub const TEMPORARY_TABLE_TTL_HOURS: i64 = 6;

const SUFFIX_LEN: usize = 5;

/// Returns five random lowercase alphanumeric characters.
pub(crate) fn random_suffix() -> String {
    (0..SUFFIX_LEN)
        .map(|_| {
            let index = rand::random_range(0..36u32);
            char::from_digit(index, 36).unwrap_or('0')
        })
        .collect()
}

/// Returns a temporary table identity next to `table_id` with a random suffix.
pub fn temp_table_id(table_id: &TableIdentifier) -> TableIdentifier {
    temp_table_id_with_suffix(table_id, &random_suffix())
}

/// Returns `<table>_<prefix>_<suffix>_<expiry>` next to `table_id`, where `expiry` is the Unix
/// time after which the table may be swept.
pub fn temp_table_id_with_suffix(table_id: &TableIdentifier, suffix: &str) -> TableIdentifier {
    let expires_at = Utc::now() + TimeDelta::hours(TEMPORARY_TABLE_TTL_HOURS);
    let name = format!(
        "{}_{}_{}_{}",
        table_id.table(),
        ARTIE_PREFIX,
        suffix,
        expires_at.timestamp()
    );

    table_id.with_table(name).with_temporary(true)
}

/// Returns `true` if `name` is a temporary table whose expiry has passed.
///
/// Names without the prefix or without a trailing Unix timestamp are never deleted.
pub fn should_delete_from_name(name: &str) -> bool {
    let name = name.to_lowercase();
    if !name.contains(ARTIE_PREFIX) {
        return false;
    }

    let Some(expires_at) = name
        .rsplit('_')
        .next()
        .and_then(|part| part.parse::<i64>().ok())
    else {
        return false;
    };

    expires_at < Utc::now().timestamp()
}

/// Drops a temporary table.
///
/// Tables whose name lacks the prefix are left alone. Drop failures are logged and only
/// returned when `should_return_error` is set; the sweep reclaims anything left behind.
pub async fn drop_temporary_table<D>(
    destination: &D,
    table_id: &TableIdentifier,
    should_return_error: bool,
) -> EtlResult<()>
where
    D: Destination,
{
    if !table_id.table().to_lowercase().contains(ARTIE_PREFIX) {
        warn!(table = %table_id, "skipped dropping table without the temporary table prefix");
        return Ok(());
    }

    if let Err(err) = destination.drop_table(table_id).await {
        warn!(
            table = %table_id,
            error = %err,
            "failed to drop temporary table, it will be removed by the sweep"
        );
        if should_return_error {
            return Err(err);
        }
    }

    Ok(())
}
