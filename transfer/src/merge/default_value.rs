use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use tracing::info;

use crate::bail;
use crate::destination::{DefaultValueStrategy, Destination, Dialect, TableIdentifier};
use crate::error::{ErrorKind, EtlResult};
use crate::types::{Column, Kind, Value};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.6f";
const TIMESTAMP_NTZ_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Renders the default value of `column` as a SQL literal for `dialect`.
///
/// Returns [`None`] when the column has no default.
pub fn render_default_value<T>(dialect: &T, column: &Column) -> EtlResult<Option<String>>
where
    T: Dialect + ?Sized,
{
    let Some(value) = column.default_value() else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }

    let rendered = match column.kind() {
        Kind::Struct | Kind::Array => {
            let json = match value {
                // A string default already holds the JSON text.
                Value::String(json) => json.clone(),
                other => serde_json::to_string(&other.to_json())?,
            };
            dialect.escape_struct(&json)
        }
        Kind::Date => {
            let date = match value {
                Value::Date(date) => *date,
                Value::TimestampNtz(ts) => ts.date(),
                Value::TimestampTz(ts) => ts.date_naive(),
                Value::String(raw) => parse_date(raw)?,
                other => return unsupported(column, other),
            };
            dialect.quote_literal(&date.format(DATE_FORMAT).to_string())
        }
        Kind::Time => {
            let time = match value {
                Value::Time(time) => *time,
                Value::TimestampNtz(ts) => ts.time(),
                Value::TimestampTz(ts) => ts.time(),
                Value::String(raw) => NaiveTime::from_str(raw)?,
                other => return unsupported(column, other),
            };
            dialect.quote_literal(&time.format(TIME_FORMAT).to_string())
        }
        Kind::TimestampNtz => {
            let ts = match value {
                Value::TimestampNtz(ts) => *ts,
                Value::TimestampTz(ts) => ts.naive_utc(),
                Value::String(raw) => parse_timestamp_ntz(raw)?,
                other => return unsupported(column, other),
            };
            dialect.quote_literal(&ts.format(TIMESTAMP_NTZ_FORMAT).to_string())
        }
        Kind::TimestampTz => {
            let ts = match value {
                Value::TimestampTz(ts) => *ts,
                Value::TimestampNtz(ts) => ts.and_utc(),
                Value::String(raw) => DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc),
                other => return unsupported(column, other),
            };
            dialect.quote_literal(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }
        Kind::Decimal => {
            let integral = column
                .kind_details
                .extended_decimal_details
                .is_none_or(|details| details.scale() == 0);
            match value {
                Value::Int(value) if integral => value.to_string(),
                Value::Int(value) => BigDecimal::from(*value).to_string(),
                Value::Decimal(value) => value.to_string(),
                Value::String(raw) => BigDecimal::from_str(raw)?.to_string(),
                other => return unsupported(column, other),
            }
        }
        Kind::String => match value {
            Value::String(value) => dialect.quote_literal(value),
            other => return unsupported(column, other),
        },
        Kind::Boolean | Kind::Integer | Kind::Float => match value {
            Value::Bool(value) => value.to_string(),
            Value::Int(value) => value.to_string(),
            Value::Float(value) => value.to_string(),
            other => return unsupported(column, other),
        },
        Kind::Invalid => return unsupported(column, value),
    };

    Ok(Some(rendered))
}

fn parse_date(raw: &str) -> EtlResult<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return Ok(date);
    }

    Ok(parse_timestamp_ntz(raw)?.date())
}

fn parse_timestamp_ntz(raw: &str) -> EtlResult<NaiveDateTime> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.naive_utc());
    }

    Ok(NaiveDateTime::from_str(raw)?)
}

fn unsupported<T>(column: &Column, value: &Value) -> EtlResult<T> {
    bail!(
        ErrorKind::UnsupportedDefaultValue,
        "Default value cannot be rendered for the column kind",
        format!(
            "column `{}` of kind `{}` has default {value:?}",
            column.name(),
            column.kind()
        )
    );
}

/// Writes the default of `column` into the existing rows of `table_id` that hold null, then
/// marks the column as backfilled on the destination.
///
/// Does nothing for dialects without [`DefaultValueStrategy::Backfill`] or when the column
/// does not need one. The caller records the backfilled flag in its caches.
pub async fn backfill_column<D>(
    destination: &D,
    column: &Column,
    table_id: &TableIdentifier,
) -> EtlResult<()>
where
    D: Destination,
{
    let dialect = destination.dialect();
    if dialect.default_value_strategy() != DefaultValueStrategy::Backfill
        || !column.should_backfill()
    {
        return Ok(());
    }

    let Some(default_value) = render_default_value(dialect, column)? else {
        return Ok(());
    };

    let quoted = dialect.quote_identifier(column.name());
    let query = dialect.build_backfill_query(table_id, &quoted, &default_value);
    info!(table = %table_id, column = column.name(), %query, "backfilling column");
    destination.exec(&query).await?;

    let query = dialect.build_backfill_comment_query(table_id, &quoted);
    destination.exec(&query).await?;

    Ok(())
}
