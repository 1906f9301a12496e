use crate::bail;
use crate::destination::{
    ColumnOperation, DefaultValueStrategy, Dialect, MergeQueryArgs, TableIdentifier,
};
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::types::markers::{
    ARTIE_PREFIX, DELETE_COLUMN_MARKER, ONLY_SET_DELETE_COLUMN_MARKER, UPDATED_AT_COLUMN_MARKER,
};
use crate::types::{Column, DecimalDetails, IntegerKind, Kind, KindDetails};

const TARGET_ALIAS: &str = "tgt";
const STAGING_ALIAS: &str = "stg";

/// ANSI-flavored dialect used by tests.
///
/// Identifiers are double-quoted. Merges are emitted as one `MERGE` statement, or as an
/// `INSERT`/`UPDATE`/`DELETE` sequence once [`TestDialect::with_multi_statement_merge`] is set.
#[derive(Debug, Clone, Copy)]
pub struct TestDialect {
    multi_statement_merge: bool,
    default_value_strategy: DefaultValueStrategy,
}

impl Default for TestDialect {
    fn default() -> Self {
        Self {
            multi_statement_merge: false,
            default_value_strategy: DefaultValueStrategy::Backfill,
        }
    }
}

impl TestDialect {
    pub fn with_multi_statement_merge(mut self) -> Self {
        self.multi_statement_merge = true;
        self
    }

    pub fn with_default_value_strategy(mut self, strategy: DefaultValueStrategy) -> Self {
        self.default_value_strategy = strategy;
        self
    }

    fn quote_columns(&self, columns: &[Column], alias: Option<&str>) -> String {
        columns
            .iter()
            .map(|column| match alias {
                Some(alias) => format!("{alias}.{}", self.quote_identifier(column.name())),
                None => self.quote_identifier(column.name()),
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn equality_clause(&self, args: &MergeQueryArgs<'_>) -> String {
        let mut parts = args
            .primary_keys
            .iter()
            .map(|key| {
                let key = self.quote_identifier(key.name());
                format!("{TARGET_ALIAS}.{key} = {STAGING_ALIAS}.{key}")
            })
            .collect::<Vec<_>>();
        parts.extend(args.additional_equality_strings.iter().cloned());

        parts.join(" AND ")
    }

    fn update_fragment(&self, columns: &[Column]) -> String {
        columns
            .iter()
            .map(|column| {
                let name = self.quote_identifier(column.name());
                format!("{name}={STAGING_ALIAS}.{name}")
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn not_deleted(&self) -> String {
        format!(
            "COALESCE({STAGING_ALIAS}.{}, false) = false",
            self.quote_identifier(DELETE_COLUMN_MARKER)
        )
    }
}

impl Dialect for TestDialect {
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn escape_struct(&self, json: &str) -> String {
        format!("{}::json", self.quote_literal(json))
    }

    fn data_type_for_kind(&self, kind_details: &KindDetails, _is_primary_key: bool) -> String {
        match kind_details.kind {
            Kind::String => match kind_details.optional_string_precision {
                Some(precision) => format!("VARCHAR({precision})"),
                None => "TEXT".to_string(),
            },
            Kind::Integer => match kind_details.optional_integer_kind {
                Some(IntegerKind::SmallInt) => "SMALLINT".to_string(),
                Some(IntegerKind::Int) => "INT".to_string(),
                Some(IntegerKind::BigInt) | None => "BIGINT".to_string(),
            },
            Kind::Float => "DOUBLE".to_string(),
            Kind::Boolean => "BOOLEAN".to_string(),
            Kind::Date => "DATE".to_string(),
            Kind::Time => "TIME".to_string(),
            Kind::TimestampNtz => "TIMESTAMP".to_string(),
            Kind::TimestampTz => "TIMESTAMPTZ".to_string(),
            Kind::Decimal => match kind_details.extended_decimal_details {
                Some(details) => match details.precision() {
                    Some(precision) => format!("NUMERIC({precision},{})", details.scale()),
                    None => "NUMERIC".to_string(),
                },
                None => "NUMERIC".to_string(),
            },
            Kind::Struct => "JSON".to_string(),
            Kind::Array => "ARRAY".to_string(),
            Kind::Invalid => "INVALID".to_string(),
        }
    }

    fn kind_for_data_type(
        &self,
        data_type: &str,
        _precision_hint: Option<&str>,
    ) -> EtlResult<KindDetails> {
        let data_type = data_type.trim().to_lowercase();
        let (base, args) = match data_type.split_once('(') {
            Some((base, rest)) => (base.trim(), Some(rest.trim_end_matches(')'))),
            None => (data_type.as_str(), None),
        };

        let details = match base {
            "text" => KindDetails::new(Kind::String),
            "varchar" => match args {
                Some(precision) => KindDetails::string_with_precision(precision.trim().parse()?),
                None => KindDetails::new(Kind::String),
            },
            "smallint" => KindDetails::integer(IntegerKind::SmallInt),
            "int" => KindDetails::integer(IntegerKind::Int),
            "bigint" => KindDetails::integer(IntegerKind::BigInt),
            "double" => KindDetails::new(Kind::Float),
            "boolean" => KindDetails::new(Kind::Boolean),
            "date" => KindDetails::new(Kind::Date),
            "time" => KindDetails::new(Kind::Time),
            "timestamp" => KindDetails::new(Kind::TimestampNtz),
            "timestamptz" => KindDetails::new(Kind::TimestampTz),
            "numeric" => match args.and_then(|args| args.split_once(',')) {
                Some((precision, scale)) => KindDetails::decimal(DecimalDetails::new(
                    Some(precision.trim().parse()?),
                    scale.trim().parse()?,
                )),
                None => KindDetails::decimal(DecimalDetails::new(None, 0)),
            },
            "json" => KindDetails::new(Kind::Struct),
            "array" => KindDetails::new(Kind::Array),
            _ => KindDetails::new(Kind::Invalid),
        };

        Ok(details)
    }

    fn build_create_table_query(
        &self,
        table_id: &TableIdentifier,
        _temporary: bool,
        column_defs: &[String],
    ) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.fully_qualified_name(table_id),
            column_defs.join(",")
        )
    }

    fn build_alter_column_query(
        &self,
        table_id: &TableIdentifier,
        operation: ColumnOperation,
        column_sql: &str,
    ) -> String {
        let action = match operation {
            ColumnOperation::Add => "ADD COLUMN",
            ColumnOperation::Delete => "DROP COLUMN",
        };

        format!(
            "ALTER TABLE {} {action} {column_sql}",
            self.fully_qualified_name(table_id)
        )
    }

    fn build_describe_table_query(&self, table_id: &TableIdentifier) -> String {
        format!("DESCRIBE TABLE {}", self.fully_qualified_name(table_id))
    }

    fn build_merge_queries(&self, args: &MergeQueryArgs<'_>) -> EtlResult<Vec<String>> {
        let mut columns = args
            .columns
            .iter()
            .filter(|column| column.name() != ONLY_SET_DELETE_COLUMN_MARKER)
            .cloned()
            .collect::<Vec<_>>();

        if !args.soft_delete {
            let before = columns.len();
            columns.retain(|column| column.name() != DELETE_COLUMN_MARKER);
            if columns.len() == before {
                bail!(
                    ErrorKind::MissingColumns,
                    "Delete marker column is required for hard deletes",
                    format!("table `{}`", args.table_id)
                );
            }
        }

        let target = self.fully_qualified_name(args.table_id);
        let equality = self.equality_clause(args);
        let column_list = self.quote_columns(&columns, None);
        let staged_values = self.quote_columns(&columns, Some(STAGING_ALIAS));
        let update = self.update_fragment(&columns);

        if self.multi_statement_merge {
            let Some(first_key) = args.primary_keys.first() else {
                bail!(
                    ErrorKind::MissingPrimaryKey,
                    "Merge requires a primary key",
                    format!("table `{}`", args.table_id)
                );
            };

            let live_rows = if args.soft_delete {
                String::new()
            } else {
                format!(" AND {}", self.not_deleted())
            };

            let mut queries = vec![
                format!(
                    "INSERT INTO {target} ({column_list}) SELECT {staged_values} FROM {} AS {STAGING_ALIAS} LEFT JOIN {target} AS {TARGET_ALIAS} ON {equality} WHERE {TARGET_ALIAS}.{} IS NULL{live_rows}",
                    args.sub_query,
                    self.quote_identifier(first_key.name())
                ),
                format!(
                    "UPDATE {target} AS {TARGET_ALIAS} SET {update} FROM {} AS {STAGING_ALIAS} WHERE {equality}{live_rows}",
                    args.sub_query
                ),
            ];

            if !args.soft_delete && args.contains_hard_deletes {
                queries.push(format!(
                    "DELETE FROM {target} AS {TARGET_ALIAS} USING {} AS {STAGING_ALIAS} WHERE {equality} AND {STAGING_ALIAS}.{}",
                    args.sub_query,
                    self.quote_identifier(DELETE_COLUMN_MARKER)
                ));
            }

            return Ok(queries);
        }

        let base = format!(
            "MERGE INTO {target} {TARGET_ALIAS} USING {} AS {STAGING_ALIAS} ON {equality}",
            args.sub_query
        );

        if args.soft_delete {
            return Ok(vec![format!(
                "{base} WHEN MATCHED THEN UPDATE SET {update} WHEN NOT MATCHED THEN INSERT ({column_list}) VALUES ({staged_values});"
            )]);
        }

        let delete_clause = if args.contains_hard_deletes {
            format!(
                " WHEN MATCHED AND {STAGING_ALIAS}.{} THEN DELETE",
                self.quote_identifier(DELETE_COLUMN_MARKER)
            )
        } else {
            String::new()
        };

        Ok(vec![format!(
            "{base}{delete_clause} WHEN MATCHED AND {live} THEN UPDATE SET {update} WHEN NOT MATCHED AND {live} THEN INSERT ({column_list}) VALUES ({staged_values});",
            live = self.not_deleted()
        )])
    }

    fn build_dedupe_queries(
        &self,
        table_id: &TableIdentifier,
        staging_table_id: &TableIdentifier,
        primary_keys: &[String],
        include_artie_updated_at: bool,
    ) -> Vec<String> {
        let target = self.fully_qualified_name(table_id);
        let staging = self.fully_qualified_name(staging_table_id);
        let keys = primary_keys
            .iter()
            .map(|key| self.quote_identifier(key))
            .collect::<Vec<_>>()
            .join(", ");

        let mut order_by = keys.clone();
        if include_artie_updated_at {
            order_by.push_str(&format!(
                ", {} DESC",
                self.quote_identifier(UPDATED_AT_COLUMN_MARKER)
            ));
        }

        vec![
            format!(
                "CREATE TABLE {staging} AS SELECT DISTINCT ON ({keys}) * FROM {target} ORDER BY {order_by}"
            ),
            format!("DELETE FROM {target} WHERE ({keys}) IN (SELECT {keys} FROM {staging})"),
            format!("INSERT INTO {target} SELECT * FROM {staging}"),
        ]
    }

    fn build_sweep_query(&self, database: &str, schema: &str) -> String {
        format!(
            "SELECT table_name, table_schema FROM information_schema.tables WHERE table_catalog = {} AND table_schema = {} AND table_name ILIKE {}",
            self.quote_literal(database),
            self.quote_literal(schema),
            self.quote_literal(&format!("%{ARTIE_PREFIX}%"))
        )
    }

    fn default_value_strategy(&self) -> DefaultValueStrategy {
        self.default_value_strategy
    }

    fn is_column_already_exists_err(&self, err: &EtlError) -> bool {
        err.mentions("already exists")
    }

    fn is_table_does_not_exist_err(&self, err: &EtlError) -> bool {
        err.mentions("does not exist")
    }
}
