use std::fmt;

use crate::destination::TableIdentifier;
use crate::error::{EtlError, EtlResult};
use crate::types::{Column, KindDetails};

/// Kind of column mutation applied by an `ALTER TABLE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnOperation {
    Add,
    Delete,
}

impl ColumnOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnOperation::Add => "add",
            ColumnOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for ColumnOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a destination applies a column's default value to rows that existed before the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValueStrategy {
    /// Existing rows are updated and the column is tagged as backfilled through a comment.
    Backfill,
    /// The destination stores the default itself. A column reporting one is already backfilled.
    Native,
    /// Defaults are not applied to existing rows.
    NotImplemented,
}

/// Inputs of [`Dialect::build_merge_queries`].
#[derive(Debug, Clone, Copy)]
pub struct MergeQueryArgs<'a> {
    pub table_id: &'a TableIdentifier,
    /// Quoted name of the temporary table, or a subquery over it.
    pub sub_query: &'a str,
    pub primary_keys: &'a [Column],
    /// Extra join predicates, for example a partition filter.
    pub additional_equality_strings: &'a [String],
    pub columns: &'a [Column],
    pub soft_delete: bool,
    pub contains_hard_deletes: bool,
}

/// SQL flavor of a destination.
///
/// A dialect only builds strings and classifies errors; it never talks to the destination.
/// Every statement the reconciliation engine emits goes through one of these builders.
pub trait Dialect: Send + Sync {
    fn quote_identifier(&self, name: &str) -> String;

    /// Renders a JSON document as a literal accepted by struct columns.
    fn escape_struct(&self, json: &str) -> String;

    fn quote_literal(&self, value: &str) -> String {
        pg_escape::quote_literal(value)
    }

    fn data_type_for_kind(&self, kind_details: &KindDetails, is_primary_key: bool) -> String;

    /// Maps a native type reported by the destination to a kind.
    ///
    /// Unknown types map to [`crate::types::Kind::Invalid`] rather than failing, so that the
    /// caller decides how strict to be.
    fn kind_for_data_type(
        &self,
        data_type: &str,
        precision_hint: Option<&str>,
    ) -> EtlResult<KindDetails>;

    fn fully_qualified_name(&self, table_id: &TableIdentifier) -> String {
        format!(
            "{}.{}.{}",
            self.quote_identifier(table_id.database()),
            self.quote_identifier(table_id.schema()),
            self.quote_identifier(table_id.table())
        )
    }

    fn build_create_table_query(
        &self,
        table_id: &TableIdentifier,
        temporary: bool,
        column_defs: &[String],
    ) -> String;

    fn build_primary_key_clause(&self, primary_keys: &[String]) -> String {
        let keys = primary_keys
            .iter()
            .map(|key| self.quote_identifier(key))
            .collect::<Vec<_>>();

        format!("PRIMARY KEY ({})", keys.join(", "))
    }

    fn build_alter_column_query(
        &self,
        table_id: &TableIdentifier,
        operation: ColumnOperation,
        column_sql: &str,
    ) -> String;

    fn build_describe_table_query(&self, table_id: &TableIdentifier) -> String;

    fn describe_column_name_label(&self) -> &'static str {
        "column_name"
    }

    fn describe_data_type_label(&self) -> &'static str {
        "data_type"
    }

    fn describe_description_label(&self) -> &'static str {
        "description"
    }

    fn describe_default_value_label(&self) -> &'static str {
        "default_value"
    }

    /// Label of the describe column carrying the precision passed to
    /// [`Dialect::kind_for_data_type`], if the destination reports it separately.
    fn describe_precision_label(&self) -> Option<&'static str> {
        None
    }

    /// Builds the statements merging a staged batch into its target table.
    ///
    /// Dialects without `MERGE` return several statements, which are run in one transaction.
    fn build_merge_queries(&self, args: &MergeQueryArgs<'_>) -> EtlResult<Vec<String>>;

    /// Builds the statements removing duplicate primary keys from `table_id`, using
    /// `staging_table_id` as scratch space.
    fn build_dedupe_queries(
        &self,
        table_id: &TableIdentifier,
        staging_table_id: &TableIdentifier,
        primary_keys: &[String],
        include_artie_updated_at: bool,
    ) -> Vec<String>;

    /// Builds a catalog query returning a `table_name` row for every table in the schema that
    /// carries the bookkeeping prefix.
    fn build_sweep_query(&self, database: &str, schema: &str) -> String;

    fn default_value_strategy(&self) -> DefaultValueStrategy {
        DefaultValueStrategy::Backfill
    }

    /// `column` is quoted, `default_value` is a rendered literal.
    fn build_backfill_query(
        &self,
        table_id: &TableIdentifier,
        column: &str,
        default_value: &str,
    ) -> String {
        format!(
            "UPDATE {table} as t SET t.{column} = {default_value} WHERE t.{column} IS NULL;",
            table = self.fully_qualified_name(table_id)
        )
    }

    /// Records on the column that its default was backfilled. `column` is quoted.
    fn build_backfill_comment_query(&self, table_id: &TableIdentifier, column: &str) -> String {
        format!(
            r#"COMMENT ON COLUMN {table}.{column} IS '{{"backfilled": true}}';"#,
            table = self.fully_qualified_name(table_id)
        )
    }

    fn is_column_already_exists_err(&self, err: &EtlError) -> bool;

    fn is_table_does_not_exist_err(&self, err: &EtlError) -> bool;
}
