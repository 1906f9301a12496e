use std::fmt;

use crate::destination::Dialect;

/// Location of a destination table.
///
/// The [`Display`](fmt::Display) form `database.schema.table` is unquoted and is used as the
/// table config cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableIdentifier {
    database: String,
    schema: String,
    table: String,
    temporary: bool,
}

impl TableIdentifier {
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            table: table.into(),
            temporary: false,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns `true` for staging tables created by a merge.
    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Returns an identifier for `table` in the same database and schema.
    pub fn with_table(&self, table: impl Into<String>) -> Self {
        Self {
            database: self.database.clone(),
            schema: self.schema.clone(),
            table: table.into(),
            temporary: false,
        }
    }

    pub fn with_temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    /// Returns the quoted name used in SQL statements.
    pub fn fully_qualified_name<D>(&self, dialect: &D) -> String
    where
        D: Dialect + ?Sized,
    {
        dialect.fully_qualified_name(self)
    }
}

impl fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.database, self.schema, self.table)
    }
}
