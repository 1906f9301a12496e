use crate::types::{Kind, KindDetails, Value};

/// A column of a replicated table, as observed in memory or reported by the destination.
///
/// Two columns are the same column when their names match case-insensitively.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    pub kind_details: KindDetails,
    primary_key: bool,
    backfilled: bool,
    default_value: Option<Value>,
    toast_column: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, kind_details: impl Into<KindDetails>) -> Self {
        Self {
            name: name.into(),
            kind_details: kind_details.into(),
            primary_key: false,
            backfilled: false,
            default_value: None,
            toast_column: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        self
    }

    pub fn with_default_value(mut self, default_value: Value) -> Self {
        self.default_value = Some(default_value);
        self
    }

    pub fn with_toast_column(mut self, toast_column: bool) -> Self {
        self.toast_column = toast_column;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Kind {
        self.kind_details.kind
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn backfilled(&self) -> bool {
        self.backfilled
    }

    pub fn set_backfilled(&mut self, backfilled: bool) {
        self.backfilled = backfilled;
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    pub fn is_toast_column(&self) -> bool {
        self.toast_column
    }

    /// Columns of unknown kind never take part in DDL or merges.
    pub fn should_skip(&self) -> bool {
        self.kind_details.is_invalid()
    }

    /// A column needs a backfill when it has a default that was not yet written to existing rows.
    pub fn should_backfill(&self) -> bool {
        self.default_value.is_some() && !self.backfilled
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Ordered set of columns, unique by case-insensitive name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Columns {
    columns: Vec<Column>,
}

impl Columns {
    /// Builds a column set, keeping the first occurrence of any repeated name.
    pub fn new(columns: impl IntoIterator<Item = Column>) -> Self {
        let mut set = Self::default();
        for column in columns {
            set.add_column(column);
        }
        set
    }

    /// Adds `column` unless a column with the same name exists.
    pub fn add_column(&mut self, column: Column) {
        if self.get_column(column.name()).is_none() {
            self.columns.push(column);
        }
    }

    /// Replaces the column with the same name, or appends `column`.
    pub fn upsert_column(&mut self, column: Column) {
        match self.get_column_mut(column.name()) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    /// Returns `false` if no column has this name.
    pub fn set_backfilled(&mut self, name: &str, backfilled: bool) -> bool {
        match self.get_column_mut(name) {
            Some(column) => {
                column.set_backfilled(backfilled);
                true
            }
            None => false,
        }
    }

    pub fn delete_column(&mut self, name: &str) {
        self.columns.retain(|column| !column.has_name(name));
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.has_name(name))
    }

    pub fn get_column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|column| column.has_name(name))
    }

    pub fn get_columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Column> {
        self.columns.iter_mut()
    }

    /// Returns the columns whose kind is known.
    pub fn valid_columns(&self) -> Vec<Column> {
        self.columns
            .iter()
            .filter(|column| !column.should_skip())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<Column> for Columns {
    fn from_iter<I: IntoIterator<Item = Column>>(iter: I) -> Self {
        Columns::new(iter)
    }
}
