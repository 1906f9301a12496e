use std::collections::HashMap;

use crate::types::SizeHint;
use crate::types::Value;
use crate::types::sized::checked_add_or_saturating;

/// Returns the approximate size of a row: every column name plus its value.
pub fn approx_row_size(values: &HashMap<String, Value>) -> usize {
    values.iter().fold(0, |total, (column, value)| {
        let with_name = checked_add_or_saturating(total, column.len(), "row.column_name");
        checked_add_or_saturating(with_name, value.size_hint(), "row.column_value")
    })
}

/// Latest known state of one record.
///
/// The size is computed once on construction; rows are never mutated after being buffered.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: HashMap<String, Value>,
    approx_size: usize,
}

impl Row {
    pub fn new(values: HashMap<String, Value>) -> Self {
        let approx_size = approx_row_size(&values);
        Self {
            values,
            approx_size,
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }

    pub fn approx_size(&self) -> usize {
        self.approx_size
    }
}

impl SizeHint for Row {
    fn size_hint(&self) -> usize {
        self.approx_size
    }
}
