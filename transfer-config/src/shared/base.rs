use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by the `validate` methods of configuration types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    #[error("Topic config `{topic}` is missing `{field}`")]
    MissingTopicField { topic: String, field: &'static str },
    #[error("At least one topic config is required")]
    NoTopicConfigs,
}

/// How buffered rows are written to the destination.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Rows are keyed by primary key and merged into the target table.
    #[default]
    Replication,
    /// Every change is appended; the target table has no primary key.
    History,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Replication => f.write_str("replication"),
            Mode::History => f.write_str("history"),
        }
    }
}
