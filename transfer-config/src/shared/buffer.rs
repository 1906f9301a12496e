use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Thresholds deciding when a table's buffer is flushed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BufferConfig {
    /// Flush once a buffer holds more than this many rows.
    #[serde(default = "default_buffer_rows")]
    pub buffer_rows: u64,
    /// Flush once a buffer's approximate size exceeds this many kilobytes.
    #[serde(default = "default_flush_size_kb")]
    pub flush_size_kb: u64,
    /// Upper bound, in seconds, between two flushes of the same table.
    #[serde(default = "default_flush_interval_seconds")]
    pub flush_interval_seconds: u64,
}

impl BufferConfig {
    pub const DEFAULT_BUFFER_ROWS: u64 = 30_000;

    /// 25 MiB.
    pub const DEFAULT_FLUSH_SIZE_KB: u64 = 25 * 1024;

    pub const DEFAULT_FLUSH_INTERVAL_SECONDS: u64 = 10;

    pub const MIN_BUFFER_ROWS: u64 = 5;

    pub const MIN_FLUSH_INTERVAL_SECONDS: u64 = 5;

    pub const MAX_FLUSH_INTERVAL_SECONDS: u64 = 6 * 60 * 60;

    /// Returns the size threshold in bytes.
    pub fn flush_size_bytes(&self) -> u64 {
        self.flush_size_kb.saturating_mul(1024)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.buffer_rows < Self::MIN_BUFFER_ROWS {
            return Err(ValidationError::InvalidFieldValue {
                field: "buffer.buffer_rows".to_string(),
                constraint: format!("must be at least {}", Self::MIN_BUFFER_ROWS),
            });
        }

        if self.flush_size_kb == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "buffer.flush_size_kb".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if !(Self::MIN_FLUSH_INTERVAL_SECONDS..=Self::MAX_FLUSH_INTERVAL_SECONDS)
            .contains(&self.flush_interval_seconds)
        {
            return Err(ValidationError::InvalidFieldValue {
                field: "buffer.flush_interval_seconds".to_string(),
                constraint: format!(
                    "must be between {} and {}",
                    Self::MIN_FLUSH_INTERVAL_SECONDS,
                    Self::MAX_FLUSH_INTERVAL_SECONDS
                ),
            });
        }

        Ok(())
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            buffer_rows: default_buffer_rows(),
            flush_size_kb: default_flush_size_kb(),
            flush_interval_seconds: default_flush_interval_seconds(),
        }
    }
}

fn default_buffer_rows() -> u64 {
    BufferConfig::DEFAULT_BUFFER_ROWS
}

fn default_flush_size_kb() -> u64 {
    BufferConfig::DEFAULT_FLUSH_SIZE_KB
}

fn default_flush_interval_seconds() -> u64 {
    BufferConfig::DEFAULT_FLUSH_INTERVAL_SECONDS
}
