use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Settings applied to every destination regardless of dialect.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SharedDestinationSettings {
    /// Fail a merge when fewer rows were affected than were buffered.
    #[serde(default)]
    pub enable_merge_assertion: bool,
    /// Attempts for an `ADD COLUMN` statement failing with a retryable error.
    #[serde(default = "default_ddl_max_attempts")]
    pub ddl_max_attempts: u32,
    /// Delay before the first `ADD COLUMN` retry, doubled on each attempt.
    #[serde(default = "default_ddl_retry_initial_delay_ms")]
    pub ddl_retry_initial_delay_ms: u64,
    /// Upper bound for the delay between two `ADD COLUMN` attempts.
    #[serde(default = "default_ddl_retry_max_delay_ms")]
    pub ddl_retry_max_delay_ms: u64,
}

impl SharedDestinationSettings {
    pub const DEFAULT_DDL_MAX_ATTEMPTS: u32 = 10;

    pub const DEFAULT_DDL_RETRY_INITIAL_DELAY_MS: u64 = 500;

    pub const DEFAULT_DDL_RETRY_MAX_DELAY_MS: u64 = 30_000;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ddl_max_attempts == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "shared_destination_settings.ddl_max_attempts".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.ddl_retry_initial_delay_ms > self.ddl_retry_max_delay_ms {
            return Err(ValidationError::InvalidFieldValue {
                field: "shared_destination_settings.ddl_retry_initial_delay_ms".to_string(),
                constraint: "must not exceed `ddl_retry_max_delay_ms`".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for SharedDestinationSettings {
    fn default() -> Self {
        Self {
            enable_merge_assertion: false,
            ddl_max_attempts: default_ddl_max_attempts(),
            ddl_retry_initial_delay_ms: default_ddl_retry_initial_delay_ms(),
            ddl_retry_max_delay_ms: default_ddl_retry_max_delay_ms(),
        }
    }
}

fn default_ddl_max_attempts() -> u32 {
    SharedDestinationSettings::DEFAULT_DDL_MAX_ATTEMPTS
}

fn default_ddl_retry_initial_delay_ms() -> u64 {
    SharedDestinationSettings::DEFAULT_DDL_RETRY_INITIAL_DELAY_MS
}

fn default_ddl_retry_max_delay_ms() -> u64 {
    SharedDestinationSettings::DEFAULT_DDL_RETRY_MAX_DELAY_MS
}
