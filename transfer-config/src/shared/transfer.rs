use serde::Deserialize;

use crate::load::Config;
use crate::shared::{BufferConfig, Mode, SharedDestinationSettings, TopicConfig, ValidationError};

/// Top-level configuration for a transfer process.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransferConfig {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub shared_destination_settings: SharedDestinationSettings,
    pub topic_configs: Vec<TopicConfig>,
}

impl TransferConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.buffer.validate()?;
        self.shared_destination_settings.validate()?;

        if self.topic_configs.is_empty() {
            return Err(ValidationError::NoTopicConfigs);
        }

        for topic_config in &self.topic_configs {
            topic_config.validate()?;
        }

        Ok(())
    }
}

impl Config for TransferConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
