use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Routing and behavior flags for one source topic.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TopicConfig {
    /// Destination database the topic is written to.
    pub database: String,
    /// Destination schema the topic is written to.
    pub schema: String,
    /// Name of the source topic.
    #[serde(default)]
    pub topic: String,
    /// Overrides the destination table name derived from the event.
    #[serde(default)]
    pub table_name: Option<String>,
    /// Overrides the primary keys reported by the event.
    #[serde(default)]
    pub primary_keys_override: Vec<String>,
    /// Mark deleted rows through the delete marker column instead of removing them.
    #[serde(default)]
    pub soft_delete: bool,
    /// Allow columns missing from the source to be dropped in the destination.
    #[serde(default)]
    pub drop_deleted_columns: bool,
    #[serde(default)]
    pub include_artie_updated_at: bool,
    #[serde(default)]
    pub include_database_updated_at: bool,
    #[serde(default)]
    pub include_artie_operation: bool,
    #[serde(default)]
    pub include_source_metadata: bool,
    #[serde(default)]
    pub include_full_source_table_name: bool,
}

impl TopicConfig {
    pub fn database_and_schema(&self) -> DatabaseAndSchemaPair {
        DatabaseAndSchemaPair {
            database: self.database.clone(),
            schema: self.schema.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.database.is_empty() {
            return Err(ValidationError::MissingTopicField {
                topic: self.topic.clone(),
                field: "database",
            });
        }

        if self.schema.is_empty() {
            return Err(ValidationError::MissingTopicField {
                topic: self.topic.clone(),
                field: "schema",
            });
        }

        Ok(())
    }
}

/// Database and schema a table lives in.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DatabaseAndSchemaPair {
    pub database: String,
    pub schema: String,
}

/// Returns each distinct database/schema pair in the order it first appears.
pub fn unique_database_and_schema(topic_configs: &[TopicConfig]) -> Vec<DatabaseAndSchemaPair> {
    let mut seen = HashSet::new();
    topic_configs
        .iter()
        .map(TopicConfig::database_and_schema)
        .filter(|pair| seen.insert(pair.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(database: &str, schema: &str) -> TopicConfig {
        TopicConfig {
            database: database.to_string(),
            schema: schema.to_string(),
            ..TopicConfig::default()
        }
    }

    #[test]
    fn unique_pairs_keep_first_seen_order() {
        let configs = vec![
            topic("db", "public"),
            topic("db", "sales"),
            topic("db", "public"),
            topic("other", "public"),
        ];

        let pairs = unique_database_and_schema(&configs);

        assert_eq!(
            pairs,
            vec![
                DatabaseAndSchemaPair {
                    database: "db".to_string(),
                    schema: "public".to_string()
                },
                DatabaseAndSchemaPair {
                    database: "db".to_string(),
                    schema: "sales".to_string()
                },
                DatabaseAndSchemaPair {
                    database: "other".to_string(),
                    schema: "public".to_string()
                },
            ]
        );
    }

    #[test]
    fn validate_requires_database_and_schema() {
        assert!(topic("db", "public").validate().is_ok());
        assert_eq!(
            topic("", "public").validate(),
            Err(ValidationError::MissingTopicField {
                topic: String::new(),
                field: "database"
            })
        );
        assert!(topic("db", "").validate().is_err());
    }

    #[test]
    fn flags_default_to_false() {
        let config: TopicConfig =
            serde_json::from_str(r#"{"database": "db", "schema": "public"}"#).unwrap();

        assert!(!config.soft_delete);
        assert!(!config.drop_deleted_columns);
        assert!(config.table_name.is_none());
    }
}
