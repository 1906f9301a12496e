//! Shared configuration types for transfer pipelines.

mod base;
mod buffer;
mod destination;
mod topic;
mod transfer;

pub use base::{Mode, ValidationError};
pub use buffer::BufferConfig;
pub use destination::SharedDestinationSettings;
pub use topic::{DatabaseAndSchemaPair, TopicConfig, unique_database_and_schema};
pub use transfer::TransferConfig;
