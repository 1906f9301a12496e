//! Reconciliation of buffered columns against the destination's schema.

mod cache;
mod diff;
mod introspection;

pub use cache::{
    DELETION_CONFIDENCE_PADDING_HOURS, DestinationTableConfig, DestinationTableConfigMap,
};
pub use diff::{DiffResult, diff, diff_and_filter};
pub use introspection::get_table_config;
