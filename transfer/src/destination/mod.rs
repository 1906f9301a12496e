mod base;
mod dialect;
mod table_id;

pub use base::{CatalogRow, Destination, ExecResult, Transaction};
pub use dialect::{ColumnOperation, DefaultValueStrategy, Dialect, MergeQueryArgs};
pub use table_id::TableIdentifier;
