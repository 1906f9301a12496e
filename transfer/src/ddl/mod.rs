//! Schema evolution of destination tables and the lifecycle of temporary tables.

mod alter;
mod create;
mod sweep;
mod temp_table;

pub use alter::{AlterTableArgs, alter_table};
pub use create::build_create_table_sql;
pub use sweep::sweep_temporary_tables;
pub(crate) use temp_table::random_suffix;
pub use temp_table::{
    TEMPORARY_TABLE_TTL_HOURS, drop_temporary_table, should_delete_from_name, temp_table_id,
    temp_table_id_with_suffix,
};
