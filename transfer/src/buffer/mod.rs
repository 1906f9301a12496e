//! Per-table accumulation of change events between flushes.

mod row;
mod table_data;

pub use row::{Row, approx_row_size};
pub use table_data::{FlushReason, TableData};
