//! Flushing buffered tables: schema evolution, staging, merge and append.

mod default_value;
mod orchestrator;
mod statements;

pub use default_value::{backfill_column, render_default_value};
pub use orchestrator::{AppendOptions, MergeOptions, Orchestrator};
pub use statements::exec_statements;
