//! Change buffering, schema reconciliation and merge orchestration for replicating
//! change-data-capture events into analytical warehouses.
//!
//! A [`buffer::TableData`] accumulates the latest state of each row between flushes. On flush,
//! [`merge::Orchestrator`] reconciles the buffer's columns against the cached destination
//! schema, evolves the destination through [`ddl`], stages the rows in a temporary table and
//! merges them into the target. Expired temporary tables left behind by crashes are reclaimed
//! by [`merge::Orchestrator::sweep`].
//!
//! Destinations plug in through the [`destination::Destination`] and [`destination::Dialect`]
//! traits.

pub mod buffer;
pub mod ddl;
pub mod destination;
pub mod error;
mod macros;
pub mod merge;
pub mod metrics;
pub mod schema;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
