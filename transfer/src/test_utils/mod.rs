//! Test doubles for destinations.
//!
//! [`MemoryDestination`] records every statement it receives and serves a catalog configured
//! by the test, so the reconciliation and merge paths can be asserted statement by statement
//! without a warehouse. It speaks [`TestDialect`].

mod dialect;
mod memory_destination;

pub use dialect::TestDialect;
pub use memory_destination::{
    LoadRecord, MemoryDestination, MemoryTransaction, TransactionOutcome, TransactionRecord,
};
