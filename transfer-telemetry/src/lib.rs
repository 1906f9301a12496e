//! Tracing setup shared by transfer binaries and tests.

pub mod tracing;
