//! Configuration types and loading for the transfer workspace.
//!
//! Types under [`shared`] are deserialized from layered configuration sources by
//! [`load::load_config`] and validated before use.

pub mod environment;
pub mod load;
pub mod shared;
