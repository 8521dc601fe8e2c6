//! Watch facility bindings
//!
//! - `native`: the host's notification service through `notify`
//! - `memory`: scripted in-process facility for tests and dry runs

pub mod memory;
pub mod native;
