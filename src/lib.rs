#![forbid(unsafe_code)]
//! distq: one coordinator, many partitioned workers.
//!
//! Facade over the workspace crates, which the integration tests and
//! benches link against.

pub use distq_core as types;
pub use distq_exec as exec;
pub use distq_io as io;
pub use distq_operators as operators;
pub use distq_planner as planner;
