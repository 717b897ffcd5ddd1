#![forbid(unsafe_code)]
//! distq-exec: the networked half of the engine.
//!
//! A [`Worker`] serves one partition of every table over TCP. A
//! [`Coordinator`] splits each query, fans the local plan out to all
//! workers, merges what they stream back and runs the global plan.

pub mod cluster;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod result;
pub mod wire;
pub mod worker;

pub use cluster::{ClusterConfig, TableSchemaDef, WorkerAddr};
pub use coordinator::{Coordinator, QueryResult};
pub use error::{ExecError, Result};
pub use metrics::{QueryMetrics, QueryStats, WorkerStat};
pub use result::ResultAccumulator;
pub use wire::{Frame, FrameCodec};
pub use worker::{execute_local, Worker};
