#![forbid(unsafe_code)]
//! distq-operators: pull-based executable operators.
//!
//! Design intent:
//! - Synchronous, one tuple per pull; callers that need async wrap a whole
//!   tree in a blocking task.
//! - One tagged enum (`ExecNode`) dispatches open/next/rewind/close to the
//!   concrete operator; adding a node kind is an exhaustive-match change.
//! - Operators never know whether they run on a worker or the coordinator.

pub mod aggregate;
pub mod filter;
pub mod join;
pub mod node;
pub mod predicate;
pub mod project;
pub mod scan;
pub mod traits;
pub mod values;

pub use aggregate::{AggregateFunc, AggregateMode, AggregateSpec, GroupedAggregator};
pub use node::{ExecNode, OpState};
pub use predicate::{CmpOp, FieldPredicate, JoinPredicate};
pub use traits::{OpError, PartitionSource, SourceProvider, TupleIter};
