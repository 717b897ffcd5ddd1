//! Operator error type and the seams to external data.
//!
//! Scans do not read storage themselves: a `PartitionSource` hands them a
//! fresh iterator over the local partition on every open/rewind.

use std::sync::Arc;

use distq_core::prelude::{Schema, SchemaProvider, Tuple};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OpError>;

#[derive(Debug, Error)]
pub enum OpError {
    #[error("invalid operator state: {0}")]
    InvalidState(String),

    #[error("no more tuples")]
    Exhausted,

    #[error("schema error: {0}")]
    Schema(String),

    #[error("execution error: {0}")]
    Exec(String),

    #[error("source error: {0}")]
    Source(String),
}

impl From<distq_core::Error> for OpError {
    fn from(e: distq_core::Error) -> Self {
        match e {
            distq_core::Error::Schema(m) => OpError::Schema(m),
            other => OpError::Exec(other.to_string()),
        }
    }
}

/// Stream of rows from one pass over a partition.
pub type TupleIter = Box<dyn Iterator<Item = Result<Tuple>> + Send>;

/// Rows of one table on this node.
///
/// Contract: rows come back in a stable order, the schema is fixed when the
/// table is opened, and every `scan()` restarts from the first row.
pub trait PartitionSource: Send + Sync {
    fn schema(&self) -> &Schema;

    fn scan(&self) -> Result<TupleIter>;
}

/// Table lookup used when lowering `SCAN(table)` into an executable node.
pub trait SourceProvider: SchemaProvider {
    fn source(&self, table: &str) -> Option<Arc<dyn PartitionSource>>;
}
