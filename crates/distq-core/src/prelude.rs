//! Convenient re-exports for downstream crates.

pub use crate::config::EngineConfig;
pub use crate::error::{Error, Result};
pub use crate::id::QueryId;
pub use crate::schema::{DataType, Field, Schema, SchemaProvider};
pub use crate::types::{Scalar, Tuple};
