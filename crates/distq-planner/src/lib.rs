#![forbid(unsafe_code)]
//! distq-planner: the `QueryPlan` tree and everything done to it before
//! execution.
//!
//! - `plan`: tagged plan tree with fixed output schemas and the
//!   global/local annotation carried by joins.
//! - `text`: one-line textual form. `Display` serializes, `parse` reads it
//!   back against a `SchemaProvider`.
//! - `split`: cut a plan into the part every worker runs, the merge the
//!   coordinator applies to worker rows, and the part run once on top.
//! - `lower`: turn a plan into an executable `ExecNode`.

pub mod error;
pub mod lower;
pub mod plan;
pub mod split;
pub mod text;

pub use error::{PlanError, Result};
pub use lower::{lower, Lowering};
pub use plan::QueryPlan;
pub use split::{split, DistributedPlan, MergeSpec};
pub use text::parse;
