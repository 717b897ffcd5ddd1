//! Join operators. Only nested-loop exists: no index is assumed on either side.

pub mod nested_loop;

pub use nested_loop::NestedLoopJoin;
