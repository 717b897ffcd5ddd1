//! Executable operator tree using the iterator model.
//!
//! Every node is pulled one tuple at a time. The lifecycle is shared and
//! enforced here, once, instead of in every operator:
//!
//! ```text
//! Created --open--> Open --close--> Closed --open--> Open ...
//!                    |  ^
//!                    +--+ has_next / next / rewind
//! ```
//!
//! Pulling a node that is not open fails with `OpError::InvalidState`.

use std::sync::Arc;

use distq_core::prelude::{Schema, Tuple};

use crate::aggregate::{Aggregate, AggregateMode, AggregateSpec};
use crate::filter::Filter;
use crate::join::NestedLoopJoin;
use crate::predicate::{FieldPredicate, JoinPredicate};
use crate::project::Project;
use crate::scan::Scan;
use crate::traits::{OpError, PartitionSource, Result};
use crate::values::Values;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpState {
    Created,
    Open,
    Closed,
}

/// The concrete operator behind an `ExecNode`.
pub enum NodeKind {
    Scan(Scan),
    Values(Values),
    Filter(Filter),
    Project(Project),
    Join(NestedLoopJoin),
    Aggregate(Aggregate),
}

pub struct ExecNode {
    kind: NodeKind,
    state: OpState,
    /// Tuple fetched by `has_next` but not yet handed out by `next`.
    lookahead: Option<Tuple>,
}

impl ExecNode {
    fn from_kind(kind: NodeKind) -> Self {
        Self {
            kind,
            state: OpState::Created,
            lookahead: None,
        }
    }

    pub fn scan(table: impl Into<String>, source: Arc<dyn PartitionSource>) -> Self {
        Self::from_kind(NodeKind::Scan(Scan::new(table.into(), source)))
    }

    pub fn values(schema: Schema, rows: Vec<Tuple>) -> Self {
        Self::from_kind(NodeKind::Values(Values::new(schema, rows)))
    }

    pub fn filter(child: ExecNode, predicate: FieldPredicate) -> Result<Self> {
        Ok(Self::from_kind(NodeKind::Filter(Filter::new(
            child, predicate,
        )?)))
    }

    pub fn project(child: ExecNode, columns: Vec<usize>) -> Result<Self> {
        Ok(Self::from_kind(NodeKind::Project(Project::new(
            child, columns,
        )?)))
    }

    pub fn join(left: ExecNode, right: ExecNode, predicate: JoinPredicate) -> Result<Self> {
        Ok(Self::from_kind(NodeKind::Join(NestedLoopJoin::new(
            left, right, predicate,
        )?)))
    }

    pub fn aggregate(child: ExecNode, spec: AggregateSpec, mode: AggregateMode) -> Result<Self> {
        Ok(Self::from_kind(NodeKind::Aggregate(Aggregate::new(
            child, spec, mode,
        )?)))
    }

    pub fn name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Scan(_) => "scan",
            NodeKind::Values(_) => "values",
            NodeKind::Filter(_) => "filter",
            NodeKind::Project(_) => "project",
            NodeKind::Join(_) => "join_nested_loop",
            NodeKind::Aggregate(_) => "aggregate",
        }
    }

    pub fn state(&self) -> OpState {
        self.state
    }

    /// Output schema; fixed at construction.
    pub fn schema(&self) -> &Schema {
        match &self.kind {
            NodeKind::Scan(n) => n.schema(),
            NodeKind::Values(n) => n.schema(),
            NodeKind::Filter(n) => n.schema(),
            NodeKind::Project(n) => n.schema(),
            NodeKind::Join(n) => n.schema(),
            NodeKind::Aggregate(n) => n.schema(),
        }
    }

    pub fn open(&mut self) -> Result<()> {
        if self.state == OpState::Open {
            return Err(OpError::InvalidState(format!(
                "{} is already open",
                self.name()
            )));
        }
        match &mut self.kind {
            NodeKind::Scan(n) => n.open()?,
            NodeKind::Values(n) => n.open(),
            NodeKind::Filter(n) => n.open()?,
            NodeKind::Project(n) => n.open()?,
            NodeKind::Join(n) => n.open()?,
            NodeKind::Aggregate(n) => n.open()?,
        }
        self.lookahead = None;
        self.state = OpState::Open;
        Ok(())
    }

    pub fn has_next(&mut self) -> Result<bool> {
        self.ensure_open("has_next")?;
        if self.lookahead.is_none() {
            self.lookahead = self.fetch_next()?;
        }
        Ok(self.lookahead.is_some())
    }

    /// Next tuple, or `OpError::Exhausted` once the node has no more.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Tuple> {
        self.pull()?.ok_or(OpError::Exhausted)
    }

    /// `has_next` + `next` in one call; what parent operators use.
    pub fn pull(&mut self) -> Result<Option<Tuple>> {
        self.ensure_open("next")?;
        match self.lookahead.take() {
            Some(t) => Ok(Some(t)),
            None => self.fetch_next(),
        }
    }

    /// Restart from the first tuple without rebuilding the node.
    pub fn rewind(&mut self) -> Result<()> {
        self.ensure_open("rewind")?;
        self.lookahead = None;
        match &mut self.kind {
            NodeKind::Scan(n) => n.rewind(),
            NodeKind::Values(n) => {
                n.rewind();
                Ok(())
            }
            NodeKind::Filter(n) => n.rewind(),
            NodeKind::Project(n) => n.rewind(),
            NodeKind::Join(n) => n.rewind(),
            NodeKind::Aggregate(n) => n.rewind(),
        }
    }

    /// Release per-run state. Closing a node that is not open is a no-op.
    pub fn close(&mut self) {
        if self.state != OpState::Open {
            return;
        }
        match &mut self.kind {
            NodeKind::Scan(n) => n.close(),
            NodeKind::Values(n) => n.close(),
            NodeKind::Filter(n) => n.close(),
            NodeKind::Project(n) => n.close(),
            NodeKind::Join(n) => n.close(),
            NodeKind::Aggregate(n) => n.close(),
        }
        self.lookahead = None;
        self.state = OpState::Closed;
    }

    /// Open, drain and close. Convenience for callers that want every row.
    pub fn collect_all(&mut self) -> Result<Vec<Tuple>> {
        self.open()?;
        let mut rows = Vec::new();
        let drained = loop {
            match self.pull() {
                Ok(Some(t)) => rows.push(t),
                Ok(None) => break Ok(rows),
                Err(e) => break Err(e),
            }
        };
        self.close();
        drained
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        match &mut self.kind {
            NodeKind::Scan(n) => n.fetch_next(),
            NodeKind::Values(n) => Ok(n.fetch_next()),
            NodeKind::Filter(n) => n.fetch_next(),
            NodeKind::Project(n) => n.fetch_next(),
            NodeKind::Join(n) => n.fetch_next(),
            NodeKind::Aggregate(n) => Ok(n.fetch_next()),
        }
    }

    fn ensure_open(&self, call: &str) -> Result<()> {
        match self.state {
            OpState::Open => Ok(()),
            OpState::Created => Err(OpError::InvalidState(format!(
                "{call} on {} before open",
                self.name()
            ))),
            OpState::Closed => Err(OpError::InvalidState(format!(
                "{call} on {} after close",
                self.name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distq_core::prelude::{DataType, Field, Scalar};

    fn ints(vals: &[i64]) -> ExecNode {
        let schema = Schema::new(vec![Field::new("v", DataType::Int64)]);
        let rows = vals
            .iter()
            .map(|v| Tuple::new(vec![Scalar::Int(*v)]))
            .collect();
        ExecNode::values(schema, rows)
    }

    #[test]
    fn pull_before_open_is_invalid_state() {
        let mut node = ints(&[1]);
        assert!(matches!(node.has_next(), Err(OpError::InvalidState(_))));
        assert!(matches!(node.next(), Err(OpError::InvalidState(_))));
    }

    #[test]
    fn pull_after_close_is_invalid_state() {
        let mut node = ints(&[1, 2]);
        node.open().unwrap();
        node.close();
        assert_eq!(node.state(), OpState::Closed);
        assert!(matches!(node.pull(), Err(OpError::InvalidState(_))));
    }

    #[test]
    fn has_next_does_not_consume() {
        let mut node = ints(&[4, 5]);
        node.open().unwrap();
        assert!(node.has_next().unwrap());
        assert!(node.has_next().unwrap());
        assert_eq!(node.next().unwrap().values, vec![Scalar::Int(4)]);
        assert_eq!(node.next().unwrap().values, vec![Scalar::Int(5)]);
        assert!(!node.has_next().unwrap());
        assert!(matches!(node.next(), Err(OpError::Exhausted)));
    }

    #[test]
    fn rewind_restarts_and_double_open_fails() {
        let mut node = ints(&[1, 2, 3]);
        node.open().unwrap();
        assert!(node.open().is_err());
        node.next().unwrap();
        node.next().unwrap();
        node.rewind().unwrap();
        assert_eq!(node.next().unwrap().values, vec![Scalar::Int(1)]);
    }

    #[test]
    fn reopen_after_close_starts_over() {
        let mut node = ints(&[9, 8]);
        assert_eq!(node.collect_all().unwrap().len(), 2);
        assert_eq!(node.collect_all().unwrap().len(), 2);
    }
}
