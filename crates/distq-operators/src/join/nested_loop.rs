//! Nested-loop join.
//!
//! For every row of the left (outer) child, the right (inner) child is
//! iterated from the start via `rewind`. Every matching pair is emitted as
//! `left ++ right`, duplicates included, in outer-then-inner order.

use distq_core::prelude::{Schema, Tuple};

use crate::node::ExecNode;
use crate::predicate::JoinPredicate;
use crate::traits::{OpError, Result};

pub struct NestedLoopJoin {
    left: Box<ExecNode>,
    right: Box<ExecNode>,
    predicate: JoinPredicate,
    schema: Schema,
    /// Outer row currently being matched against the inner side.
    outer: Option<Tuple>,
}

impl NestedLoopJoin {
    pub fn new(left: ExecNode, right: ExecNode, predicate: JoinPredicate) -> Result<Self> {
        let (ls, rs) = (left.schema(), right.schema());
        let lf = ls.field(predicate.left_field).ok_or_else(|| {
            OpError::Schema(format!(
                "join left column {} out of range for {}",
                predicate.left_field, ls
            ))
        })?;
        let rf = rs.field(predicate.right_field).ok_or_else(|| {
            OpError::Schema(format!(
                "join right column {} out of range for {}",
                predicate.right_field, rs
            ))
        })?;
        if lf.data_type.is_numeric() != rf.data_type.is_numeric() {
            return Err(OpError::Schema(format!(
                "cannot join '{}' ({}) with '{}' ({})",
                lf.name, lf.data_type, rf.name, rf.data_type
            )));
        }
        let schema = Schema::join(ls, rs);
        Ok(Self {
            left: Box::new(left),
            right: Box::new(right),
            predicate,
            schema,
            outer: None,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn open(&mut self) -> Result<()> {
        self.outer = None;
        self.left.open()?;
        self.right.open()
    }

    pub(crate) fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        loop {
            if self.outer.is_none() {
                match self.left.pull()? {
                    Some(t) => self.outer = Some(t),
                    None => return Ok(None),
                }
            }
            let Some(outer) = self.outer.as_ref() else {
                return Ok(None);
            };
            match self.right.pull()? {
                Some(inner) => {
                    if self.predicate.matches(outer, &inner)? {
                        return Ok(Some(Tuple::concat(outer, &inner)));
                    }
                }
                None => {
                    self.right.rewind()?;
                    self.outer = None;
                }
            }
        }
    }

    pub(crate) fn rewind(&mut self) -> Result<()> {
        self.outer = None;
        self.left.rewind()?;
        self.right.rewind()
    }

    pub(crate) fn close(&mut self) {
        self.outer = None;
        self.left.close();
        self.right.close();
    }
}
