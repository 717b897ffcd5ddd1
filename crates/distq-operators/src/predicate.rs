//! Comparison operators and the two predicate shapes the engine supports:
//! `field OP literal` (filter) and `left_field OP right_field` (join).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use distq_core::prelude::{Scalar, Tuple};
use serde::{Deserialize, Serialize};

use crate::traits::{OpError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// Canonical spelling used when a plan is serialized.
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    pub fn holds(&self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        }
    }

    pub fn eval(&self, left: &Scalar, right: &Scalar) -> Result<bool> {
        let ord = left.compare(right)?;
        Ok(self.holds(ord))
    }
}

impl FromStr for CmpOp {
    type Err = OpError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" | "==" => Ok(CmpOp::Eq),
            "!=" | "<>" => Ok(CmpOp::Ne),
            "<" => Ok(CmpOp::Lt),
            "<=" => Ok(CmpOp::Le),
            ">" => Ok(CmpOp::Gt),
            ">=" => Ok(CmpOp::Ge),
            other => Err(OpError::Exec(format!("unknown comparison operator '{other}'"))),
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// `tuple[field] OP operand`
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPredicate {
    pub field: usize,
    pub op: CmpOp,
    pub operand: Scalar,
}

impl FieldPredicate {
    pub fn new(field: usize, op: CmpOp, operand: Scalar) -> Self {
        Self { field, op, operand }
    }

    pub fn matches(&self, tuple: &Tuple) -> Result<bool> {
        self.op.eval(tuple.get(self.field)?, &self.operand)
    }
}

/// `left[left_field] OP right[right_field]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinPredicate {
    pub left_field: usize,
    pub op: CmpOp,
    pub right_field: usize,
}

impl JoinPredicate {
    pub fn new(left_field: usize, op: CmpOp, right_field: usize) -> Self {
        Self {
            left_field,
            op,
            right_field,
        }
    }

    pub fn matches(&self, left: &Tuple, right: &Tuple) -> Result<bool> {
        self.op
            .eval(left.get(self.left_field)?, right.get(self.right_field)?)
    }
}
