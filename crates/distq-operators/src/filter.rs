//! Filter operator: keeps tuples for which `field OP literal` holds.
//!
//! Pure per-row transform; no state across rows.

use distq_core::prelude::{Schema, Tuple};

use crate::node::ExecNode;
use crate::predicate::FieldPredicate;
use crate::traits::{OpError, Result};

pub struct Filter {
    child: Box<ExecNode>,
    predicate: FieldPredicate,
    schema: Schema,
}

impl Filter {
    pub fn new(child: ExecNode, predicate: FieldPredicate) -> Result<Self> {
        let schema = child.schema().clone();
        let field = schema.field(predicate.field).ok_or_else(|| {
            OpError::Schema(format!(
                "filter column {} out of range for {}",
                predicate.field, schema
            ))
        })?;
        let operand_type = predicate.operand.data_type();
        if field.data_type.is_numeric() != operand_type.is_numeric() {
            return Err(OpError::Schema(format!(
                "cannot compare column '{}' ({}) with a {} literal",
                field.name, field.data_type, operand_type
            )));
        }
        Ok(Self {
            child: Box::new(child),
            predicate,
            schema,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn open(&mut self) -> Result<()> {
        self.child.open()
    }

    pub(crate) fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        while let Some(t) = self.child.pull()? {
            if self.predicate.matches(&t)? {
                return Ok(Some(t));
            }
        }
        Ok(None)
    }

    pub(crate) fn rewind(&mut self) -> Result<()> {
        self.child.rewind()
    }

    pub(crate) fn close(&mut self) {
        self.child.close();
    }
}
