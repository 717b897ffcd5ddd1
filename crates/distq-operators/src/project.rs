//! Project operator: keeps a subset of columns, in the requested order.

use distq_core::prelude::{Schema, Tuple};

use crate::node::ExecNode;
use crate::traits::{OpError, Result};

pub struct Project {
    child: Box<ExecNode>,
    columns: Vec<usize>,
    schema: Schema,
}

impl Project {
    pub fn new(child: ExecNode, columns: Vec<usize>) -> Result<Self> {
        if columns.is_empty() {
            return Err(OpError::Schema("project needs at least one column".into()));
        }
        let schema = child.schema().project(&columns)?;
        Ok(Self {
            child: Box::new(child),
            columns,
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
        match self.child.pull()? {
            Some(t) => Ok(Some(t.project(&self.columns)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn rewind(&mut self) -> Result<()> {
        self.child.rewind()
    }

    pub(crate) fn close(&mut self) {
        self.child.close();
    }
}
