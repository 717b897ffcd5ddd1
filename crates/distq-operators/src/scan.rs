//! Leaf over this node's partition of one table. No transformation.

use std::sync::Arc;

use distq_core::prelude::{Schema, Tuple};

use crate::traits::{PartitionSource, Result, TupleIter};

pub struct Scan {
    table: String,
    source: Arc<dyn PartitionSource>,
    iter: Option<TupleIter>,
}

impl Scan {
    pub fn new(table: String, source: Arc<dyn PartitionSource>) -> Self {
        Self {
            table,
            source,
            iter: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn schema(&self) -> &Schema {
        self.source.schema()
    }

    pub(crate) fn open(&mut self) -> Result<()> {
        self.iter = Some(self.source.scan()?);
        Ok(())
    }

    pub(crate) fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        match self.iter.as_mut() {
            Some(it) => it.next().transpose(),
            None => Ok(None),
        }
    }

    pub(crate) fn rewind(&mut self) -> Result<()> {
        self.open()
    }

    pub(crate) fn close(&mut self) {
        self.iter = None;
    }
}
