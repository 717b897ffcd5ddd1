//! Leaf over rows already in memory.
//!
//! Used for `VALUES(...)` plan nodes (a global subtree materialized by the
//! coordinator and shipped inline) and for the coordinator's exchange leaf.

use distq_core::prelude::{Schema, Tuple};

pub struct Values {
    schema: Schema,
    rows: Vec<Tuple>,
    pos: usize,
}

impl Values {
    pub fn new(schema: Schema, rows: Vec<Tuple>) -> Self {
        Self {
            schema,
            rows,
            pos: 0,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn open(&mut self) {
        self.pos = 0;
    }

    pub(crate) fn fetch_next(&mut self) -> Option<Tuple> {
        let row = self.rows.get(self.pos).cloned();
        if row.is_some() {
            self.pos += 1;
        }
        row
    }

    pub(crate) fn rewind(&mut self) {
        self.pos = 0;
    }

    pub(crate) fn close(&mut self) {
        self.pos = self.rows.len();
    }
}
