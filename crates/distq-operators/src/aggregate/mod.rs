//! Aggregate operator.
//!
//! `open` drains the child completely into a `GroupedAggregator`, closes the
//! child, and then serves the frozen groups as a plain row iterator.
//! `rewind` discards the groups and drains the child again.

mod accumulator;
mod group;

pub use accumulator::{Accumulator, AggregateFunc, AggregateMode, AggregateSpec};
pub use group::{GroupKey, GroupedAggregator};

use distq_core::prelude::{Schema, Tuple};

use crate::node::ExecNode;
use crate::traits::Result;

pub struct Aggregate {
    child: Box<ExecNode>,
    mode: AggregateMode,
    schema: Schema,
    groups: GroupedAggregator,
    output: std::vec::IntoIter<Tuple>,
}

impl Aggregate {
    pub fn new(child: ExecNode, spec: AggregateSpec, mode: AggregateMode) -> Result<Self> {
        let schema = spec.output_schema(child.schema(), mode)?;
        let groups = GroupedAggregator::new(spec, child.schema())?;
        Ok(Self {
            child: Box::new(child),
            mode,
            schema,
            groups,
            output: Vec::new().into_iter(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn mode(&self) -> AggregateMode {
        self.mode
    }

    pub(crate) fn open(&mut self) -> Result<()> {
        self.groups.reset();
        self.drain()
    }

    pub(crate) fn fetch_next(&mut self) -> Option<Tuple> {
        self.output.next()
    }

    pub(crate) fn rewind(&mut self) -> Result<()> {
        self.groups.reset();
        self.drain()
    }

    pub(crate) fn close(&mut self) {
        self.child.close();
        self.groups.reset();
        self.output = Vec::new().into_iter();
    }

    fn drain(&mut self) -> Result<()> {
        self.child.open()?;
        let drained = loop {
            match self.child.pull() {
                Ok(Some(t)) => {
                    if let Err(e) = self.groups.merge_tuple(&t) {
                        break Err(e);
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.child.close();
        drained?;
        self.groups.freeze();
        self.output = self.groups.results(self.mode)?.into_iter();
        Ok(())
    }
}
