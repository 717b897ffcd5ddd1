//! The sink every worker stream merges into.
//!
//! Worker tasks run concurrently; every merge takes the accumulator's lock,
//! so rows from different workers may interleave but state never tears.

use std::sync::{Mutex, MutexGuard};

use distq_core::prelude::{Schema, Tuple};
use distq_operators::{AggregateMode, GroupedAggregator};
use distq_planner::MergeSpec;

use crate::error::{ExecError, Result};

enum MergeState {
    Rows(Vec<Tuple>),
    /// Worker rows are partial aggregate state.
    Aggregate(GroupedAggregator),
}

pub struct ResultAccumulator {
    /// Schema of the rows workers send.
    row_schema: Schema,
    state: Mutex<MergeState>,
}

impl ResultAccumulator {
    pub fn new(merge: &MergeSpec, row_schema: Schema) -> Result<Self> {
        let state = match merge {
            MergeSpec::Concat => MergeState::Rows(Vec::new()),
            MergeSpec::Aggregate { spec, input } => {
                MergeState::Aggregate(GroupedAggregator::new(*spec, input)?)
            }
        };
        Ok(Self {
            row_schema,
            state: Mutex::new(state),
        })
    }

    pub fn row_schema(&self) -> &Schema {
        &self.row_schema
    }

    /// Merge one decoded worker row.
    pub fn merge(&self, tuple: Tuple) -> Result<()> {
        match &mut *self.lock()? {
            MergeState::Rows(rows) => rows.push(tuple),
            MergeState::Aggregate(agg) => agg.merge_partial(&tuple)?,
        }
        Ok(())
    }

    /// Decode a `ROW` payload against the worker row schema, then merge it.
    pub fn merge_line(&self, json: &str) -> Result<()> {
        let tuple = Tuple::from_json_line(json, &self.row_schema)
            .map_err(|e| ExecError::Protocol(format!("undecodable row: {e}")))?;
        self.merge(tuple)
    }

    /// Final merged rows. Aggregate state is frozen and finalized; the
    /// accumulator is empty afterwards.
    pub fn finish(&self) -> Result<Vec<Tuple>> {
        match &mut *self.lock()? {
            MergeState::Rows(rows) => Ok(std::mem::take(rows)),
            MergeState::Aggregate(agg) => {
                agg.freeze();
                let rows = agg.results(AggregateMode::Complete)?;
                agg.reset();
                Ok(rows)
            }
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MergeState>> {
        self.state
            .lock()
            .map_err(|_| ExecError::Aborted("result accumulator lock poisoned".into()))
    }
}
