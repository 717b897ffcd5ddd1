//! Lowering: `QueryPlan` -> executable `ExecNode` tree.

use distq_core::prelude::Tuple;
use distq_operators::{ExecNode, SourceProvider};

use crate::error::{PlanError, Result};
use crate::plan::QueryPlan;

/// Where leaves get their rows from.
///
/// Workers lower with a `SourceProvider` over their partitions. The
/// coordinator has no partitions; it lowers with the merged worker rows,
/// which feed the single `Exchange` leaf.
#[derive(Default)]
pub struct Lowering<'a> {
    sources: Option<&'a dyn SourceProvider>,
    exchange: Option<Vec<Tuple>>,
}

impl<'a> Lowering<'a> {
    pub fn new(sources: &'a dyn SourceProvider) -> Self {
        Self {
            sources: Some(sources),
            exchange: None,
        }
    }

    pub fn with_exchange(mut self, rows: Vec<Tuple>) -> Self {
        self.exchange = Some(rows);
        self
    }

    pub fn lower(&mut self, plan: &QueryPlan) -> Result<ExecNode> {
        let node = match plan {
            QueryPlan::Scan { table, schema } => {
                let sources = self.sources.ok_or_else(|| {
                    PlanError::Invalid(format!("SCAN({table}) needs a local partition"))
                })?;
                let source = sources
                    .source(table)
                    .ok_or_else(|| PlanError::UnknownTable(table.clone()))?;
                if source.schema() != schema {
                    return Err(PlanError::Schema(format!(
                        "table '{table}' has schema {}, plan expects {schema}",
                        source.schema()
                    )));
                }
                ExecNode::scan(table.clone(), source)
            }
            QueryPlan::Values { schema, rows } => ExecNode::values(schema.clone(), rows.clone()),
            QueryPlan::Exchange { schema } => {
                let rows = self.exchange.take().ok_or_else(|| {
                    PlanError::Invalid("EXCHANGE has no merged rows to read".into())
                })?;
                ExecNode::values(schema.clone(), rows)
            }
            QueryPlan::Filter { input, predicate } => {
                ExecNode::filter(self.lower(input)?, predicate.clone())?
            }
            QueryPlan::Project { input, columns, .. } => {
                ExecNode::project(self.lower(input)?, columns.clone())?
            }
            QueryPlan::Join {
                left,
                right,
                predicate,
                ..
            } => {
                let l = self.lower(left)?;
                let r = self.lower(right)?;
                ExecNode::join(l, r, *predicate)?
            }
            QueryPlan::Aggregate {
                input, spec, mode, ..
            } => ExecNode::aggregate(self.lower(input)?, *spec, *mode)?,
        };
        Ok(node)
    }
}

/// Lower a plan that reads only local partitions.
pub fn lower(plan: &QueryPlan, sources: &dyn SourceProvider) -> Result<ExecNode> {
    Lowering::new(sources).lower(plan)
}
