//! Global/local split of a plan.
//!
//! The unary prefix above the first join (or leaf) decides the shape:
//!
//! ```text
//! AGG(FILTER(JOIN(L, R)))          global: AGG'(EXCHANGE)   (AGG' = final)
//!                           ==>    merge:  Aggregate
//!                                  local:  PARTIAL_AGG(FILTER(JOIN(L*, R)))
//! ```
//!
//! `L*` is the broadcast side: the coordinator runs it as its own distributed
//! query and replaces it with a `VALUES` leaf before shipping the local plan.
//! A join whose right side aggregates cannot be run per partition, so such a
//! plan is marked global throughout and runs on the coordinator over
//! materialized children.

use distq_core::prelude::Schema;
use distq_operators::{AggregateMode, AggregateSpec};

use crate::error::Result;
use crate::plan::QueryPlan;

/// How the coordinator combines the rows streamed back by workers.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeSpec {
    /// Append every row.
    Concat,
    /// Rows are partial aggregate state for `spec` over `input`; merge them
    /// per group and finalize.
    Aggregate { spec: AggregateSpec, input: Schema },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistributedPlan {
    /// Plan every worker runs on its own partition. `None` when the whole
    /// plan runs on the coordinator.
    pub local: Option<QueryPlan>,
    pub merge: MergeSpec,
    /// Plan the coordinator runs once. Its `Exchange` leaf, if any, yields the
    /// merged worker rows.
    pub global: QueryPlan,
}

impl DistributedPlan {
    /// Schema of the rows each worker sends back.
    pub fn local_schema(&self) -> Option<&Schema> {
        self.local.as_ref().map(QueryPlan::schema)
    }

    /// Schema of the merged rows the `Exchange` leaf yields.
    pub fn exchange_schema(&self) -> Option<Schema> {
        let local = self.local.as_ref()?;
        match &self.merge {
            MergeSpec::Concat => Some(local.schema().clone()),
            MergeSpec::Aggregate { spec, input } => {
                spec.output_schema(input, AggregateMode::Complete).ok()
            }
        }
    }
}

pub fn split(mut plan: QueryPlan) -> Result<DistributedPlan> {
    if let Some(join) = first_join(&plan) {
        let right_aggregates = match join {
            QueryPlan::Join { right, .. } => right.contains_aggregate(),
            _ => false,
        };
        if right_aggregates {
            plan.set_is_global(true);
            return Ok(DistributedPlan {
                local: None,
                merge: MergeSpec::Concat,
                global: plan,
            });
        }
        plan.set_is_global(false);
    }

    match cut(plan)? {
        Cut::Whole(local) => {
            let global = QueryPlan::exchange(local.schema().clone());
            Ok(DistributedPlan {
                local: Some(local),
                merge: MergeSpec::Concat,
                global,
            })
        }
        Cut::Split {
            global,
            local,
            merge,
        } => Ok(DistributedPlan {
            local: Some(local),
            merge,
            global,
        }),
    }
}

/// The first join reached through single-child nodes from the root.
fn first_join(plan: &QueryPlan) -> Option<&QueryPlan> {
    match plan {
        QueryPlan::Join { .. } => Some(plan),
        QueryPlan::Filter { input, .. }
        | QueryPlan::Project { input, .. }
        | QueryPlan::Aggregate { input, .. } => first_join(input),
        QueryPlan::Scan { .. } | QueryPlan::Values { .. } | QueryPlan::Exchange { .. } => None,
    }
}

enum Cut {
    Whole(QueryPlan),
    Split {
        global: QueryPlan,
        local: QueryPlan,
        merge: MergeSpec,
    },
}

/// Split at the lowest complete aggregate of the unary prefix. Nodes below it
/// stay local; nodes above it are rebuilt over an `Exchange`.
fn cut(plan: QueryPlan) -> Result<Cut> {
    match plan {
        QueryPlan::Filter { input, predicate } => Ok(match cut(*input)? {
            Cut::Whole(p) => Cut::Whole(QueryPlan::filter(p, predicate)?),
            Cut::Split {
                global,
                local,
                merge,
            } => Cut::Split {
                global: QueryPlan::filter(global, predicate)?,
                local,
                merge,
            },
        }),
        QueryPlan::Project { input, columns, .. } => Ok(match cut(*input)? {
            Cut::Whole(p) => Cut::Whole(QueryPlan::project(p, columns)?),
            Cut::Split {
                global,
                local,
                merge,
            } => Cut::Split {
                global: QueryPlan::project(global, columns)?,
                local,
                merge,
            },
        }),
        QueryPlan::Aggregate {
            input, spec, mode, ..
        } => Ok(match cut(*input)? {
            Cut::Whole(p) if mode == AggregateMode::Complete => {
                let merge = MergeSpec::Aggregate {
                    spec,
                    input: p.schema().clone(),
                };
                let exchange = spec.output_schema(p.schema(), AggregateMode::Complete)?;
                Cut::Split {
                    global: QueryPlan::exchange(exchange),
                    local: QueryPlan::aggregate(p, spec, AggregateMode::Partial)?,
                    merge,
                }
            }
            Cut::Whole(p) => Cut::Whole(QueryPlan::aggregate(p, spec, mode)?),
            Cut::Split {
                global,
                local,
                merge,
            } => Cut::Split {
                global: QueryPlan::aggregate(global, spec, mode)?,
                local,
                merge,
            },
        }),
        leaf_or_join => Ok(Cut::Whole(leaf_or_join)),
    }
}
