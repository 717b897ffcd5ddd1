//! The query plan tree.
//!
//! Plain data: every node carries its children and parameters, and its output
//! schema is derived once at construction from the children's schemas. The
//! constructors are the only validation point; a `QueryPlan` that exists is
//! well-typed.

use std::fmt;

use distq_core::prelude::{Scalar, Schema, Tuple};
use distq_operators::{
    AggregateMode, AggregateSpec, CmpOp, FieldPredicate, JoinPredicate,
};

use crate::error::{PlanError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    /// This node's partition of a table.
    Scan { table: String, schema: Schema },

    /// Rows carried inline in the plan.
    Values { schema: Schema, rows: Vec<Tuple> },

    /// Coordinator-only leaf standing for the merged worker output.
    Exchange { schema: Schema },

    Filter {
        input: Box<QueryPlan>,
        predicate: FieldPredicate,
    },

    Project {
        input: Box<QueryPlan>,
        columns: Vec<usize>,
        schema: Schema,
    },

    /// Nested-loop join. `left_global`/`right_global` record where each
    /// side runs once a split has annotated the tree.
    Join {
        left: Box<QueryPlan>,
        right: Box<QueryPlan>,
        predicate: JoinPredicate,
        schema: Schema,
        left_global: bool,
        right_global: bool,
    },

    Aggregate {
        input: Box<QueryPlan>,
        spec: AggregateSpec,
        mode: AggregateMode,
        schema: Schema,
    },
}

impl QueryPlan {
    pub fn scan(table: impl Into<String>, schema: Schema) -> Self {
        QueryPlan::Scan {
            table: table.into(),
            schema,
        }
    }

    /// Rows are coerced into the schema's types (INT literals widen into
    /// FLOAT columns).
    pub fn values(schema: Schema, rows: Vec<Tuple>) -> Result<Self> {
        let rows = rows
            .into_iter()
            .map(|row| {
                if row.len() != schema.len() {
                    return Err(PlanError::Schema(format!(
                        "VALUES row has {} fields, schema {} expects {}",
                        row.len(),
                        schema,
                        schema.len()
                    )));
                }
                let values = row
                    .values
                    .into_iter()
                    .zip(&schema.fields)
                    .map(|(v, f)| v.coerce(f.data_type))
                    .collect::<distq_core::Result<Vec<_>>>()?;
                Ok(Tuple::new(values))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(QueryPlan::Values { schema, rows })
    }

    pub fn exchange(schema: Schema) -> Self {
        QueryPlan::Exchange { schema }
    }

    pub fn filter(input: QueryPlan, predicate: FieldPredicate) -> Result<Self> {
        let schema = input.schema();
        let field = schema.field(predicate.field).ok_or_else(|| {
            PlanError::Schema(format!(
                "filter column {} out of range for {}",
                predicate.field, schema
            ))
        })?;
        let operand = predicate.operand.data_type();
        if field.data_type.is_numeric() != operand.is_numeric() {
            return Err(PlanError::Schema(format!(
                "cannot compare column '{}' ({}) with a {} literal",
                field.name, field.data_type, operand
            )));
        }
        Ok(QueryPlan::Filter {
            input: Box::new(input),
            predicate,
        })
    }

    pub fn project(input: QueryPlan, columns: Vec<usize>) -> Result<Self> {
        if columns.is_empty() {
            return Err(PlanError::Invalid("PROJECT needs at least one column".into()));
        }
        let schema = input.schema().project(&columns)?;
        Ok(QueryPlan::Project {
            input: Box::new(input),
            columns,
            schema,
        })
    }

    pub fn join(left: QueryPlan, right: QueryPlan, predicate: JoinPredicate) -> Result<Self> {
        let (ls, rs) = (left.schema(), right.schema());
        let lf = ls.field(predicate.left_field).ok_or_else(|| {
            PlanError::Schema(format!(
                "join left column {} out of range for {}",
                predicate.left_field, ls
            ))
        })?;
        let rf = rs.field(predicate.right_field).ok_or_else(|| {
            PlanError::Schema(format!(
                "join right column {} out of range for {}",
                predicate.right_field, rs
            ))
        })?;
        if lf.data_type.is_numeric() != rf.data_type.is_numeric() {
            return Err(PlanError::Schema(format!(
                "cannot join '{}' ({}) with '{}' ({})",
                lf.name, lf.data_type, rf.name, rf.data_type
            )));
        }
        let schema = Schema::join(ls, rs);
        Ok(QueryPlan::Join {
            left: Box::new(left),
            right: Box::new(right),
            predicate,
            schema,
            left_global: false,
            right_global: false,
        })
    }

    pub fn aggregate(input: QueryPlan, spec: AggregateSpec, mode: AggregateMode) -> Result<Self> {
        let schema = spec.output_schema(input.schema(), mode)?;
        Ok(QueryPlan::Aggregate {
            input: Box::new(input),
            spec,
            mode,
            schema,
        })
    }

    pub fn schema(&self) -> &Schema {
        match self {
            QueryPlan::Scan { schema, .. }
            | QueryPlan::Values { schema, .. }
            | QueryPlan::Exchange { schema }
            | QueryPlan::Project { schema, .. }
            | QueryPlan::Join { schema, .. }
            | QueryPlan::Aggregate { schema, .. } => schema,
            QueryPlan::Filter { input, .. } => input.schema(),
        }
    }

    pub fn children(&self) -> Vec<&QueryPlan> {
        match self {
            QueryPlan::Scan { .. } | QueryPlan::Values { .. } | QueryPlan::Exchange { .. } => {
                Vec::new()
            }
            QueryPlan::Filter { input, .. }
            | QueryPlan::Project { input, .. }
            | QueryPlan::Aggregate { input, .. } => vec![input],
            QueryPlan::Join { left, right, .. } => vec![left, right],
        }
    }

    pub fn contains_join(&self) -> bool {
        matches!(self, QueryPlan::Join { .. }) || self.children().iter().any(|c| c.contains_join())
    }

    pub fn contains_aggregate(&self) -> bool {
        matches!(self, QueryPlan::Aggregate { .. })
            || self.children().iter().any(|c| c.contains_aggregate())
    }

    /// Annotate where each join's children run.
    ///
    /// Non-join nodes forward `global` unchanged to their child. A join
    /// marked global runs both children globally; a join marked local keeps
    /// its left child global (broadcast) and its right child local.
    pub fn set_is_global(&mut self, global: bool) {
        match self {
            QueryPlan::Join {
                left,
                right,
                left_global,
                right_global,
                ..
            } => {
                *left_global = true;
                *right_global = global;
                left.set_is_global(true);
                right.set_is_global(global);
            }
            QueryPlan::Filter { input, .. }
            | QueryPlan::Project { input, .. }
            | QueryPlan::Aggregate { input, .. } => input.set_is_global(global),
            QueryPlan::Scan { .. } | QueryPlan::Values { .. } | QueryPlan::Exchange { .. } => {}
        }
    }
}

pub(crate) fn is_plain_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn write_ident(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if is_plain_ident(name) {
        return f.write_str(name);
    }
    f.write_str("\"")?;
    write_escaped(f, name, '"')?;
    f.write_str("\"")
}

/// Quote characters are doubled; backslash, CR and LF are backslash-escaped
/// so that a plan always fits on one line.
fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str, quote: char) -> fmt::Result {
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            c if c == quote => {
                f.write_str(&quote.to_string())?;
                f.write_str(&quote.to_string())?;
            }
            c => write!(f, "{c}")?,
        }
    }
    Ok(())
}

fn write_literal(f: &mut fmt::Formatter<'_>, v: &Scalar) -> fmt::Result {
    match v {
        Scalar::Text(s) => {
            f.write_str("'")?;
            write_escaped(f, s, '\'')?;
            f.write_str("'")
        }
        other => write!(f, "{other}"),
    }
}

fn write_schema(f: &mut fmt::Formatter<'_>, schema: &Schema) -> fmt::Result {
    f.write_str("[")?;
    for (i, field) in schema.fields.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_ident(f, &field.name)?;
        write!(f, ":{}", field.data_type)?;
    }
    f.write_str("]")
}

fn write_op(f: &mut fmt::Formatter<'_>, op: CmpOp) -> fmt::Result {
    write!(f, " {} ", op.symbol())
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryPlan::Scan { table, .. } => {
                f.write_str("SCAN(")?;
                write_ident(f, table)?;
                f.write_str(")")
            }
            QueryPlan::Values { schema, rows } => {
                f.write_str("VALUES(")?;
                write_schema(f, schema)?;
                for row in rows {
                    f.write_str(", (")?;
                    for (i, v) in row.values.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write_literal(f, v)?;
                    }
                    f.write_str(")")?;
                }
                f.write_str(")")
            }
            QueryPlan::Exchange { schema } => {
                f.write_str("EXCHANGE(")?;
                write_schema(f, schema)?;
                f.write_str(")")
            }
            QueryPlan::Filter { input, predicate } => {
                write!(f, "FILTER({input}, {}", predicate.field)?;
                write_op(f, predicate.op)?;
                write_literal(f, &predicate.operand)?;
                f.write_str(")")
            }
            QueryPlan::Project { input, columns, .. } => {
                write!(f, "PROJECT({input}")?;
                for c in columns {
                    write!(f, ", {c}")?;
                }
                f.write_str(")")
            }
            QueryPlan::Join {
                left,
                right,
                predicate,
                ..
            } => {
                write!(f, "JOIN({left}, {right}, {}", predicate.left_field)?;
                write_op(f, predicate.op)?;
                write!(f, "{})", predicate.right_field)
            }
            QueryPlan::Aggregate {
                input, spec, mode, ..
            } => {
                let keyword = match mode {
                    AggregateMode::Complete => "AGG",
                    AggregateMode::Partial => "PARTIAL_AGG",
                };
                write!(f, "{keyword}({input}, {}({})", spec.func, spec.agg_field)?;
                if let Some(g) = spec.group_field {
                    write!(f, ", GROUP {g}")?;
                }
                f.write_str(")")
            }
        }
    }
}
