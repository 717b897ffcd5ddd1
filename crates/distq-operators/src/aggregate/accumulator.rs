//! Aggregate functions, their running state, and the partial-state layout
//! used to merge per-worker results.

use std::fmt;
use std::str::FromStr;

use distq_core::prelude::{DataType, Field, Scalar, Schema};
use serde::{Deserialize, Serialize};

use crate::traits::{OpError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFunc {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl AggregateFunc {
    /// Case-insensitive lookup. `None` for anything that is not an aggregate.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "count" => Some(AggregateFunc::Count),
            "sum" => Some(AggregateFunc::Sum),
            "min" => Some(AggregateFunc::Min),
            "max" => Some(AggregateFunc::Max),
            "avg" | "average" => Some(AggregateFunc::Avg),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
            AggregateFunc::Avg => "AVG",
        }
    }

    /// Finalized output type for an input column of `input` type.
    pub fn output_type(&self, input: DataType) -> DataType {
        match self {
            AggregateFunc::Count => DataType::Int64,
            AggregateFunc::Sum | AggregateFunc::Min | AggregateFunc::Max => input,
            AggregateFunc::Avg => DataType::Float64,
        }
    }
}

impl FromStr for AggregateFunc {
    type Err = OpError;

    fn from_str(s: &str) -> Result<Self> {
        AggregateFunc::from_name(s)
            .ok_or_else(|| OpError::Schema(format!("unknown aggregate function '{s}'")))
    }
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `Complete` emits finalized values. `Partial` emits mergeable state, which
/// differs from the finalized value only for AVG: `(sum, count)` instead of
/// the quotient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateMode {
    Complete,
    Partial,
}

/// One aggregate over one input column with at most one grouping column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSpec {
    pub func: AggregateFunc,
    pub agg_field: usize,
    pub group_field: Option<usize>,
}

impl AggregateSpec {
    pub fn new(func: AggregateFunc, agg_field: usize, group_field: Option<usize>) -> Self {
        Self {
            func,
            agg_field,
            group_field,
        }
    }

    /// Type of the aggregated input column, after checking it is usable.
    pub fn input_type(&self, input: &Schema) -> Result<DataType> {
        let field = input.field(self.agg_field).ok_or_else(|| {
            OpError::Schema(format!(
                "aggregate column {} out of range for {}",
                self.agg_field, input
            ))
        })?;
        if !field.data_type.is_numeric() && self.func != AggregateFunc::Count {
            return Err(OpError::Schema(format!(
                "{} is not defined for {} column '{}'",
                self.func, field.data_type, field.name
            )));
        }
        if let Some(g) = self.group_field {
            if input.field(g).is_none() {
                return Err(OpError::Schema(format!(
                    "group column {g} out of range for {input}"
                )));
            }
        }
        Ok(field.data_type)
    }

    /// Output schema: `[group?, value]`, or `[group?, sum, count]` for a
    /// partial AVG.
    pub fn output_schema(&self, input: &Schema, mode: AggregateMode) -> Result<Schema> {
        let input_type = self.input_type(input)?;
        let col = &input.fields[self.agg_field].name;
        let mut fields = Vec::with_capacity(3);
        if let Some(g) = self.group_field {
            fields.push(input.fields[g].clone());
        }
        match (self.func, mode) {
            (AggregateFunc::Avg, AggregateMode::Partial) => {
                fields.push(Field::new(format!("SUM({col})"), DataType::Float64));
                fields.push(Field::new(format!("COUNT({col})"), DataType::Int64));
            }
            (func, _) => {
                fields.push(Field::new(
                    format!("{func}({col})"),
                    func.output_type(input_type),
                ));
            }
        }
        Ok(Schema::new(fields))
    }
}

/// Running state for one group.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Count(i64),
    SumInt(i64),
    SumFloat(f64),
    Min(Option<Scalar>),
    Max(Option<Scalar>),
    Avg { sum: f64, count: i64 },
}

impl Accumulator {
    pub fn new(func: AggregateFunc, input: DataType) -> Self {
        match (func, input) {
            (AggregateFunc::Count, _) => Accumulator::Count(0),
            (AggregateFunc::Sum, DataType::Int64) => Accumulator::SumInt(0),
            (AggregateFunc::Sum, _) => Accumulator::SumFloat(0.0),
            (AggregateFunc::Min, _) => Accumulator::Min(None),
            (AggregateFunc::Max, _) => Accumulator::Max(None),
            (AggregateFunc::Avg, _) => Accumulator::Avg { sum: 0.0, count: 0 },
        }
    }

    /// Fold one raw input value.
    pub fn update(&mut self, value: &Scalar) -> Result<()> {
        match self {
            Accumulator::Count(n) => *n += 1,
            Accumulator::SumInt(s) => *s = checked_add(*s, int_of(value)?)?,
            Accumulator::SumFloat(s) => *s += float_of(value)?,
            Accumulator::Min(cur) => keep_if(cur, value, std::cmp::Ordering::Less)?,
            Accumulator::Max(cur) => keep_if(cur, value, std::cmp::Ordering::Greater)?,
            Accumulator::Avg { sum, count } => {
                *sum += float_of(value)?;
                *count += 1;
            }
        }
        Ok(())
    }

    /// Fold another partition's partial state, laid out as `partial_values`
    /// produces it.
    pub fn merge(&mut self, state: &[Scalar]) -> Result<()> {
        let first = state
            .first()
            .ok_or_else(|| OpError::Exec("empty partial aggregate state".into()))?;
        match self {
            Accumulator::Count(n) => *n = checked_add(*n, int_of(first)?)?,
            Accumulator::SumInt(s) => *s = checked_add(*s, int_of(first)?)?,
            Accumulator::SumFloat(s) => *s += float_of(first)?,
            Accumulator::Min(cur) => keep_if(cur, first, std::cmp::Ordering::Less)?,
            Accumulator::Max(cur) => keep_if(cur, first, std::cmp::Ordering::Greater)?,
            Accumulator::Avg { sum, count } => {
                let c = state
                    .get(1)
                    .ok_or_else(|| OpError::Exec("partial AVG state lacks a count".into()))?;
                *sum += float_of(first)?;
                *count = checked_add(*count, int_of(c)?)?;
            }
        }
        Ok(())
    }

    /// Mergeable state for `AggregateMode::Partial`.
    pub fn partial_values(&self) -> Result<Vec<Scalar>> {
        match self {
            Accumulator::Avg { sum, count } => Ok(vec![Scalar::Float(*sum), Scalar::Int(*count)]),
            other => Ok(vec![other.finalize()?]),
        }
    }

    pub fn finalize(&self) -> Result<Scalar> {
        match self {
            Accumulator::Count(n) => Ok(Scalar::Int(*n)),
            Accumulator::SumInt(s) => Ok(Scalar::Int(*s)),
            Accumulator::SumFloat(s) => Ok(Scalar::Float(*s)),
            Accumulator::Min(v) | Accumulator::Max(v) => v
                .clone()
                .ok_or_else(|| OpError::Exec("MIN/MAX of an empty group".into())),
            Accumulator::Avg { count: 0, .. } => {
                Err(OpError::Exec("AVG of an empty group".into()))
            }
            Accumulator::Avg { sum, count } => Ok(Scalar::Float(*sum / *count as f64)),
        }
    }
}

fn int_of(v: &Scalar) -> Result<i64> {
    match v {
        Scalar::Int(i) => Ok(*i),
        other => Err(OpError::Exec(format!(
            "expected INT aggregate input, got {}",
            other.data_type()
        ))),
    }
}

fn float_of(v: &Scalar) -> Result<f64> {
    v.as_f64().ok_or_else(|| {
        OpError::Exec(format!(
            "expected numeric aggregate input, got {}",
            v.data_type()
        ))
    })
}

fn checked_add(a: i64, b: i64) -> Result<i64> {
    a.checked_add(b)
        .ok_or_else(|| OpError::Exec("integer overflow in aggregate".into()))
}

/// Replace `cur` with `value` when `value` compares as `want` against it.
fn keep_if(cur: &mut Option<Scalar>, value: &Scalar, want: std::cmp::Ordering) -> Result<()> {
    let replace = match cur {
        None => true,
        Some(c) => value.compare(c)? == want,
    };
    if replace {
        *cur = Some(value.clone());
    }
    Ok(())
}
