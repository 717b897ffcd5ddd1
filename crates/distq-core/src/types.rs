//! Scalar values and row tuples.
//!
//! Operators are pull-based and move one `Tuple` at a time, so the row is the
//! unit here rather than a columnar batch.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{DataType, Schema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::Int(_) => DataType::Int64,
            Scalar::Float(_) => DataType::Float64,
            Scalar::Text(_) => DataType::Utf8,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            Scalar::Text(_) => None,
        }
    }

    /// Compare two values. Int and Float compare numerically; text only
    /// compares with text.
    pub fn compare(&self, other: &Scalar) -> Result<Ordering> {
        use Scalar::*;
        match (self, other) {
            (Int(a), Int(b)) => Ok(a.cmp(b)),
            (Text(a), Text(b)) => Ok(a.cmp(b)),
            (Int(_) | Float(_), Int(_) | Float(_)) => {
                let (a, b) = (self.as_f64().unwrap_or_default(), other.as_f64().unwrap_or_default());
                Ok(float_cmp(a, b))
            }
            _ => Err(Error::Type(format!(
                "cannot compare {} with {}",
                self.data_type(),
                other.data_type()
            ))),
        }
    }

    /// Coerce into `target`, widening Int to Float when needed.
    pub fn coerce(self, target: DataType) -> Result<Scalar> {
        match (self, target) {
            (v @ Scalar::Int(_), DataType::Int64) => Ok(v),
            (v @ Scalar::Float(_), DataType::Float64) => Ok(v),
            (v @ Scalar::Text(_), DataType::Utf8) => Ok(v),
            (Scalar::Int(i), DataType::Float64) => Ok(Scalar::Float(i as f64)),
            (v, t) => Err(Error::Type(format!(
                "expected {t}, got {} value {v}",
                v.data_type()
            ))),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Int(i) => serde_json::Value::from(*i),
            // JSON has no NaN or infinity
            Scalar::Float(f) if !f.is_finite() => serde_json::Value::String(f.to_string()),
            Scalar::Float(f) => serde_json::Value::from(*f),
            Scalar::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    pub fn from_json(value: &serde_json::Value, data_type: DataType) -> Result<Scalar> {
        use serde_json::Value;
        match (value, data_type) {
            (Value::Number(n), DataType::Int64) => n
                .as_i64()
                .map(Scalar::Int)
                .ok_or_else(|| Error::Decode(format!("'{n}' is not an integer"))),
            (Value::Number(n), DataType::Float64) => n
                .as_f64()
                .map(Scalar::Float)
                .ok_or_else(|| Error::Decode(format!("'{n}' is not a float"))),
            (Value::String(s), DataType::Float64) => match s.parse::<f64>() {
                Ok(f) if !f.is_finite() => Ok(Scalar::Float(f)),
                _ => Err(Error::Decode(format!("'{s}' is not a float"))),
            },
            (Value::String(s), DataType::Utf8) => Ok(Scalar::Text(s.clone())),
            (other, t) => Err(Error::Decode(format!("cannot decode {other} as {t}"))),
        }
    }
}

fn float_cmp(a: f64, b: f64) -> Ordering {
    if a.is_nan() && b.is_nan() {
        Ordering::Equal
    } else if a.is_nan() {
        Ordering::Greater
    } else if b.is_nan() {
        Ordering::Less
    } else {
        a.partial_cmp(&b).unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v:?}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// One row. Field order matches the producing operator's schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Tuple {
    pub values: Vec<Scalar>,
}

impl Tuple {
    pub fn new(values: Vec<Scalar>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Result<&Scalar> {
        self.values.get(idx).ok_or_else(|| {
            Error::Schema(format!(
                "field {idx} out of range for tuple of {} fields",
                self.values.len()
            ))
        })
    }

    /// Concatenate two rows side-by-side (join output).
    pub fn concat(left: &Tuple, right: &Tuple) -> Tuple {
        let mut values = Vec::with_capacity(left.len() + right.len());
        values.extend(left.values.iter().cloned());
        values.extend(right.values.iter().cloned());
        Tuple { values }
    }

    pub fn project(&self, columns: &[usize]) -> Result<Tuple> {
        let values = columns
            .iter()
            .map(|&i| self.get(i).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(Tuple { values })
    }

    /// Wire form: a single JSON array.
    pub fn to_json_line(&self) -> String {
        let arr: Vec<serde_json::Value> = self.values.iter().map(Scalar::to_json).collect();
        serde_json::Value::Array(arr).to_string()
    }

    /// Decode a wire row against the schema the sender declared.
    pub fn from_json_line(line: &str, schema: &Schema) -> Result<Tuple> {
        let value: serde_json::Value = serde_json::from_str(line)?;
        let serde_json::Value::Array(items) = value else {
            return Err(Error::Decode(format!("row is not a JSON array: {line}")));
        };
        if items.len() != schema.len() {
            return Err(Error::Decode(format!(
                "row has {} fields, schema {} expects {}",
                items.len(),
                schema,
                schema.len()
            )));
        }
        let values = items
            .iter()
            .zip(&schema.fields)
            .map(|(v, f)| Scalar::from_json(v, f.data_type))
            .collect::<Result<Vec<_>>>()?;
        Ok(Tuple { values })
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str("\t")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

impl From<Vec<Scalar>> for Tuple {
    fn from(values: Vec<Scalar>) -> Self {
        Tuple { values }
    }
}
