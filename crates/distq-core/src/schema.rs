//! Logical schema types. Pure data; shared by planner, operators and the wire codec.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int64,
    Float64,
    Utf8,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int64 | DataType::Float64)
    }

    /// Keyword used by the textual plan grammar (`VALUES([v:INT], ...)`).
    pub fn keyword(&self) -> &'static str {
        match self {
            DataType::Int64 => "INT",
            DataType::Float64 => "FLOAT",
            DataType::Utf8 => "TEXT",
        }
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "int" | "int64" | "i64" | "integer" => Ok(DataType::Int64),
            "float" | "float64" | "f64" | "double" => Ok(DataType::Float64),
            "text" | "utf8" | "string" | "str" => Ok(DataType::Utf8),
            other => Err(Error::Schema(format!("unknown data type '{other}'"))),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Resolve a column reference that is either a positional index or a name.
    pub fn resolve(&self, column: &str) -> Result<usize> {
        if let Ok(idx) = column.parse::<usize>() {
            if idx < self.fields.len() {
                return Ok(idx);
            }
            return Err(Error::Schema(format!(
                "column index {idx} out of range for {} columns",
                self.fields.len()
            )));
        }
        self.index_of(column)
            .ok_or_else(|| Error::Schema(format!("column '{column}' not found")))
    }

    /// Schema of a join output: left fields followed by right fields.
    ///
    /// Right-hand names that collide with a left name get a `_right` suffix.
    pub fn join(left: &Schema, right: &Schema) -> Schema {
        let mut fields = left.fields.clone();
        for f in &right.fields {
            let mut out = f.clone();
            if left.fields.iter().any(|l| l.name == f.name) {
                out.name = format!("{}_right", f.name);
            }
            fields.push(out);
        }
        Schema { fields }
    }

    /// Keep only the given columns, in the given order.
    pub fn project(&self, columns: &[usize]) -> Result<Schema> {
        let fields = columns
            .iter()
            .map(|&i| {
                self.fields.get(i).cloned().ok_or_else(|| {
                    Error::Schema(format!("project column {i} out of range"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Schema { fields })
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}:{}", field.name, field.data_type)?;
        }
        f.write_str("]")
    }
}

/// Source of table schemas for plan construction.
///
/// The coordinator only knows schemas (from its cluster file); workers
/// additionally hold data. Both resolve `SCAN(table)` through this trait.
pub trait SchemaProvider {
    fn table_schema(&self, table: &str) -> Option<Schema>;
}

impl SchemaProvider for HashMap<String, Schema> {
    fn table_schema(&self, table: &str) -> Option<Schema> {
        self.get(table).cloned()
    }
}
