//! CSV-backed partition: header row, then one record per tuple.
//!
//! The file is re-opened on every scan, so a scan always starts from the
//! first record and never holds the table in memory.

use std::path::{Path, PathBuf};

use distq_core::prelude::{DataType, Scalar, Schema, Tuple};
use distq_operators::{OpError, PartitionSource, TupleIter};

use crate::error::{IoError, Result};

#[derive(Debug, Clone)]
pub struct CsvTable {
    path: PathBuf,
    schema: Schema,
}

impl CsvTable {
    /// Open `path` and check its header against `schema` (same names, same
    /// order).
    pub fn open(path: impl Into<PathBuf>, schema: Schema) -> Result<Self> {
        let path = path.into();
        let mut reader = csv::Reader::from_path(&path)?;
        let header: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let expected: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        if header != expected {
            return Err(IoError::Schema(format!(
                "{}: header {:?} does not match schema {}",
                path.display(),
                header,
                schema
            )));
        }
        Ok(Self { path, schema })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PartitionSource for CsvTable {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn scan(&self) -> distq_operators::traits::Result<TupleIter> {
        let reader = csv::Reader::from_path(&self.path).map_err(IoError::from)?;
        let types: Vec<DataType> = self.schema.fields.iter().map(|f| f.data_type).collect();
        let path = self.path.display().to_string();
        let iter = reader.into_records().enumerate().map(move |(i, record)| {
            // line 1 is the header
            let line = i + 2;
            let record = record.map_err(|e| OpError::Source(format!("{path}:{line}: {e}")))?;
            if record.len() != types.len() {
                return Err(OpError::Source(format!(
                    "{path}:{line}: expected {} fields, found {}",
                    types.len(),
                    record.len()
                )));
            }
            let values = record
                .iter()
                .zip(&types)
                .map(|(cell, ty)| parse_cell(cell, *ty))
                .collect::<std::result::Result<Vec<_>, String>>()
                .map_err(|e| OpError::Source(format!("{path}:{line}: {e}")))?;
            Ok(Tuple::new(values))
        });
        Ok(Box::new(iter))
    }
}

fn parse_cell(cell: &str, ty: DataType) -> std::result::Result<Scalar, String> {
    match ty {
        DataType::Int64 => cell
            .trim()
            .parse::<i64>()
            .map(Scalar::Int)
            .map_err(|e| format!("'{cell}' is not an INT: {e}")),
        DataType::Float64 => cell
            .trim()
            .parse::<f64>()
            .map(Scalar::Float)
            .map_err(|e| format!("'{cell}' is not a FLOAT: {e}")),
        DataType::Utf8 => Ok(Scalar::Text(cell.to_string())),
    }
}

/// Write `rows` under a header derived from `schema`.
pub fn write_csv(path: impl AsRef<Path>, schema: &Schema, rows: &[Tuple]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(schema.fields.iter().map(|f| f.name.as_str()))?;
    for row in rows {
        writer.write_record(row.values.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}
