//! In-memory table. Used by tests and by callers that build rows in code.

use std::sync::{Arc, Mutex};

use distq_core::prelude::{Schema, Tuple};
use distq_operators::{OpError, PartitionSource, TupleIter};

/// Thread-safe row buffer shared between clones.
///
/// A scan snapshots the rows present when it starts; rows pushed during a
/// scan show up in the next one.
#[derive(Clone)]
pub struct MemoryTable {
    schema: Schema,
    rows: Arc<Mutex<Vec<Tuple>>>,
}

impl MemoryTable {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            rows: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_rows(schema: Schema, rows: Vec<Tuple>) -> Self {
        Self {
            schema,
            rows: Arc::new(Mutex::new(rows)),
        }
    }

    pub fn push(&self, row: Tuple) -> Result<(), OpError> {
        if row.len() != self.schema.len() {
            return Err(OpError::Schema(format!(
                "row has {} fields, table {} expects {}",
                row.len(),
                self.schema,
                self.schema.len()
            )));
        }
        self.lock()?.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) -> Result<(), OpError> {
        self.lock()?.clear();
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Tuple>>, OpError> {
        self.rows
            .lock()
            .map_err(|_| OpError::Source("memory table lock poisoned".into()))
    }
}

impl PartitionSource for MemoryTable {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn scan(&self) -> Result<TupleIter, OpError> {
        let snapshot = self.lock()?.clone();
        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distq_core::prelude::{DataType, Field, Scalar};

    #[test]
    fn clones_share_rows_and_scans_snapshot() {
        let t = MemoryTable::new(Schema::new(vec![Field::new("v", DataType::Int64)]));
        let other = t.clone();
        other.push(Tuple::new(vec![Scalar::Int(1)])).unwrap();
        let mut scan = t.scan().unwrap();
        t.push(Tuple::new(vec![Scalar::Int(2)])).unwrap();
        assert_eq!(scan.by_ref().count(), 1);
        assert_eq!(t.scan().unwrap().count(), 2);
        assert!(t.push(Tuple::new(vec![])).is_err());
    }
}
