//! Worker catalog: which tables this node serves and where their rows live.
//!
//! ```yaml
//! tables:
//!   - name: orders
//!     file: orders.csv        # relative to the data directory
//!     schema:
//!       - { name: id,    type: int }
//!       - { name: total, type: float }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use distq_core::prelude::{DataType, Field, Schema, SchemaProvider};
use distq_operators::{PartitionSource, SourceProvider};
use serde::{Deserialize, Serialize};

use crate::csv_table::CsvTable;
use crate::error::{IoError, Result};

pub const CATALOG_FILE: &str = "catalog.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub tables: Vec<TableDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub file: String,
    pub schema: Vec<ColumnDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.keyword().to_ascii_lowercase(),
        }
    }
}

/// Build a schema from YAML column definitions.
pub fn schema_from_defs(columns: &[ColumnDef]) -> Result<Schema> {
    if columns.is_empty() {
        return Err(IoError::Catalog("table has no columns".into()));
    }
    let fields = columns
        .iter()
        .map(|c| -> Result<Field> {
            Ok(Field::new(c.name.clone(), c.data_type.parse::<DataType>()?))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Schema::new(fields))
}

impl CatalogFile {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write `catalog.yaml` into `dir`.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        fs::write(dir.as_ref().join(CATALOG_FILE), self.to_yaml()?)?;
        Ok(())
    }
}

/// Tables by name. Also the `SchemaProvider` workers parse plans against.
#[derive(Clone, Default)]
pub struct Catalog {
    tables: BTreeMap<String, Arc<dyn PartitionSource>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `catalog.yaml` from `data_dir` and open every listed CSV file.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref();
        let path = dir.join(CATALOG_FILE);
        let text = fs::read_to_string(&path)
            .map_err(|e| IoError::Catalog(format!("{}: {e}", path.display())))?;
        let file = CatalogFile::from_yaml(&text)?;

        let mut catalog = Catalog::new();
        for def in &file.tables {
            let schema = schema_from_defs(&def.schema)
                .map_err(|e| IoError::Catalog(format!("table '{}': {e}", def.name)))?;
            let table = CsvTable::open(dir.join(&def.file), schema)?;
            catalog.register(def.name.clone(), Arc::new(table))?;
        }
        Ok(catalog)
    }

    pub fn register(&mut self, name: impl Into<String>, table: Arc<dyn PartitionSource>) -> Result<()> {
        let name = name.into();
        if self.tables.contains_key(&name) {
            return Err(IoError::Catalog(format!("table '{name}' registered twice")));
        }
        self.tables.insert(name, table);
        Ok(())
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl SchemaProvider for Catalog {
    fn table_schema(&self, table: &str) -> Option<Schema> {
        self.tables.get(table).map(|t| t.schema().clone())
    }
}

impl SourceProvider for Catalog {
    fn source(&self, table: &str) -> Option<Arc<dyn PartitionSource>> {
        self.tables.get(table).cloned()
    }
}
