#![forbid(unsafe_code)]
//! distq-io: the tables a worker serves.
//!
//! A data directory holds `catalog.yaml` plus one CSV file per table. Each
//! table is exposed to the operators as a `PartitionSource`; the `Catalog`
//! is the `SourceProvider` the worker lowers plans against.

pub mod catalog;
pub mod csv_table;
pub mod error;
pub mod memory;

pub use catalog::{schema_from_defs, Catalog, CatalogFile, ColumnDef, TableDef, CATALOG_FILE};
pub use csv_table::{write_csv, CsvTable};
pub use error::{IoError, Result};
pub use memory::MemoryTable;
