//! Coordinator-side cluster file.
//!
//! ```yaml
//! workers:
//!   - { host: 127.0.0.1, port: 7001 }
//!   - { host: 127.0.0.1, port: 7002 }
//! tables:
//!   - name: t
//!     schema: [ { name: k, type: text }, { name: v, type: int } ]
//! worker_timeout_ms: 10000      # optional
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use distq_core::prelude::{EngineConfig, Schema};
use distq_io::{schema_from_defs, ColumnDef};
use serde::{Deserialize, Serialize};

use crate::error::{ExecError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerAddr {
    pub host: String,
    pub port: u16,
}

impl WorkerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for WorkerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl From<std::net::SocketAddr> for WorkerAddr {
    fn from(addr: std::net::SocketAddr) -> Self {
        WorkerAddr::new(addr.ip().to_string(), addr.port())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchemaDef {
    pub name: String,
    pub schema: Vec<ColumnDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub workers: Vec<WorkerAddr>,
    #[serde(default)]
    pub tables: Vec<TableSchemaDef>,
    #[serde(default)]
    pub worker_timeout_ms: Option<u64>,
}

impl ClusterConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| ExecError::Config(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ExecError::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&text)
    }

    /// Table schemas the coordinator validates plans against.
    pub fn schemas(&self) -> Result<HashMap<String, Schema>> {
        let mut out = HashMap::with_capacity(self.tables.len());
        for t in &self.tables {
            let schema = schema_from_defs(&t.schema)
                .map_err(|e| ExecError::Config(format!("table '{}': {e}", t.name)))?;
            if out.insert(t.name.clone(), schema).is_some() {
                return Err(ExecError::Config(format!("table '{}' listed twice", t.name)));
            }
        }
        Ok(out)
    }

    /// `base` with this file's overrides applied.
    pub fn engine_config(&self, base: EngineConfig) -> EngineConfig {
        EngineConfig {
            worker_timeout_ms: self.worker_timeout_ms.unwrap_or(base.worker_timeout_ms),
            ..base
        }
    }
}
