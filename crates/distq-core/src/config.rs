//! Engine configuration that downstream crates can serialize/deserialize.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on one worker request, from connect to the terminator frame.
    /// A worker exceeding it fails the whole query.
    pub worker_timeout_ms: u64,

    /// Upper bound on establishing the TCP connection to a worker.
    pub connect_timeout_ms: u64,

    /// Longest accepted line on the wire (request plan or result row).
    pub max_frame_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_timeout_ms: 30_000,
            connect_timeout_ms: 5_000,
            max_frame_bytes: 16 * 1024 * 1024, // 16 MiB
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `DISTQ_WORKER_TIMEOUT_MS`: per-worker request deadline
    /// - `DISTQ_CONNECT_TIMEOUT_MS`: per-worker connect deadline
    /// - `DISTQ_MAX_FRAME_BYTES`: longest accepted wire line
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("DISTQ_WORKER_TIMEOUT_MS") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.worker_timeout_ms = v;
            }
        }

        if let Ok(s) = std::env::var("DISTQ_CONNECT_TIMEOUT_MS") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.connect_timeout_ms = v;
            }
        }

        if let Ok(s) = std::env::var("DISTQ_MAX_FRAME_BYTES") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_frame_bytes = v;
            }
        }

        cfg
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
