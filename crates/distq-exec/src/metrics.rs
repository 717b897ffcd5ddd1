//! Per-query counters, reported as one `tracing` event when a query ends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use distq_core::prelude::QueryId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStat {
    pub worker: String,
    pub rows: u64,
    pub elapsed: Duration,
}

/// Counters shared by the worker tasks of one query (sub-queries included).
#[derive(Debug)]
pub struct QueryMetrics {
    query: QueryId,
    started: Instant,
    rows_received: AtomicU64,
    dispatches: AtomicU64,
    workers: Mutex<Vec<WorkerStat>>,
}

/// Point-in-time copy of `QueryMetrics`.
#[derive(Debug, Clone)]
pub struct QueryStats {
    pub query: QueryId,
    pub rows_received: u64,
    /// Number of worker fan-outs, one per distributed (sub-)query.
    pub dispatches: u64,
    pub workers: Vec<WorkerStat>,
    pub elapsed: Duration,
}

impl QueryMetrics {
    pub fn new(query: QueryId) -> Self {
        Self {
            query,
            started: Instant::now(),
            rows_received: AtomicU64::new(0),
            dispatches: AtomicU64::new(0),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn record_dispatch(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_worker(&self, worker: String, rows: u64, elapsed: Duration) {
        self.rows_received.fetch_add(rows, Ordering::Relaxed);
        if let Ok(mut w) = self.workers.lock() {
            w.push(WorkerStat {
                worker,
                rows,
                elapsed,
            });
        }
    }

    pub fn snapshot(&self) -> QueryStats {
        QueryStats {
            query: self.query,
            rows_received: self.rows_received.load(Ordering::Relaxed),
            dispatches: self.dispatches.load(Ordering::Relaxed),
            workers: self.workers.lock().map(|w| w.clone()).unwrap_or_default(),
            elapsed: self.started.elapsed(),
        }
    }

    /// Emit the summary event for a finished query.
    pub fn emit(&self, rows_out: usize) {
        let stats = self.snapshot();
        tracing::info!(
            query = %stats.query,
            rows_out,
            rows_received = stats.rows_received,
            dispatches = stats.dispatches,
            workers = stats.workers.len(),
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "query finished"
        );
        for w in &stats.workers {
            tracing::debug!(
                query = %stats.query,
                worker = %w.worker,
                rows = w.rows,
                elapsed_ms = w.elapsed.as_millis() as u64,
                "worker stream"
            );
        }
    }
}
