//! Shared helpers: in-process workers on ephemeral ports and scripted fakes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use distq_core::prelude::{DataType, EngineConfig, Field, Scalar, Schema, Tuple};
use distq_exec::{Coordinator, Worker, WorkerAddr};
use distq_io::{Catalog, MemoryTable};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

pub fn kv_schema(key: &str, value: &str) -> Schema {
    Schema::new(vec![
        Field::new(key, DataType::Int64),
        Field::new(value, DataType::Int64),
    ])
}

pub fn ints(values: &[i64]) -> Tuple {
    Tuple::new(values.iter().map(|v| Scalar::Int(*v)).collect())
}

pub fn rows(values: &[&[i64]]) -> Vec<Tuple> {
    values.iter().map(|r| ints(r)).collect()
}

/// One partition: `(table, schema, rows)` per table.
pub type Partition = Vec<(&'static str, Schema, Vec<Tuple>)>;

/// Start a real worker over in-memory tables and return its address.
pub async fn spawn_worker(partition: Partition) -> WorkerAddr {
    let mut catalog = Catalog::new();
    for (name, schema, rows) in partition {
        catalog
            .register(name, Arc::new(MemoryTable::with_rows(schema, rows)))
            .unwrap();
    }
    let worker = Worker::bind("127.0.0.1:0", catalog, EngineConfig::default())
        .await
        .unwrap();
    let addr = worker.local_addr().unwrap();
    tokio::spawn(worker.serve());
    WorkerAddr::from(addr)
}

/// A fake worker that reads the request line and replies with `script`
/// verbatim, then either closes the socket or holds it open for `hold`.
pub async fn spawn_fake(script: &'static str, hold: Option<Duration>) -> WorkerAddr {
    spawn_scripted(script, Duration::ZERO, hold).await
}

/// Like `spawn_fake`, but waits `delay` after the request before replying.
pub async fn spawn_slow_fake(script: &'static str, delay: Duration) -> WorkerAddr {
    spawn_scripted(script, delay, None).await
}

async fn spawn_scripted(
    script: &'static str,
    delay: Duration,
    hold: Option<Duration>,
) -> WorkerAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (reader, mut writer) = socket.into_split();
                let mut request = String::new();
                let _ = BufReader::new(reader).read_line(&mut request).await;
                tokio::time::sleep(delay).await;
                let _ = writer.write_all(script.as_bytes()).await;
                let _ = writer.flush().await;
                if let Some(hold) = hold {
                    tokio::time::sleep(hold).await;
                }
            });
        }
    });
    WorkerAddr::from(addr)
}

pub fn coordinator(workers: Vec<WorkerAddr>, tables: &[(&str, Schema)]) -> Coordinator {
    coordinator_with(workers, tables, EngineConfig::default())
}

pub fn coordinator_with(
    workers: Vec<WorkerAddr>,
    tables: &[(&str, Schema)],
    config: EngineConfig,
) -> Coordinator {
    let schemas: HashMap<String, Schema> = tables
        .iter()
        .map(|(name, schema)| (name.to_string(), schema.clone()))
        .collect();
    Coordinator::new(workers, schemas, config)
}

/// Rows in a stable order so results from concurrent workers compare.
pub fn sorted(mut rows: Vec<Tuple>) -> Vec<Tuple> {
    rows.sort_by_key(|t| t.to_string());
    rows
}
