//! Coordinator: owns the worker roster and runs distributed queries.
//!
//! For one query:
//! 1. parse and `split` the plan;
//! 2. materialize join children marked global by running each as its own
//!    distributed query, and inline the rows as `VALUES`;
//! 3. send the local plan to every worker at once, one task per worker,
//!    merging their rows into a shared `ResultAccumulator`;
//! 4. wait for all of them (the first failure aborts the rest and fails the
//!    query), then run the global plan over the merged rows.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use distq_core::prelude::{EngineConfig, QueryId, Schema, Tuple};
use distq_planner::{parse, split, Lowering, QueryPlan};
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn, Instrument};

use crate::cluster::{ClusterConfig, WorkerAddr};
use crate::error::{ExecError, Result};
use crate::metrics::{QueryMetrics, QueryStats};
use crate::result::ResultAccumulator;
use crate::wire::{check_len, request_codec, Frame, FrameCodec};

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub schema: Schema,
    pub rows: Vec<Tuple>,
    pub stats: QueryStats,
}

pub struct Coordinator {
    workers: Vec<WorkerAddr>,
    schemas: HashMap<String, Schema>,
    config: EngineConfig,
    next_query: AtomicU64,
}

impl Coordinator {
    pub fn new(workers: Vec<WorkerAddr>, schemas: HashMap<String, Schema>, config: EngineConfig) -> Self {
        Self {
            workers,
            schemas,
            config,
            next_query: AtomicU64::new(1),
        }
    }

    /// Build from a cluster file; `base` supplies what the file leaves unset.
    pub fn from_cluster(cluster: &ClusterConfig, base: EngineConfig) -> Result<Self> {
        Ok(Self::new(
            cluster.workers.clone(),
            cluster.schemas()?,
            cluster.engine_config(base),
        ))
    }

    pub fn workers(&self) -> &[WorkerAddr] {
        &self.workers
    }

    pub fn schemas(&self) -> &HashMap<String, Schema> {
        &self.schemas
    }

    /// Parse against the cluster's table schemas. Nothing is sent.
    pub fn parse(&self, text: &str) -> Result<QueryPlan> {
        Ok(parse(&self.schemas, text.trim())?)
    }

    /// Parse and run one query. Returns once every worker has finished.
    pub async fn query(&self, text: &str) -> Result<QueryResult> {
        let plan = self.parse(text)?;
        self.execute(plan).await
    }

    pub async fn execute(&self, plan: QueryPlan) -> Result<QueryResult> {
        if self.workers.is_empty() {
            return Err(ExecError::Config("worker roster is empty".into()));
        }
        let query = QueryId::new(self.next_query.fetch_add(1, Ordering::Relaxed));
        let metrics = Arc::new(QueryMetrics::new(query));
        let schema = plan.schema().clone();
        let span = tracing::info_span!("query", id = %query);

        async {
            info!(plan = %plan, workers = self.workers.len(), "query started");
            match self.run(plan, Arc::clone(&metrics)).await {
                Ok(rows) => {
                    metrics.emit(rows.len());
                    Ok(QueryResult {
                        schema,
                        rows,
                        stats: metrics.snapshot(),
                    })
                }
                Err(e) => {
                    warn!(error = %e, "query failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run `plan` across the cluster and return its rows.
    fn run(&self, plan: QueryPlan, metrics: Arc<QueryMetrics>) -> BoxFuture<'_, Result<Vec<Tuple>>> {
        Box::pin(async move {
            let distributed = split(plan)?;
            let exchange = match distributed.local {
                Some(local) => {
                    let local = self.materialize(local, Arc::clone(&metrics)).await?;
                    let acc = Arc::new(ResultAccumulator::new(
                        &distributed.merge,
                        local.schema().clone(),
                    )?);
                    self.dispatch(&local, Arc::clone(&acc), &metrics).await?;
                    Some(acc.finish()?)
                }
                None => None,
            };
            let global = self.materialize(distributed.global, metrics).await?;

            let mut node = {
                let mut lowering = Lowering::default();
                if let Some(rows) = exchange {
                    lowering = lowering.with_exchange(rows);
                }
                lowering.lower(&global)?
            };
            let rows = tokio::task::spawn_blocking(move || node.collect_all()).await??;
            Ok(rows)
        })
    }

    /// Replace every join child marked global with the rows it produces.
    fn materialize(&self, plan: QueryPlan, metrics: Arc<QueryMetrics>) -> BoxFuture<'_, Result<QueryPlan>> {
        Box::pin(async move {
            let plan = match plan {
                QueryPlan::Join {
                    left,
                    right,
                    predicate,
                    schema,
                    left_global,
                    right_global,
                } => {
                    let left = if left_global {
                        self.broadcast(*left, Arc::clone(&metrics)).await?
                    } else {
                        self.materialize(*left, Arc::clone(&metrics)).await?
                    };
                    let right = if right_global {
                        self.broadcast(*right, metrics).await?
                    } else {
                        self.materialize(*right, metrics).await?
                    };
                    QueryPlan::Join {
                        left: Box::new(left),
                        right: Box::new(right),
                        predicate,
                        schema,
                        left_global,
                        right_global,
                    }
                }
                QueryPlan::Filter { input, predicate } => QueryPlan::Filter {
                    input: Box::new(self.materialize(*input, metrics).await?),
                    predicate,
                },
                QueryPlan::Project {
                    input,
                    columns,
                    schema,
                } => QueryPlan::Project {
                    input: Box::new(self.materialize(*input, metrics).await?),
                    columns,
                    schema,
                },
                QueryPlan::Aggregate {
                    input,
                    spec,
                    mode,
                    schema,
                } => QueryPlan::Aggregate {
                    input: Box::new(self.materialize(*input, metrics).await?),
                    spec,
                    mode,
                    schema,
                },
                leaf => leaf,
            };
            Ok(plan)
        })
    }

    async fn broadcast(&self, plan: QueryPlan, metrics: Arc<QueryMetrics>) -> Result<QueryPlan> {
        let schema = plan.schema().clone();
        debug!(plan = %plan, "materializing global join input");
        let rows = self.run(plan, metrics).await?;
        Ok(QueryPlan::values(schema, rows)?)
    }

    /// Send `local` to every worker and merge all responses into `acc`.
    async fn dispatch(&self, local: &QueryPlan, acc: Arc<ResultAccumulator>, metrics: &Arc<QueryMetrics>) -> Result<()> {
        let request = local.to_string();
        check_len(&request, self.config.max_frame_bytes)?;
        let request = Arc::new(request);
        metrics.record_dispatch();

        let mut tasks = JoinSet::new();
        for addr in &self.workers {
            let addr = addr.clone();
            let request = Arc::clone(&request);
            let acc = Arc::clone(&acc);
            let config = self.config.clone();
            let span = tracing::info_span!("worker", %addr);
            tasks.spawn(
                async move {
                    let started = Instant::now();
                    let rows = timeout(
                        config.worker_timeout(),
                        request_worker(&addr, &request, &acc, &config),
                    )
                    .await
                    .map_err(|_| ExecError::Timeout {
                        worker: addr.to_string(),
                        after_ms: config.worker_timeout_ms,
                    })??;
                    Ok::<_, ExecError>((addr, rows, started.elapsed()))
                }
                .instrument(span),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((addr, rows, elapsed))) => {
                    debug!(worker = %addr, rows, "worker finished");
                    metrics.record_worker(addr.to_string(), rows, elapsed);
                }
                Ok(Err(e)) => {
                    tasks.abort_all();
                    return Err(e);
                }
                Err(join) => {
                    tasks.abort_all();
                    return Err(ExecError::from(join));
                }
            }
        }
        Ok(())
    }
}

/// One request/response exchange with one worker. Returns the row count.
async fn request_worker(
    addr: &WorkerAddr,
    request: &str,
    acc: &ResultAccumulator,
    config: &EngineConfig,
) -> Result<u64> {
    let worker = addr.to_string();
    let stream = timeout(config.connect_timeout(), TcpStream::connect(worker.as_str()))
        .await
        .map_err(|_| ExecError::Timeout {
            worker: worker.clone(),
            after_ms: config.connect_timeout_ms,
        })?
        .map_err(|e| ExecError::Worker {
            worker: worker.clone(),
            message: format!("connect failed: {e}"),
        })?;

    let (reader, writer) = stream.into_split();
    let mut out = FramedWrite::new(writer, request_codec(config.max_frame_bytes));
    out.send(request).await?;

    let mut frames = FramedRead::new(reader, FrameCodec::new(config.max_frame_bytes));
    let mut rows = 0u64;
    while let Some(frame) = frames.next().await {
        match frame? {
            Frame::Row(json) => {
                acc.merge_line(&json)?;
                rows += 1;
            }
            Frame::End(count) if count == rows => return Ok(rows),
            Frame::End(count) => {
                return Err(ExecError::Protocol(format!(
                    "{worker} reported {count} rows but sent {rows}"
                )))
            }
            Frame::Err(message) => return Err(ExecError::Worker { worker, message }),
        }
    }
    Err(ExecError::Protocol(format!(
        "{worker} closed the stream after {rows} rows without END"
    )))
}
