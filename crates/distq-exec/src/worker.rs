//! Worker: accepts coordinator connections and runs local plans against its
//! own partition.
//!
//! Each connection carries exactly one request. The plan is parsed against
//! the local catalog, lowered, and pulled on a blocking thread; rows are
//! forwarded over a bounded channel and written (and flushed) one frame at a
//! time, then `END <count>` or `ERR <message>` closes the response.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use distq_core::prelude::{EngineConfig, Schema, Tuple};
use distq_io::Catalog;
use distq_planner::{lower, parse, QueryPlan};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn, Instrument};

use crate::error::{ExecError, Result};
use crate::wire::{request_codec, Frame, FrameCodec};

/// Rows buffered between the operator thread and the socket writer.
const ROW_BUFFER: usize = 256;

pub struct Worker {
    listener: TcpListener,
    catalog: Arc<Catalog>,
    config: EngineConfig,
}

impl Worker {
    pub async fn bind(addr: impl ToSocketAddrs, catalog: Catalog, config: EngineConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            catalog: Arc::new(catalog),
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the process exits.
    pub async fn serve(self) -> Result<()> {
        self.serve_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves. In-flight connections keep running.
    pub async fn serve_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let addr = self.local_addr()?;
        info!(%addr, tables = self.catalog.len(), "worker listening");
        tokio::pin!(shutdown);
        loop {
            let (socket, peer) = tokio::select! {
                _ = &mut shutdown => {
                    info!(%addr, "worker shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        // accept errors (EMFILE and friends) are usually transient
                        warn!(%addr, error = %e, "accept failed");
                        continue;
                    }
                },
            };
            let catalog = Arc::clone(&self.catalog);
            let max_frame = self.config.max_frame_bytes;
            let span = tracing::info_span!("connection", %peer);
            tokio::spawn(
                async move {
                    if let Err(e) = handle_connection(socket, catalog, max_frame).await {
                        warn!(error = %e, "connection failed");
                    }
                }
                .instrument(span),
            );
        }
    }
}

async fn handle_connection(socket: TcpStream, catalog: Arc<Catalog>, max_frame: usize) -> Result<()> {
    let (reader, writer) = socket.into_split();
    let mut requests = FramedRead::new(reader, request_codec(max_frame));
    let mut frames = FramedWrite::new(writer, FrameCodec::new(max_frame));

    let request = match requests.next().await {
        Some(Ok(line)) => line,
        Some(Err(e)) => {
            let e = ExecError::from(e);
            frames.send(Frame::error(&e)).await?;
            return Err(e);
        }
        None => {
            debug!("peer closed before sending a plan");
            return Ok(());
        }
    };
    let started = Instant::now();
    debug!(plan = %request, "request");

    let parsed = parse(&*catalog, request.trim());
    let plan = match parsed {
        Ok(plan) => plan,
        Err(e) => {
            warn!(error = %e, "rejected plan");
            frames.send(Frame::error(&e)).await?;
            return Ok(());
        }
    };

    let (tx, mut rx) = mpsc::channel::<Tuple>(ROW_BUFFER);
    let producer = tokio::task::spawn_blocking(move || produce(&plan, &catalog, tx));

    let mut rows = 0u64;
    while let Some(tuple) = rx.recv().await {
        frames.send(Frame::row(&tuple)).await?;
        rows += 1;
    }

    let outcome = match producer.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(join) => Err(ExecError::from(join)),
    };
    match outcome {
        Ok(()) => {
            frames.send(Frame::End(rows)).await?;
            info!(rows, elapsed_ms = started.elapsed().as_millis() as u64, "plan served");
        }
        Err(e) => {
            warn!(rows, error = %e, "plan failed");
            frames.send(Frame::error(&e)).await?;
        }
    }
    Ok(())
}

/// Pull `plan` to completion, handing each row to `tx`. Stops early, without
/// error, when the receiving side has gone away.
fn produce(plan: &QueryPlan, catalog: &Catalog, tx: mpsc::Sender<Tuple>) -> Result<()> {
    let mut node = lower(plan, catalog)?;
    node.open()?;
    let pulled = loop {
        match node.pull() {
            Ok(Some(t)) => {
                if tx.blocking_send(t).is_err() {
                    break Ok(());
                }
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    node.close();
    Ok(pulled?)
}

/// Run a plan against a local catalog without any networking.
pub fn execute_local(catalog: &Catalog, text: &str) -> Result<(Schema, Vec<Tuple>)> {
    let plan = parse(catalog, text.trim())?;
    let mut node = lower(&plan, catalog)?;
    let rows = node.collect_all()?;
    Ok((plan.schema().clone(), rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use distq_core::prelude::{DataType, Field, Scalar};
    use distq_io::MemoryTable;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    fn catalog() -> Catalog {
        let schema = Schema::new(vec![Field::new("v", DataType::Int64)]);
        let rows = [4, 5].iter().map(|v| Tuple::new(vec![Scalar::Int(*v)])).collect();
        let mut c = Catalog::new();
        c.register("t", Arc::new(MemoryTable::with_rows(schema, rows)))
            .unwrap();
        c
    }

    async fn roundtrip(addr: SocketAddr, request: &str) -> Vec<String> {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut lines = BufReader::new(stream).lines();
        let mut out = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            out.push(line);
        }
        out
    }

    #[tokio::test]
    async fn streams_rows_then_end() {
        let worker = Worker::bind("127.0.0.1:0", catalog(), EngineConfig::default())
            .await
            .unwrap();
        let addr = worker.local_addr().unwrap();
        let server = tokio::spawn(worker.serve());

        let lines = roundtrip(addr, "FILTER(SCAN(t), v > 4)\n").await;
        assert_eq!(lines, vec!["ROW [5]", "END 1"]);

        let lines = roundtrip(addr, "AGG(SCAN(t), SUM(v))\n").await;
        assert_eq!(lines, vec!["ROW [9]", "END 1"]);
        server.abort();
    }

    #[tokio::test]
    async fn bad_plans_get_an_err_frame() {
        let worker = Worker::bind("127.0.0.1:0", catalog(), EngineConfig::default())
            .await
            .unwrap();
        let addr = worker.local_addr().unwrap();
        let server = tokio::spawn(worker.serve());

        let lines = roundtrip(addr, "SCAN(nope)\n").await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ERR "), "{lines:?}");

        let lines = roundtrip(addr, "FILTER(SCAN(t)\n").await;
        assert!(lines[0].starts_with("ERR syntax error"), "{lines:?}");
        server.abort();
    }

    #[test]
    fn local_execution_without_network() {
        let (schema, rows) = execute_local(&catalog(), "PROJECT(SCAN(t), 0)").unwrap();
        assert_eq!(schema.to_string(), "[v:INT]");
        assert_eq!(rows.len(), 2);
    }
}
