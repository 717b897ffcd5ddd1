//! Coordinator + worker end to end over loopback TCP.

mod common;

use std::time::Duration;

use common::*;
use distq::exec::{ClusterConfig, Coordinator, ExecError, Worker};
use distq_core::prelude::{EngineConfig, Scalar, Tuple};
use distq_io::{write_csv, Catalog, CatalogFile, ColumnDef, TableDef};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sum_is_merged_across_workers() {
    let schema = kv_schema("k", "v");
    // six rows split 3/3: partition sums 9 and 15
    let w1 = spawn_worker(vec![("t", schema.clone(), rows(&[&[1, 2], &[2, 3], &[3, 4]]))]).await;
    let w2 = spawn_worker(vec![("t", schema.clone(), rows(&[&[4, 4], &[5, 5], &[6, 6]]))]).await;
    let c = coordinator(vec![w1, w2], &[("t", schema)]);

    let result = c.query("AGG(SCAN(t), SUM(v))").await.unwrap();
    assert_eq!(result.rows, vec![ints(&[24])]);
    assert_eq!(result.schema.to_string(), "[SUM(v):INT]");
    assert_eq!(result.stats.workers.len(), 2);
    // each worker sends one partial row
    assert_eq!(result.stats.rows_received, 2);
}

#[tokio::test]
async fn sum_does_not_depend_on_arrival_order() {
    let schema = kv_schema("k", "v");
    // partial SUM rows of the two partitions above
    for slow_first in [true, false] {
        let delay = Duration::from_millis(150);
        let (nine, fifteen) = if slow_first {
            (
                spawn_slow_fake("ROW [9]\nEND 1\n", delay).await,
                spawn_fake("ROW [15]\nEND 1\n", None).await,
            )
        } else {
            (
                spawn_fake("ROW [9]\nEND 1\n", None).await,
                spawn_slow_fake("ROW [15]\nEND 1\n", delay).await,
            )
        };
        let c = coordinator(vec![nine, fifteen], &[("t", schema.clone())]);
        let result = c.query("AGG(SCAN(t), SUM(v))").await.unwrap();
        assert_eq!(result.rows, vec![ints(&[24])], "slow_first = {slow_first}");
    }
}

#[tokio::test]
async fn avg_is_not_an_average_of_averages() {
    let schema = kv_schema("k", "v");
    let w1 = spawn_worker(vec![("t", schema.clone(), rows(&[&[0, 4], &[0, 5]]))]).await;
    let w2 = spawn_worker(vec![("t", schema.clone(), rows(&[&[0, 7], &[0, 8], &[0, 9]]))]).await;
    let c = coordinator(vec![w1, w2], &[("t", schema)]);

    let result = c.query("AGG(SCAN(t), AVG(v))").await.unwrap();
    // (4+5+7+8+9)/5, where averaging the two partition averages gives 6.25
    assert_eq!(result.rows, vec![Tuple::new(vec![Scalar::Float(6.6)])]);
}

#[tokio::test]
async fn grouped_aggregate_yields_one_row_per_key() {
    let schema = kv_schema("k", "v");
    let w1 = spawn_worker(vec![("t", schema.clone(), rows(&[&[1, 4], &[2, 5], &[1, 1]]))]).await;
    let w2 = spawn_worker(vec![("t", schema.clone(), rows(&[&[2, 10], &[3, 7]]))]).await;
    let c = coordinator(vec![w1, w2], &[("t", schema)]);

    let result = c.query("AGG(SCAN(t), SUM(v), GROUP k)").await.unwrap();
    assert_eq!(
        sorted(result.rows),
        rows(&[&[1, 5], &[2, 15], &[3, 7]])
    );

    let result = c.query("AGG(SCAN(t), COUNT(v), GROUP 0)").await.unwrap();
    assert_eq!(sorted(result.rows), rows(&[&[1, 2], &[2, 2], &[3, 1]]));
}

#[tokio::test]
async fn operators_above_the_aggregate_run_once() {
    let schema = kv_schema("k", "v");
    let w1 = spawn_worker(vec![("t", schema.clone(), rows(&[&[1, 4], &[2, 5]]))]).await;
    let w2 = spawn_worker(vec![("t", schema.clone(), rows(&[&[2, 10], &[3, 7]]))]).await;
    let c = coordinator(vec![w1, w2], &[("t", schema)]);

    let result = c
        .query("PROJECT(FILTER(AGG(SCAN(t), SUM(v), GROUP k), 1 > 6), 0)")
        .await
        .unwrap();
    assert_eq!(sorted(result.rows), rows(&[&[2], &[3]]));
}

#[tokio::test]
async fn plain_scans_concatenate() {
    let schema = kv_schema("k", "v");
    let w1 = spawn_worker(vec![("t", schema.clone(), rows(&[&[1, 4]]))]).await;
    let w2 = spawn_worker(vec![("t", schema.clone(), rows(&[&[2, 5], &[3, 6]]))]).await;
    let c = coordinator(vec![w1, w2], &[("t", schema)]);

    let result = c.query("FILTER(SCAN(t), v >= 5)").await.unwrap();
    assert_eq!(sorted(result.rows), rows(&[&[2, 5], &[3, 6]]));
}

#[tokio::test]
async fn join_broadcasts_the_left_side() {
    let a = kv_schema("k", "v");
    let b = kv_schema("k", "w");
    let w1 = spawn_worker(vec![
        ("a", a.clone(), rows(&[&[1, 10]])),
        ("b", b.clone(), rows(&[&[1, 100], &[2, 200]])),
    ])
    .await;
    let w2 = spawn_worker(vec![
        ("a", a.clone(), rows(&[&[2, 20]])),
        ("b", b.clone(), rows(&[&[1, 101]])),
    ])
    .await;
    let c = coordinator(vec![w1, w2], &[("a", a), ("b", b)]);

    let result = c.query("JOIN(SCAN(a), SCAN(b), 0 = 0)").await.unwrap();
    // every `a` row meets every partition of `b`
    assert_eq!(
        sorted(result.rows),
        rows(&[&[1, 10, 1, 100], &[1, 10, 1, 101], &[2, 20, 2, 200]])
    );
    assert_eq!(result.schema.len(), 4);
}

#[tokio::test]
async fn join_keeps_duplicate_matches() {
    let a = kv_schema("k", "v");
    let b = kv_schema("k", "w");
    let w1 = spawn_worker(vec![
        ("a", a.clone(), rows(&[&[1, 10], &[1, 11]])),
        ("b", b.clone(), rows(&[&[1, 100], &[1, 100]])),
    ])
    .await;
    let w2 = spawn_worker(vec![("a", a.clone(), rows(&[])), ("b", b.clone(), rows(&[]))]).await;
    let c = coordinator(vec![w1, w2], &[("a", a), ("b", b)]);

    let result = c
        .query("AGG(JOIN(SCAN(a), SCAN(b), k = k), COUNT(0))")
        .await
        .unwrap();
    assert_eq!(result.rows, vec![ints(&[4])]);
}

#[tokio::test]
async fn join_over_an_aggregate_runs_on_the_coordinator() {
    let a = kv_schema("k", "v");
    let b = kv_schema("k", "w");
    let w1 = spawn_worker(vec![
        ("a", a.clone(), rows(&[&[1, 10]])),
        ("b", b.clone(), rows(&[&[1, 100], &[2, 200]])),
    ])
    .await;
    let w2 = spawn_worker(vec![
        ("a", a.clone(), rows(&[&[2, 20]])),
        ("b", b.clone(), rows(&[&[1, 101]])),
    ])
    .await;
    let c = coordinator(vec![w1, w2], &[("a", a), ("b", b)]);

    let result = c
        .query("JOIN(SCAN(a), AGG(SCAN(b), COUNT(0)), 0 < 0)")
        .await
        .unwrap();
    assert_eq!(sorted(result.rows), rows(&[&[1, 10, 3], &[2, 20, 3]]));
}

#[tokio::test]
async fn worker_error_fails_the_query() {
    let schema = kv_schema("k", "v");
    let good = spawn_worker(vec![("t", schema.clone(), rows(&[&[1, 4]]))]).await;
    let bad = spawn_fake("ERR disk on fire\n", None).await;
    let c = coordinator(vec![good, bad], &[("t", schema)]);

    match c.query("SCAN(t)").await {
        Err(ExecError::Worker { message, .. }) => assert_eq!(message, "disk on fire"),
        other => panic!("expected a worker error, got {other:?}"),
    }
}

#[tokio::test]
async fn stream_cut_mid_way_fails_the_query() {
    let schema = kv_schema("k", "v");
    let good = spawn_worker(vec![("t", schema.clone(), rows(&[&[1, 4]]))]).await;
    let cut = spawn_fake("ROW [2,5]\n", None).await;
    let c = coordinator(vec![good, cut], &[("t", schema)]);

    let err = c.query("SCAN(t)").await.unwrap_err();
    assert!(matches!(err, ExecError::Protocol(_)), "{err}");
}

#[tokio::test]
async fn terminator_without_newline_is_a_cut_stream() {
    let schema = kv_schema("k", "v");
    let cut = spawn_fake("ROW [2,5]\nEND 1", None).await;
    let c = coordinator(vec![cut], &[("t", schema)]);

    let err = c.query("SCAN(t)").await.unwrap_err();
    assert!(matches!(err, ExecError::Protocol(_)), "{err}");
}

#[tokio::test]
async fn row_count_mismatch_is_a_protocol_error() {
    let schema = kv_schema("k", "v");
    let liar = spawn_fake("ROW [2,5]\nEND 2\n", None).await;
    let c = coordinator(vec![liar], &[("t", schema)]);

    let err = c.query("SCAN(t)").await.unwrap_err();
    assert!(matches!(err, ExecError::Protocol(_)), "{err}");
}

#[tokio::test]
async fn undecodable_row_is_a_protocol_error() {
    let schema = kv_schema("k", "v");
    let garbage = spawn_fake("ROW [\"x\",5]\nEND 1\n", None).await;
    let c = coordinator(vec![garbage], &[("t", schema)]);

    let err = c.query("SCAN(t)").await.unwrap_err();
    assert!(matches!(err, ExecError::Protocol(_)), "{err}");
}

#[tokio::test]
async fn silent_worker_times_out() {
    let schema = kv_schema("k", "v");
    let good = spawn_worker(vec![("t", schema.clone(), rows(&[&[1, 4]]))]).await;
    let silent = spawn_fake("", Some(Duration::from_secs(30))).await;
    let config = EngineConfig {
        worker_timeout_ms: 200,
        ..EngineConfig::default()
    };
    let c = coordinator_with(vec![good, silent], &[("t", schema)], config);

    let started = std::time::Instant::now();
    let err = c.query("SCAN(t)").await.unwrap_err();
    assert!(matches!(err, ExecError::Timeout { after_ms: 200, .. }), "{err}");
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn syntax_errors_never_reach_the_workers() {
    let schema = kv_schema("k", "v");
    let c = coordinator(vec![spawn_fake("", None).await], &[("t", schema)]);
    assert!(matches!(
        c.query("FILTER(SCAN(t) v > 1)").await,
        Err(ExecError::Plan(_))
    ));
    assert!(matches!(c.query("SCAN(missing)").await, Err(ExecError::Plan(_))));
}

#[tokio::test]
async fn csv_partitions_and_cluster_file() {
    let schema = kv_schema("k", "v");
    let mut addrs = Vec::new();
    let mut dirs = Vec::new();
    for part in [rows(&[&[1, 4], &[2, 5]]), rows(&[&[3, 7], &[4, 8]])] {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path().join("t.csv"), &schema, &part).unwrap();
        CatalogFile {
            tables: vec![TableDef {
                name: "t".into(),
                file: "t.csv".into(),
                schema: schema
                    .fields
                    .iter()
                    .map(|f| ColumnDef::new(f.name.clone(), f.data_type))
                    .collect(),
            }],
        }
        .save(dir.path())
        .unwrap();

        let catalog = Catalog::open(dir.path()).unwrap();
        let worker = Worker::bind("127.0.0.1:0", catalog, EngineConfig::default())
            .await
            .unwrap();
        addrs.push(worker.local_addr().unwrap());
        tokio::spawn(worker.serve());
        dirs.push(dir);
    }

    let yaml = format!(
        "workers:\n  - host: 127.0.0.1\n    port: {}\n  - host: 127.0.0.1\n    port: {}\n\
         tables:\n  - name: t\n    schema:\n      - name: k\n        type: int\n      - name: v\n        type: int\n",
        addrs[0].port(),
        addrs[1].port()
    );
    let cluster = ClusterConfig::from_yaml(&yaml).unwrap();
    let c = Coordinator::from_cluster(&cluster, EngineConfig::default()).unwrap();

    let result = c.query("AGG(SCAN(t), SUM(v))").await.unwrap();
    assert_eq!(result.rows, vec![ints(&[24])]);
    let result = c.query("AGG(SCAN(t), MAX(k))").await.unwrap();
    assert_eq!(result.rows, vec![ints(&[4])]);
}
