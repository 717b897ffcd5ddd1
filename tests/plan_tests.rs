//! Planning and single-node execution without any networking.

mod common;

use std::sync::Arc;

use common::*;
use distq_core::prelude::{DataType, Field, Scalar, Schema, Tuple};
use distq_exec::execute_local;
use distq_io::{Catalog, MemoryTable};
use distq_operators::{
    AggregateFunc, AggregateMode, AggregateSpec, ExecNode, GroupedAggregator, OpError,
};
use distq_planner::{lower, parse, split, MergeSpec, QueryPlan};

fn catalog() -> Catalog {
    let mut c = Catalog::new();
    c.register(
        "a",
        Arc::new(MemoryTable::with_rows(
            kv_schema("k", "v"),
            rows(&[&[1, 10], &[2, 20], &[2, 21]]),
        )),
    )
    .unwrap();
    c.register(
        "b",
        Arc::new(MemoryTable::with_rows(
            kv_schema("k", "w"),
            rows(&[&[2, 200], &[3, 300]]),
        )),
    )
    .unwrap();
    c.register(
        "empty",
        Arc::new(MemoryTable::new(kv_schema("k", "v"))),
    )
    .unwrap();
    c
}

#[test]
fn local_pipeline_matches_hand_computed_rows() {
    let c = catalog();
    let (schema, out) = execute_local(&c, "PROJECT(JOIN(SCAN(a), SCAN(b), k = k), v, w)").unwrap();
    assert_eq!(schema.to_string(), "[v:INT, w:INT]");
    assert_eq!(out, rows(&[&[20, 200], &[21, 200]]));

    let (_, out) = execute_local(&c, "AGG(SCAN(a), SUM(v), GROUP k)").unwrap();
    assert_eq!(out, rows(&[&[1, 10], &[2, 41]]));
}

#[test]
fn join_with_an_empty_side_is_empty() {
    let c = catalog();
    let (_, out) = execute_local(&c, "JOIN(SCAN(a), SCAN(empty), 0 = 0)").unwrap();
    assert!(out.is_empty());
    let (_, out) = execute_local(&c, "JOIN(SCAN(empty), SCAN(b), 0 = 0)").unwrap();
    assert!(out.is_empty());
}

#[test]
fn theta_join_emits_every_matching_pair() {
    let c = catalog();
    let (_, out) = execute_local(&c, "JOIN(SCAN(a), SCAN(b), 0 < 0)").unwrap();
    // 1 < {2,3}, 2 < {3} twice
    assert_eq!(out.len(), 4);
}

#[test]
fn ungrouped_aggregate_over_nothing_is_empty() {
    let c = catalog();
    let (_, out) = execute_local(&c, "AGG(SCAN(empty), COUNT(0))").unwrap();
    assert!(out.is_empty());
}

#[test]
fn partial_states_merge_into_exact_results() {
    let input = Schema::new(vec![
        Field::new("g", DataType::Utf8),
        Field::new("x", DataType::Int64),
    ]);
    let spec = AggregateSpec::new(AggregateFunc::Avg, 1, Some(0));
    let partition = |vals: &[(&str, i64)]| {
        let mut agg = GroupedAggregator::new(spec, &input).unwrap();
        for (g, x) in vals {
            agg.merge_tuple(&Tuple::new(vec![Scalar::Text((*g).into()), Scalar::Int(*x)]))
                .unwrap();
        }
        agg.results(AggregateMode::Partial).unwrap()
    };

    let mut merged = GroupedAggregator::new(spec, &input).unwrap();
    for row in partition(&[("a", 1), ("a", 2), ("b", 9)])
        .into_iter()
        .chain(partition(&[("a", 6)]))
    {
        merged.merge_partial(&row).unwrap();
    }
    let out = merged.results(AggregateMode::Complete).unwrap();
    assert_eq!(
        out,
        vec![
            Tuple::new(vec![Scalar::Text("a".into()), Scalar::Float(3.0)]),
            Tuple::new(vec![Scalar::Text("b".into()), Scalar::Float(9.0)]),
        ]
    );
}

#[test]
fn nodes_enforce_their_lifecycle() {
    let c = catalog();
    let plan = parse(&c, "FILTER(SCAN(a), v > 10)").unwrap();
    let mut node: ExecNode = lower(&plan, &c).unwrap();
    assert!(matches!(node.pull(), Err(OpError::InvalidState(_))));

    node.open().unwrap();
    assert_eq!(node.next().unwrap(), ints(&[2, 20]));
    node.rewind().unwrap();
    assert_eq!(node.next().unwrap(), ints(&[2, 20]));
    assert_eq!(node.next().unwrap(), ints(&[2, 21]));
    assert!(!node.has_next().unwrap());
    assert!(matches!(node.next(), Err(OpError::Exhausted)));
    node.close();
    assert!(matches!(node.pull(), Err(OpError::InvalidState(_))));
}

#[test]
fn plan_text_survives_the_wire() {
    let c = catalog();
    for text in [
        "SCAN(a)",
        "AGG(FILTER(SCAN(a), 1 >= -3), AVG(1), GROUP 0)",
        "PARTIAL_AGG(SCAN(b), COUNT(1))",
        "JOIN(VALUES([k:INT, s:TEXT], (1, 'it''s')), SCAN(b), 0 != 0)",
    ] {
        let plan = parse(&c, text).unwrap();
        assert_eq!(plan.to_string(), text);
        assert_eq!(parse(&c, &plan.to_string()).unwrap(), plan);
    }
}

#[test]
fn split_annotates_joins_and_aggregates() {
    let c = catalog();
    let plan = parse(&c, "AGG(JOIN(SCAN(a), SCAN(b), 0 = 0), MAX(3))").unwrap();
    let d = split(plan).unwrap();

    let Some(QueryPlan::Aggregate { input, mode, .. }) = &d.local else {
        panic!("expected a partial aggregate on the workers");
    };
    assert_eq!(*mode, AggregateMode::Partial);
    assert!(matches!(
        input.as_ref(),
        QueryPlan::Join {
            left_global: true,
            right_global: false,
            ..
        }
    ));
    assert!(matches!(d.merge, MergeSpec::Aggregate { .. }));
    assert!(matches!(d.global, QueryPlan::Exchange { .. }));
}
