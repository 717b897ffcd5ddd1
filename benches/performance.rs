use criterion::{criterion_group, criterion_main, Criterion};
use distq_core::prelude::{DataType, Field, Scalar, Schema, Tuple};
use distq_operators::{
    AggregateFunc, AggregateMode, AggregateSpec, CmpOp, ExecNode, GroupedAggregator, JoinPredicate,
};

fn schema() -> Schema {
    Schema::new(vec![
        Field::new("group", DataType::Int64),
        Field::new("value", DataType::Float64),
    ])
}

fn make_rows(rows: usize) -> Vec<Tuple> {
    (0..rows)
        .map(|i| {
            Tuple::new(vec![
                Scalar::Int((i % 16) as i64),
                Scalar::Float((i % 10) as f64),
            ])
        })
        .collect()
}

fn bench_grouped_aggregate(c: &mut Criterion) {
    let rows = make_rows(4096);
    let spec = AggregateSpec::new(AggregateFunc::Avg, 1, Some(0));
    c.bench_function("aggregate_avg_grouped", |b| {
        b.iter(|| {
            let child = ExecNode::values(schema(), rows.clone());
            let mut agg = ExecNode::aggregate(child, spec, AggregateMode::Complete).unwrap();
            agg.collect_all().unwrap()
        })
    });

    // coordinator-side merge of 64 partial results
    let partials: Vec<Tuple> = {
        let mut agg = GroupedAggregator::new(spec, &schema()).unwrap();
        for row in &rows {
            agg.merge_tuple(row).unwrap();
        }
        let one = agg.results(AggregateMode::Partial).unwrap();
        (0..64).flat_map(|_| one.clone()).collect()
    };
    c.bench_function("aggregate_merge_partials", |b| {
        b.iter(|| {
            let mut agg = GroupedAggregator::new(spec, &schema()).unwrap();
            for row in &partials {
                agg.merge_partial(row).unwrap();
            }
            agg.results(AggregateMode::Complete).unwrap()
        })
    });
}

fn bench_nested_loop_join(c: &mut Criterion) {
    let left = make_rows(256);
    let right = make_rows(512);
    c.bench_function("join_nested_loop_eq", |b| {
        b.iter(|| {
            let mut join = ExecNode::join(
                ExecNode::values(schema(), left.clone()),
                ExecNode::values(schema(), right.clone()),
                JoinPredicate::new(0, CmpOp::Eq, 0),
            )
            .unwrap();
            join.collect_all().unwrap()
        })
    });
}

criterion_group!(operators, bench_grouped_aggregate, bench_nested_loop_join);
criterion_main!(operators);
