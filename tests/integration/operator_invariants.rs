//! Property-based checks of context and operator invariants.

use proptest::prelude::*;

use senda::columns::{Column, ValueColumnBuilder};
use senda::ops::{DedupOp, ExecEnv, Operator, OrderByOp, ProcedureRegistry, SelectOp};
use senda::{Context, GraphSchema, MemoryGraph, Params, Tag, Value};

fn empty_graph() -> MemoryGraph {
    MemoryGraph::new(
        GraphSchema::from_json(br#"{"vertices": [{"label": "n"}], "edges": []}"#).unwrap(),
    )
    .unwrap()
}

fn int_column(values: &[i64]) -> Column {
    let mut builder = ValueColumnBuilder::new();
    for v in values {
        builder.push(Value::Int(*v));
    }
    Column::Value(builder.finish())
}

fn int_context(values: &[i64]) -> Context {
    let mut ctx = Context::new();
    ctx.set(Tag(0), int_column(values));
    ctx.push_visible(Tag(0));
    ctx
}

fn ints_at(ctx: &Context, tag: u8) -> Vec<i64> {
    let column = ctx.column(Tag(tag)).unwrap();
    (0..ctx.row_num())
        .map(|row| match column.get(row) {
            Value::Int(v) => v,
            other => panic!("expected an int, got {other:?}"),
        })
        .collect()
}

fn dedup_op(graph: &MemoryGraph) -> DedupOp {
    DedupOp::build(
        &serde_json::from_value(serde_json::json!({"keys": [{"kind": "var", "tag": 0}]}))
            .unwrap(),
        graph,
        &Params::default(),
    )
    .unwrap()
}

proptest! {
    #[test]
    fn shuffle_is_index_preserving_copy(
        values in prop::collection::vec(-100i64..100, 1..50),
        raw_offsets in prop::collection::vec(0usize..1000, 0..80),
    ) {
        let column = int_column(&values);
        let offsets: Vec<usize> = raw_offsets
            .into_iter()
            .map(|o| o % values.len())
            .collect();
        let shuffled = column.shuffle(&offsets);
        prop_assert_eq!(shuffled.len(), offsets.len());
        for (row, offset) in offsets.iter().enumerate() {
            prop_assert_eq!(shuffled.get(row), Value::Int(values[*offset]));
        }
    }

    #[test]
    fn dedup_is_idempotent_and_order_preserving(
        values in prop::collection::vec(-5i64..5, 0..60),
    ) {
        let graph = empty_graph();
        let procedures = ProcedureRegistry::new();
        let env = ExecEnv { graph: &graph, procedures: &procedures };
        let op = dedup_op(&graph);

        let once = op.execute(int_context(&values), &env).unwrap();
        let deduped = ints_at(&once, 0);

        // First occurrence of each value, in input order.
        let mut expected = Vec::new();
        for v in &values {
            if !expected.contains(v) {
                expected.push(*v);
            }
        }
        prop_assert_eq!(&deduped, &expected);

        let twice = op.execute(once, &env).unwrap();
        prop_assert_eq!(ints_at(&twice, 0), expected);
    }

    #[test]
    fn order_by_sorts_and_keeps_row_alignment(
        values in prop::collection::vec(-100i64..100, 0..60),
    ) {
        let graph = empty_graph();
        let procedures = ProcedureRegistry::new();
        let env = ExecEnv { graph: &graph, procedures: &procedures };
        let op = OrderByOp::build(
            &serde_json::from_value(serde_json::json!({
                "keys": [{"expr": {"kind": "var", "tag": 0}}]
            }))
            .unwrap(),
            &graph,
            &Params::default(),
        )
        .unwrap();

        // A sibling column that mirrors tag 0 must stay row-aligned through
        // the sort.
        let mut ctx = int_context(&values);
        ctx.set(Tag(1), int_column(&values));

        let out = op.execute(ctx, &env).unwrap();
        let sorted = ints_at(&out, 0);
        let mut expected = values.clone();
        expected.sort_unstable();
        prop_assert_eq!(&sorted, &expected);
        prop_assert_eq!(ints_at(&out, 1), sorted);
    }

    #[test]
    fn select_partitions_rows(
        values in prop::collection::vec(-100i64..100, 0..60),
    ) {
        let graph = empty_graph();
        let procedures = ProcedureRegistry::new();
        let env = ExecEnv { graph: &graph, procedures: &procedures };
        let positive = SelectOp::build(
            &serde_json::from_value(serde_json::json!({
                "predicate": {"kind": "binary", "op": "ge",
                    "left": {"kind": "var", "tag": 0},
                    "right": {"kind": "const", "value": 0}}
            }))
            .unwrap(),
            &graph,
            &Params::default(),
        )
        .unwrap();
        let negative = SelectOp::build(
            &serde_json::from_value(serde_json::json!({
                "predicate": {"kind": "binary", "op": "lt",
                    "left": {"kind": "var", "tag": 0},
                    "right": {"kind": "const", "value": 0}}
            }))
            .unwrap(),
            &graph,
            &Params::default(),
        )
        .unwrap();

        let kept = positive.execute(int_context(&values), &env).unwrap();
        let dropped = negative.execute(int_context(&values), &env).unwrap();
        prop_assert_eq!(kept.row_num() + dropped.row_num(), values.len());
        for v in ints_at(&kept, 0) {
            prop_assert!(v >= 0);
        }
        for v in ints_at(&dropped, 0) {
            prop_assert!(v < 0);
        }
    }
}

proptest! {
    #[test]
    fn group_by_is_idempotent_over_its_own_output(
        values in prop::collection::vec(-5i64..5, 1..60),
    ) {
        let graph = empty_graph();
        let procedures = ProcedureRegistry::new();
        let env = ExecEnv { graph: &graph, procedures: &procedures };
        let op = senda::ops::GroupByOp::build(
            &serde_json::from_value(serde_json::json!({
                "keys": [{"expr": {"kind": "var", "tag": 0}, "alias": 0}],
                "aggregates": [{"func": "count", "alias": 1}]
            }))
            .unwrap(),
            &graph,
            &Params::default(),
        )
        .unwrap();

        let once = op.execute(int_context(&values), &env).unwrap();
        let keys_once = ints_at(&once, 0);

        // Every output key is already distinct, so regrouping by the same
        // key keeps every row; the count column regroups to all-ones.
        let again = op.execute(once.dup(), &env).unwrap();
        prop_assert_eq!(ints_at(&again, 0), keys_once);
        for count in ints_at(&again, 1) {
            prop_assert_eq!(count, 1);
        }
    }
}

#[test]
fn duplicated_contexts_do_not_alias_writes() {
    let mut ctx = int_context(&[1, 2, 3]);
    let copy = ctx.dup();
    ctx.apply_shuffle(&[2, 0]);
    assert_eq!(ctx.row_num(), 2);
    assert_eq!(copy.row_num(), 3);
    assert_eq!(ints_at(&copy, 0), vec![1, 2, 3]);
    assert_eq!(ints_at(&ctx, 0), vec![3, 1]);
}
