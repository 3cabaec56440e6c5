//! Plan rejection paths: parse-time and build-time.

use serde_json::json;
use senda::{GraphSchema, MemoryGraph, Params, Pipeline, Plan, SendaError};

fn graph() -> MemoryGraph {
    let schema = GraphSchema::from_json(
        br#"{
            "vertices": [{"label": "person"}],
            "edges": [{"src": "person", "dst": "person", "label": "knows"}]
        }"#,
    )
    .unwrap();
    MemoryGraph::new(schema).unwrap()
}

fn build(plan: serde_json::Value) -> Result<Pipeline, SendaError> {
    let graph = graph();
    let plan = Plan::from_value(plan)?;
    Pipeline::build(&plan, &graph, &Params::default())
}

fn expect_bad_request(plan: serde_json::Value, fragment: &str) {
    match build(plan) {
        Err(SendaError::BadRequest(msg)) => {
            assert!(msg.contains(fragment), "message '{msg}' lacks '{fragment}'")
        }
        Err(other) => panic!("expected bad request, got {other}"),
        Ok(_) => panic!("plan unexpectedly built"),
    }
}

#[test]
fn unknown_operator_is_named_in_the_error() {
    expect_bad_request(json!([{"op": "broadcast"}]), "unknown operator 'broadcast'");
}

#[test]
fn unknown_operator_in_nested_plans_is_caught_before_deserializing() {
    expect_bad_request(
        json!([
            {"op": "join", "kind": "inner",
             "left_keys": [{"kind": "var", "tag": 0}],
             "right_keys": [{"kind": "var", "tag": 0}],
             "left_plan": [{"op": "repartition"}],
             "right_plan": []}
        ]),
        "unknown operator 'repartition'",
    );
}

#[test]
fn non_array_and_non_object_shapes_are_rejected() {
    assert!(matches!(
        Plan::from_value(json!({"op": "scan"})),
        Err(SendaError::BadRequest(_))
    ));
    assert!(matches!(
        Plan::from_value(json!(["scan"])),
        Err(SendaError::BadRequest(_))
    ));
    assert!(matches!(
        Plan::from_slice(b"not json"),
        Err(SendaError::BadRequest(_))
    ));
}

#[test]
fn unknown_label_fails_at_build() {
    expect_bad_request(
        json!([{"op": "scan", "labels": ["robot"], "alias": 0}]),
        "robot",
    );
}

#[test]
fn bad_hop_range_fails_at_build() {
    expect_bad_request(
        json!([
            {"op": "scan", "labels": ["person"], "alias": 0},
            {"op": "path_expand", "tag": 0, "alias": 1, "dir": "out",
             "triplets": [{"src": "person", "dst": "person", "edge": "knows"}],
             "hop_lower": 3, "hop_upper": 2, "result": "vertex"}
        ]),
        "hop range",
    );
}

#[test]
fn aggregate_arity_is_checked_at_build() {
    // min needs exactly one input.
    expect_bad_request(
        json!([
            {"op": "scan", "labels": ["person"], "alias": 0},
            {"op": "group_by", "aggregates": [{"func": "min", "alias": 1}]}
        ]),
        "Min",
    );
    // count_distinct needs at least one.
    expect_bad_request(
        json!([
            {"op": "scan", "labels": ["person"], "alias": 0},
            {"op": "group_by", "aggregates": [{"func": "count_distinct", "alias": 1}]}
        ]),
        "CountDistinct",
    );
}

#[test]
fn sink_inside_a_sub_plan_is_rejected() {
    expect_bad_request(
        json!([
            {"op": "scan", "labels": ["person"], "alias": 0},
            {"op": "union", "sub_plans": [
                [{"op": "limit", "upper": 1}],
                [{"op": "sink"}]
            ]}
        ]),
        "sink",
    );
}

#[test]
fn empty_limit_window_is_rejected() {
    expect_bad_request(
        json!([
            {"op": "scan", "labels": ["person"], "alias": 0},
            {"op": "limit", "lower": 2, "upper": 2}
        ]),
        "row window",
    );
}

#[test]
fn index_lookup_requires_a_single_label() {
    let graph = GraphSchema::from_json(
        br#"{"vertices": [{"label": "a"}, {"label": "b"}], "edges": []}"#,
    )
    .unwrap();
    let graph = MemoryGraph::new(graph).unwrap();
    let plan = Plan::from_value(json!([
        {"op": "scan", "labels": ["a", "b"], "alias": 0,
         "index": {"original_ids": [1]}}
    ]))
    .unwrap();
    assert!(matches!(
        Pipeline::build(&plan, &graph, &Params::default()),
        Err(SendaError::BadRequest(_))
    ));
}

#[test]
fn asymmetric_both_direction_is_unsupported() {
    let schema = GraphSchema::from_json(
        br#"{
            "vertices": [{"label": "person"}, {"label": "post"}],
            "edges": [{"src": "person", "dst": "post", "label": "likes"}]
        }"#,
    )
    .unwrap();
    let graph = MemoryGraph::new(schema).unwrap();
    let plan = Plan::from_value(json!([
        {"op": "scan", "labels": ["person"], "alias": 0},
        {"op": "edge_expand", "tag": 0, "alias": 1, "dir": "both", "expand": "vertex",
         "triplets": [{"src": "person", "dst": "post", "edge": "likes"}]}
    ]))
    .unwrap();
    assert!(matches!(
        Pipeline::build(&plan, &graph, &Params::default()),
        Err(SendaError::Unsupported(_))
    ));
}
