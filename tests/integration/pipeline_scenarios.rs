//! End-to-end plans over a small social graph.

use std::sync::Arc;

use serde_json::json;
use senda::graph::loader;
use senda::{
    GraphSchema, MemoryGraph, Params, Pipeline, Plan, ProcedureRegistry, ResultEntry, ResultSet,
};

/// ada(36) knows brin(41) and cleo(28); brin knows cleo.
fn social_graph() -> MemoryGraph {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let schema = GraphSchema::from_json(
        br#"{
            "vertices": [
                {"label": "person", "properties": [
                    {"name": "name", "kind": "string"},
                    {"name": "age", "kind": "int"}
                ]}
            ],
            "edges": [
                {"src": "person", "dst": "person", "label": "knows",
                 "payload": {"name": "since", "kind": "timestamp"}}
            ]
        }"#,
    )
    .unwrap();
    let mut graph = MemoryGraph::new(schema).unwrap();
    let vertices = "id,name,age\n1,ada,36\n2,brin,41\n3,cleo,28\n";
    loader::load_vertices(&mut graph, "person", vertices.as_bytes()).unwrap();
    let edges = "src,dst,since\n1,2,100\n1,3,200\n2,3,300\n";
    loader::load_edges(&mut graph, "person", "person", "knows", edges.as_bytes()).unwrap();
    graph
}

fn run(plan: serde_json::Value, graph: &MemoryGraph) -> ResultSet {
    run_with_params(plan, graph, &Params::default())
}

fn run_with_params(plan: serde_json::Value, graph: &MemoryGraph, params: &Params) -> ResultSet {
    let plan = Plan::from_value(plan).unwrap();
    let pipeline = Pipeline::build(&plan, graph, params).unwrap();
    pipeline.execute(graph, &ProcedureRegistry::new()).unwrap()
}

fn knows_triplet() -> serde_json::Value {
    json!({"src": "person", "dst": "person", "edge": "knows"})
}

fn vertex_id(entry: &ResultEntry) -> i64 {
    match entry {
        ResultEntry::Vertex { id, .. } => *id,
        other => panic!("expected a vertex, got {other:?}"),
    }
}

fn int(entry: &ResultEntry) -> i64 {
    match entry {
        ResultEntry::Int { value } => *value,
        other => panic!("expected an int, got {other:?}"),
    }
}

#[test]
fn neighbor_counts_group_by_destination() {
    let graph = social_graph();
    // Who is known, and by how many people?
    let results = run(
        json!([
            {"op": "scan", "labels": ["person"], "alias": 0},
            {"op": "edge_expand", "tag": 0, "alias": 1, "dir": "out", "expand": "vertex",
             "triplets": [knows_triplet()]},
            {"op": "group_by",
             "keys": [{"expr": {"kind": "var", "tag": 1}, "alias": 1}],
             "aggregates": [{"func": "count", "alias": 2}]},
            {"op": "sink", "tags": [1, 2]}
        ]),
        &graph,
    );
    let mut counts: Vec<(i64, i64)> = results
        .rows
        .iter()
        .map(|row| (vertex_id(&row.entries[0]), int(&row.entries[1])))
        .collect();
    counts.sort_unstable();
    assert_eq!(counts, vec![(2, 1), (3, 2)]);
}

#[test]
fn optional_expand_emits_one_row_per_input() {
    let graph = social_graph();
    let results = run(
        json!([
            {"op": "scan", "labels": ["person"], "alias": 0},
            {"op": "edge_expand", "tag": 0, "alias": 1, "dir": "out", "expand": "vertex",
             "is_optional": true,
             "triplets": [knows_triplet()],
             "predicate": {"kind": "binary", "op": "gt",
                 "left": {"kind": "property", "tag": 1, "name": "age"},
                 "right": {"kind": "const", "value": 100}}},
            {"op": "sink", "tags": [0, 1]}
        ]),
        &graph,
    );
    // Nobody is older than 100: every person keeps exactly one row, null
    // on the neighbor side.
    assert_eq!(results.len(), 3);
    for row in &results.rows {
        assert_eq!(row.entries[1], ResultEntry::Null);
    }

    // Without the predicate the cardinality still holds: ada knows two
    // people yet keeps a single row, cleo knows nobody and keeps hers.
    let results = run(
        json!([
            {"op": "scan", "labels": ["person"], "alias": 0},
            {"op": "edge_expand", "tag": 0, "alias": 1, "dir": "out", "expand": "vertex",
             "is_optional": true,
             "triplets": [knows_triplet()]},
            {"op": "sink", "tags": [0, 1]}
        ]),
        &graph,
    );
    assert_eq!(results.len(), 3);
    let sources: Vec<i64> = results.rows.iter().map(|r| vertex_id(&r.entries[0])).collect();
    assert_eq!(sources, vec![1, 2, 3]);
    let unmatched = results
        .rows
        .iter()
        .filter(|r| r.entries[1] == ResultEntry::Null)
        .count();
    assert_eq!(unmatched, 1); // cleo only
}

#[test]
fn filtered_expand_uses_payload_and_parameters() {
    let graph = social_graph();
    let mut params = Params::default();
    params.insert("min_since".to_string(), "150".to_string());
    let results = run_with_params(
        json!([
            {"op": "scan", "labels": ["person"], "alias": 0},
            {"op": "edge_expand", "tag": 0, "alias": 1, "dir": "out", "expand": "edge",
             "triplets": [knows_triplet()],
             "predicate": {"kind": "binary", "op": "ge",
                 "left": {"kind": "property", "tag": 1, "name": "since"},
                 "right": {"kind": "param", "name": "min_since", "as": "timestamp"}}},
            {"op": "get_v", "tag": 1, "alias": 2, "opt": "end"},
            {"op": "sink", "tags": [2]}
        ]),
        &graph,
        &params,
    );
    // since >= 150 keeps 1->3 and 2->3.
    let ids: Vec<i64> = results.rows.iter().map(|r| vertex_id(&r.entries[0])).collect();
    assert_eq!(ids, vec![3, 3]);
}

#[test]
fn path_expand_emits_each_hop_count_in_range() {
    let graph = social_graph();
    let results = run(
        json!([
            {"op": "scan", "labels": ["person"], "alias": 0,
             "index": {"original_ids": [1]}},
            {"op": "path_expand", "tag": 0, "alias": 1, "dir": "out",
             "triplets": [knows_triplet()],
             "hop_lower": 1, "hop_upper": 3, "result": "vertex"},
            {"op": "sink", "tags": [1]}
        ]),
        &graph,
    );
    // From ada: one hop reaches {brin, cleo}, two hops reach cleo again.
    let mut ids: Vec<i64> = results.rows.iter().map(|r| vertex_id(&r.entries[0])).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![2, 3, 3]);
}

#[test]
fn path_mode_materializes_every_step() {
    let graph = social_graph();
    let results = run(
        json!([
            {"op": "scan", "labels": ["person"], "alias": 0,
             "index": {"original_ids": [1]}},
            {"op": "path_expand", "tag": 0, "alias": 1, "dir": "out",
             "triplets": [knows_triplet()],
             "hop_lower": 2, "hop_upper": 3, "result": "path"},
            {"op": "sink", "tags": [1]}
        ]),
        &graph,
    );
    assert_eq!(results.len(), 1);
    match &results.rows[0].entries[0] {
        ResultEntry::Path { steps } => {
            let ids: Vec<i64> = steps.iter().map(vertex_id).collect();
            assert_eq!(ids, vec![1, 2, 3]);
        }
        other => panic!("expected a path, got {other:?}"),
    }
}

#[test]
fn order_by_window_and_limit_slice_rows() {
    let graph = social_graph();
    // Oldest first, keep the middle row.
    let results = run(
        json!([
            {"op": "scan", "labels": ["person"], "alias": 0},
            {"op": "order_by",
             "keys": [{"expr": {"kind": "property", "tag": 0, "name": "age"},
                       "order": "desc"}],
             "window": {"lower": 1, "upper": 2}},
            {"op": "sink", "tags": [0]}
        ]),
        &graph,
    );
    assert_eq!(results.len(), 1);
    assert_eq!(vertex_id(&results.rows[0].entries[0]), 1);

    // Same slice via a separate limit operator.
    let results = run(
        json!([
            {"op": "scan", "labels": ["person"], "alias": 0},
            {"op": "order_by",
             "keys": [{"expr": {"kind": "property", "tag": 0, "name": "age"},
                       "order": "desc"}]},
            {"op": "limit", "lower": 1, "upper": 2},
            {"op": "sink", "tags": [0]}
        ]),
        &graph,
    );
    assert_eq!(results.len(), 1);
    assert_eq!(vertex_id(&results.rows[0].entries[0]), 1);

    // A window past the end clamps instead of failing.
    let results = run(
        json!([
            {"op": "scan", "labels": ["person"], "alias": 0},
            {"op": "order_by",
             "keys": [{"expr": {"kind": "property", "tag": 0, "name": "age"}}]},
            {"op": "limit", "upper": 10},
            {"op": "sink", "tags": [0]}
        ]),
        &graph,
    );
    let ids: Vec<i64> = results.rows.iter().map(|r| vertex_id(&r.entries[0])).collect();
    assert_eq!(ids, vec![3, 1, 2]); // ascending age: cleo, ada, brin
}

#[test]
fn left_outer_join_keeps_unmatched_rows() {
    let graph = social_graph();
    // Left: everyone. Right: people who know someone born before them
    // (age > neighbor age), re-tagged at 2.
    let results = run(
        json!([
            {"op": "scan", "labels": ["person"], "alias": 0},
            {"op": "join", "kind": "left_outer",
             "left_keys": [{"kind": "var", "tag": 0}],
             "right_keys": [{"kind": "var", "tag": 2}],
             "left_plan": [],
             "right_plan": [
                 {"op": "edge_expand", "tag": 0, "alias": 1, "dir": "out", "expand": "vertex",
                  "triplets": [knows_triplet()]},
                 {"op": "select", "predicate": {"kind": "binary", "op": "lt",
                     "left": {"kind": "property", "tag": 0, "name": "age"},
                     "right": {"kind": "property", "tag": 1, "name": "age"}}},
                 {"op": "project", "exprs": [
                     {"expr": {"kind": "var", "tag": 0}, "alias": 2},
                     {"expr": {"kind": "var", "tag": 1}, "alias": 3}
                 ]}
             ]},
            {"op": "sink", "tags": [0, 3]}
        ]),
        &graph,
    );
    // Only ada (36) knows someone older (brin, 41); brin and cleo join null.
    assert_eq!(results.len(), 3);
    let matched: Vec<(i64, bool)> = results
        .rows
        .iter()
        .map(|row| {
            (
                vertex_id(&row.entries[0]),
                row.entries[1] != ResultEntry::Null,
            )
        })
        .collect();
    assert!(matched.contains(&(1, true)));
    assert!(matched.contains(&(2, false)));
    assert!(matched.contains(&(3, false)));
}

#[test]
fn union_concatenates_and_intersect_filters() {
    let graph = social_graph();
    let results = run(
        json!([
            {"op": "scan", "labels": ["person"], "alias": 0},
            {"op": "union", "sub_plans": [
                [{"op": "select", "predicate": {"kind": "binary", "op": "gt",
                    "left": {"kind": "property", "tag": 0, "name": "age"},
                    "right": {"kind": "const", "value": 40}}}],
                [{"op": "select", "predicate": {"kind": "binary", "op": "lt",
                    "left": {"kind": "property", "tag": 0, "name": "age"},
                    "right": {"kind": "const", "value": 30}}}]
            ]},
            {"op": "sink", "tags": [0]}
        ]),
        &graph,
    );
    let ids: Vec<i64> = results.rows.iter().map(|r| vertex_id(&r.entries[0])).collect();
    assert_eq!(ids, vec![2, 3]);

    // Intersection over the common-neighbor pattern: vertices reached from
    // both ada and brin.
    let results = run(
        json!([
            {"op": "scan", "labels": ["person"], "alias": 0,
             "index": {"original_ids": [1]}},
            {"op": "edge_expand", "tag": 0, "alias": 1, "dir": "out", "expand": "vertex",
             "triplets": [knows_triplet()]},
            {"op": "intersect", "key": 2, "sub_plans": [
                [{"op": "edge_expand", "tag": 0, "alias": 2, "dir": "out", "expand": "vertex",
                  "triplets": [knows_triplet()]}],
                [{"op": "edge_expand", "tag": 1, "alias": 2, "dir": "out", "expand": "vertex",
                  "triplets": [knows_triplet()]}]
            ]},
            {"op": "sink", "tags": [2]}
        ]),
        &graph,
    );
    // ada's neighbors {brin, cleo}; neighbors-of-neighbors {cleo}. Common: cleo.
    let ids: Vec<i64> = results.rows.iter().map(|r| vertex_id(&r.entries[0])).collect();
    assert_eq!(ids, vec![3]);
}

#[test]
fn dedup_and_aggregates_over_whole_input() {
    let graph = social_graph();
    let results = run(
        json!([
            {"op": "scan", "labels": ["person"], "alias": 0},
            {"op": "edge_expand", "tag": 0, "alias": 1, "dir": "out", "expand": "vertex",
             "triplets": [knows_triplet()]},
            {"op": "dedup", "keys": [{"kind": "var", "tag": 1}]},
            {"op": "group_by", "aggregates": [
                {"func": "count", "alias": 2},
                {"func": "min", "inputs": [{"kind": "property", "tag": 1, "name": "age"}],
                 "alias": 3},
                {"func": "avg", "inputs": [{"kind": "property", "tag": 1, "name": "age"}],
                 "alias": 4}
            ]},
            {"op": "sink", "tags": [2, 3, 4]}
        ]),
        &graph,
    );
    assert_eq!(results.len(), 1);
    let row = &results.rows[0];
    assert_eq!(int(&row.entries[0]), 2); // distinct known people: brin, cleo
    assert_eq!(int(&row.entries[1]), 28);
    assert_eq!(int(&row.entries[2]), 34); // (41 + 28) / 2, truncated
}

#[test]
fn registered_procedures_run_as_sources() {
    let graph = social_graph();
    let body = Plan::from_value(json!([
        {"op": "scan", "labels": ["person"], "alias": 0},
        {"op": "select", "predicate": {"kind": "binary", "op": "ge",
            "left": {"kind": "property", "tag": 0, "name": "age"},
            "right": {"kind": "const", "value": 36}}}
    ]))
    .unwrap();
    let registry = ProcedureRegistry::new();
    registry.register(
        "adults",
        Arc::new(Pipeline::build_procedure(&body, &graph, &Params::default()).unwrap()),
    );

    let plan = Plan::from_value(json!([
        {"op": "procedure_call", "name": "adults"},
        {"op": "sink", "tags": [0]}
    ]))
    .unwrap();
    let pipeline = Pipeline::build(&plan, &graph, &Params::default()).unwrap();
    let results = pipeline.execute(&graph, &registry).unwrap();
    let mut ids: Vec<i64> = results.rows.iter().map(|r| vertex_id(&r.entries[0])).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn empty_sink_tags_fall_back_to_visible_columns() {
    let graph = social_graph();
    let results = run(
        json!([
            {"op": "scan", "labels": ["person"], "alias": 0},
            {"op": "project", "exprs": [
                {"expr": {"kind": "property", "tag": 0, "name": "name"}, "alias": 1}
            ]},
            {"op": "sink"}
        ]),
        &graph,
    );
    assert_eq!(results.tags, vec![1]);
    assert_eq!(results.len(), 3);
    assert!(matches!(&results.rows[0].entries[0], ResultEntry::Str { .. }));
}
