//! A frozen graph snapshot serves many reader threads at once.

use std::sync::Arc;
use std::thread;

use serde_json::json;
use senda::graph::loader;
use senda::{GraphSchema, MemoryGraph, Params, Pipeline, Plan, ProcedureRegistry, ResultSet};

fn ring_graph(n: i64) -> MemoryGraph {
    let schema = GraphSchema::from_json(
        br#"{
            "vertices": [{"label": "node", "properties": [{"name": "weight", "kind": "int"}]}],
            "edges": [{"src": "node", "dst": "node", "label": "next"}]
        }"#,
    )
    .unwrap();
    let mut graph = MemoryGraph::new(schema).unwrap();
    let mut vertices = String::from("id,weight\n");
    let mut edges = String::from("src,dst\n");
    for i in 0..n {
        vertices.push_str(&format!("{i},{}\n", i * 10));
        edges.push_str(&format!("{i},{}\n", (i + 1) % n));
    }
    loader::load_vertices(&mut graph, "node", vertices.as_bytes()).unwrap();
    loader::load_edges(&mut graph, "node", "node", "next", edges.as_bytes()).unwrap();
    graph
}

fn two_hop_plan() -> Plan {
    Plan::from_value(json!([
        {"op": "scan", "labels": ["node"], "alias": 0},
        {"op": "path_expand", "tag": 0, "alias": 1, "dir": "out",
         "triplets": [{"src": "node", "dst": "node", "edge": "next"}],
         "hop_lower": 2, "hop_upper": 3, "result": "vertex"},
        {"op": "group_by", "aggregates": [
            {"func": "sum", "inputs": [{"kind": "property", "tag": 1, "name": "weight"}],
             "alias": 2}
        ]},
        {"op": "sink", "tags": [2]}
    ]))
    .unwrap()
}

#[test]
fn parallel_executions_agree_with_the_serial_result() {
    let graph = Arc::new(ring_graph(64));
    let plan = two_hop_plan();
    let pipeline =
        Arc::new(Pipeline::build(&plan, graph.as_ref(), &Params::default()).unwrap());

    let expected: ResultSet = pipeline
        .execute(graph.as_ref(), &ProcedureRegistry::new())
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let graph = Arc::clone(&graph);
        let pipeline = Arc::clone(&pipeline);
        handles.push(thread::spawn(move || {
            let registry = ProcedureRegistry::new();
            pipeline.execute(graph.as_ref(), &registry).unwrap()
        }));
    }
    for handle in handles {
        let results = handle.join().unwrap();
        assert_eq!(results, expected);
    }
}

#[test]
fn threads_can_build_their_own_pipelines() {
    let graph = Arc::new(ring_graph(16));
    let mut handles = Vec::new();
    for lower in 1..5usize {
        let graph = Arc::clone(&graph);
        handles.push(thread::spawn(move || {
            let plan = Plan::from_value(json!([
                {"op": "scan", "labels": ["node"], "alias": 0},
                {"op": "path_expand", "tag": 0, "alias": 1, "dir": "out",
                 "triplets": [{"src": "node", "dst": "node", "edge": "next"}],
                 "hop_lower": lower, "hop_upper": lower + 1, "result": "vertex"},
                {"op": "sink", "tags": [1]}
            ]))
            .unwrap();
            let pipeline = Pipeline::build(&plan, graph.as_ref(), &Params::default()).unwrap();
            pipeline
                .execute(graph.as_ref(), &ProcedureRegistry::new())
                .unwrap()
                .len()
        }));
    }
    for handle in handles {
        // A ring has exactly one k-hop successor per node.
        assert_eq!(handle.join().unwrap(), 16);
    }
}
