//! Schema parsing and CSV bulk loading through the file-path wrappers.

use std::io::Write;

use serde_json::json;
use senda::graph::loader;
use senda::{GraphSchema, MemoryGraph, Params, Pipeline, Plan, ProcedureRegistry, ResultEntry, SendaError};

fn write_temp(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn movie_schema() -> GraphSchema {
    GraphSchema::from_json(
        br#"{
            "vertices": [
                {"label": "person", "properties": [{"name": "name", "kind": "string"}]},
                {"label": "movie", "properties": [
                    {"name": "title", "kind": "string"},
                    {"name": "year", "kind": "int"}
                ]}
            ],
            "edges": [
                {"src": "person", "dst": "movie", "label": "acted_in",
                 "payload": {"name": "role", "kind": "string"}}
            ]
        }"#,
    )
    .unwrap()
}

#[test]
fn schema_rejects_undeclared_references() {
    // Edge relation naming an unknown vertex label.
    let err = GraphSchema::from_json(
        br#"{
            "vertices": [{"label": "person"}],
            "edges": [{"src": "person", "dst": "city", "label": "lives_in"}]
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, SendaError::BadRequest(_)));

    assert!(matches!(
        GraphSchema::from_json(b"{"),
        Err(SendaError::BadRequest(_))
    ));
}

#[test]
fn csv_files_load_and_query_end_to_end() {
    let mut graph = MemoryGraph::new(movie_schema()).unwrap();

    let people = write_temp("id,name\n1,uma\n2,vito\n");
    let movies = write_temp("id,title,year\n10,heat,1995\n11,ronin,1998\n");
    let roles = write_temp("src,dst,role\n1,10,lead\n2,10,support\n2,11,lead\n");

    assert_eq!(
        loader::load_vertex_file(&mut graph, "person", people.path()).unwrap(),
        2
    );
    assert_eq!(
        loader::load_vertex_file(&mut graph, "movie", movies.path()).unwrap(),
        2
    );
    assert_eq!(
        loader::load_edge_file(&mut graph, "person", "movie", "acted_in", roles.path()).unwrap(),
        3
    );

    // Lead roles only.
    let plan = Plan::from_value(json!([
        {"op": "scan", "labels": ["person"], "alias": 0},
        {"op": "edge_expand", "tag": 0, "alias": 1, "dir": "out", "expand": "edge",
         "triplets": [{"src": "person", "dst": "movie", "edge": "acted_in"}],
         "predicate": {"kind": "binary", "op": "eq",
             "left": {"kind": "property", "tag": 1, "name": "role"},
             "right": {"kind": "const", "value": "lead"}}},
        {"op": "get_v", "tag": 1, "alias": 2, "opt": "end"},
        {"op": "project", "exprs": [
            {"expr": {"kind": "property", "tag": 2, "name": "title"}, "alias": 3}
        ]},
        {"op": "sink", "tags": [3]}
    ]))
    .unwrap();
    let pipeline = Pipeline::build(&plan, &graph, &Params::default()).unwrap();
    let results = pipeline.execute(&graph, &ProcedureRegistry::new()).unwrap();
    let mut titles: Vec<String> = results
        .rows
        .iter()
        .map(|row| match &row.entries[0] {
            ResultEntry::Str { value } => value.clone(),
            other => panic!("expected a string, got {other:?}"),
        })
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["heat", "ronin"]);
}

#[test]
fn malformed_rows_name_their_line_and_column() {
    let mut graph = MemoryGraph::new(movie_schema()).unwrap();
    let movies = write_temp("id,title,year\n10,heat,1995\n11,ronin,nineteen98\n");
    let err = loader::load_vertex_file(&mut graph, "movie", movies.path()).unwrap_err();
    match err {
        SendaError::BadRequest(msg) => {
            assert!(msg.contains("line 3"), "{msg}");
            assert!(msg.contains("year"), "{msg}");
        }
        other => panic!("expected bad request, got {other}"),
    }
}

#[test]
fn duplicate_original_ids_are_rejected() {
    let mut graph = MemoryGraph::new(movie_schema()).unwrap();
    let err = loader::load_vertices(
        &mut graph,
        "person",
        "id,name\n1,uma\n1,vito\n".as_bytes(),
    )
    .unwrap_err();
    assert!(matches!(err, SendaError::BadRequest(_)));
}

#[test]
fn edges_into_missing_vertices_are_rejected() {
    let mut graph = MemoryGraph::new(movie_schema()).unwrap();
    loader::load_vertices(&mut graph, "person", "id,name\n1,uma\n".as_bytes()).unwrap();
    loader::load_vertices(&mut graph, "movie", "id,title,year\n10,heat,1995\n".as_bytes())
        .unwrap();
    let err = loader::load_edges(
        &mut graph,
        "person",
        "movie",
        "acted_in",
        "src,dst,role\n1,99,lead\n".as_bytes(),
    )
    .unwrap_err();
    match err {
        SendaError::BadRequest(msg) => assert!(msg.contains("99"), "{msg}"),
        other => panic!("expected bad request, got {other}"),
    }
}

#[test]
fn missing_file_is_a_bad_request() {
    let mut graph = MemoryGraph::new(movie_schema()).unwrap();
    let err = loader::load_vertex_file(
        &mut graph,
        "person",
        std::path::Path::new("/nonexistent/people.csv"),
    )
    .unwrap_err();
    assert!(matches!(err, SendaError::BadRequest(_)));
}
