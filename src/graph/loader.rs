#![forbid(unsafe_code)]

//! CSV bulk loader for the reference in-memory store.
//!
//! Vertex files carry an `id` column plus one column per declared property;
//! edge files carry `src`/`dst` original-id columns plus the relation's
//! payload column when it declares one. Malformed rows are rejected as bad
//! requests naming the offending line.

use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use tracing::debug;

use crate::graph::MutGraph;
use crate::types::{Result, SendaError};
use crate::value::Value;

const ID_COLUMN: &str = "id";
const SRC_COLUMN: &str = "src";
const DST_COLUMN: &str = "dst";

fn column_position(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| SendaError::bad_request(format!("csv header is missing column '{name}'")))
}

fn field<'r>(record: &'r csv::StringRecord, pos: usize, line: u64) -> Result<&'r str> {
    record
        .get(pos)
        .ok_or_else(|| SendaError::bad_request(format!("line {line}: row is too short")))
}

fn parse_id(raw: &str, line: u64) -> Result<i64> {
    raw.parse::<i64>()
        .map_err(|_| SendaError::bad_request(format!("line {line}: '{raw}' is not a vertex id")))
}

/// Loads vertices of one label from CSV, returning how many were inserted.
pub fn load_vertices<R: Read>(graph: &mut dyn MutGraph, label: &str, reader: R) -> Result<usize> {
    let label_id = graph
        .schema()
        .vertex_label(label)
        .ok_or_else(|| SendaError::bad_request(format!("unknown vertex label '{label}'")))?;
    let properties: Vec<_> = graph.schema().vertex_properties(label_id).to_vec();

    let mut csv = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = csv
        .headers()
        .map_err(|err| SendaError::bad_request(format!("unreadable csv header: {err}")))?
        .clone();
    let id_pos = column_position(&headers, ID_COLUMN)?;
    let prop_pos = properties
        .iter()
        .map(|def| column_position(&headers, &def.name))
        .collect::<Result<Vec<_>>>()?;

    let mut inserted = 0usize;
    for (row, record) in csv.records().enumerate() {
        let line = row as u64 + 2; // header occupies line 1
        let record = record
            .map_err(|err| SendaError::bad_request(format!("line {line}: unreadable row: {err}")))?;
        let original = parse_id(field(&record, id_pos, line)?, line)?;
        let mut values = Vec::with_capacity(properties.len());
        for (def, pos) in properties.iter().zip(&prop_pos) {
            let raw = field(&record, *pos, line)?;
            let value = def.kind.parse(raw).map_err(|err| err.annotate(&format!(
                "line {line}, column '{}'",
                def.name
            )))?;
            values.push(value);
        }
        graph
            .insert_vertex(label_id, original, values)
            .map_err(|err| err.annotate(&format!("line {line}")))?;
        inserted += 1;
    }
    debug!(label, rows = inserted, "loader.vertices");
    Ok(inserted)
}

/// Loads edges of one declared relation from CSV, returning how many were
/// inserted. Endpoints are referenced by original id.
pub fn load_edges<R: Read>(
    graph: &mut dyn MutGraph,
    src: &str,
    dst: &str,
    edge: &str,
    reader: R,
) -> Result<usize> {
    let triplet = graph.schema().resolve_triplet(src, dst, edge)?;
    let payload = graph.schema().triplet_payload(triplet).cloned();

    let mut csv = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = csv
        .headers()
        .map_err(|err| SendaError::bad_request(format!("unreadable csv header: {err}")))?
        .clone();
    let src_pos = column_position(&headers, SRC_COLUMN)?;
    let dst_pos = column_position(&headers, DST_COLUMN)?;
    let payload_pos = payload
        .as_ref()
        .map(|def| column_position(&headers, &def.name))
        .transpose()?;

    let mut inserted = 0usize;
    for (row, record) in csv.records().enumerate() {
        let line = row as u64 + 2;
        let record = record
            .map_err(|err| SendaError::bad_request(format!("line {line}: unreadable row: {err}")))?;
        let src_original = parse_id(field(&record, src_pos, line)?, line)?;
        let dst_original = parse_id(field(&record, dst_pos, line)?, line)?;
        let src_vid = graph
            .resolve_original(triplet.src_label, src_original)
            .ok_or_else(|| {
                SendaError::bad_request(format!(
                    "line {line}: unknown source vertex {src_original}"
                ))
            })?;
        let dst_vid = graph
            .resolve_original(triplet.dst_label, dst_original)
            .ok_or_else(|| {
                SendaError::bad_request(format!(
                    "line {line}: unknown destination vertex {dst_original}"
                ))
            })?;
        let data = match (&payload, payload_pos) {
            (Some(def), Some(pos)) => {
                let raw = field(&record, pos, line)?;
                def.kind.parse(raw).map_err(|err| err.annotate(&format!(
                    "line {line}, column '{}'",
                    def.name
                )))?
            }
            _ => Value::Null,
        };
        graph
            .insert_edge(triplet, src_vid, dst_vid, data)
            .map_err(|err| err.annotate(&format!("line {line}")))?;
        inserted += 1;
    }
    debug!(src, dst, edge, rows = inserted, "loader.edges");
    Ok(inserted)
}

/// File-path convenience wrapper around [`load_vertices`].
pub fn load_vertex_file(graph: &mut dyn MutGraph, label: &str, path: &Path) -> Result<usize> {
    let file = std::fs::File::open(path).map_err(|err| {
        SendaError::bad_request(format!("cannot open {}: {err}", path.display()))
    })?;
    load_vertices(graph, label, file)
}

/// File-path convenience wrapper around [`load_edges`].
pub fn load_edge_file(
    graph: &mut dyn MutGraph,
    src: &str,
    dst: &str,
    edge: &str,
    path: &Path,
) -> Result<usize> {
    let file = std::fs::File::open(path).map_err(|err| {
        SendaError::bad_request(format!("cannot open {}: {err}", path.display()))
    })?;
    load_edges(graph, src, dst, edge, file)
}
