#![forbid(unsafe_code)]

//! Sink: encoding a finished context into the wire result model.
//!
//! The sink is not an operator; a pipeline runs its chain and then hands
//! the final context here. Encoding resolves internal vertex ids back to
//! original ids and label ids back to names.

use crate::context::Context;
use crate::graph::ReadGraph;
use crate::result::{ResultEntry, ResultRow, ResultSet};
use crate::types::{LabelId, Result, SendaError, Tag, VertexId};
use crate::value::Value;

/// Encodes the requested tags of a context into a [`ResultSet`].
///
/// An empty tag list means "the context's visible tags". Requesting an
/// unbound tag is a plan error; a vertex the graph cannot resolve back to
/// an original id is an internal error, since every vertex in a column
/// came out of the same graph.
pub fn encode(ctx: &Context, tags: &[Tag], graph: &dyn ReadGraph) -> Result<ResultSet> {
    let tags: Vec<Tag> = if tags.is_empty() {
        ctx.visible().to_vec()
    } else {
        tags.to_vec()
    };

    let mut columns = Vec::with_capacity(tags.len());
    for tag in &tags {
        let column = ctx.column(*tag).ok_or_else(|| {
            SendaError::bad_request(format!("sink requested unbound tag {tag}"))
        })?;
        columns.push(column);
    }

    let mut rows = Vec::with_capacity(ctx.row_num());
    for row in 0..ctx.row_num() {
        let mut entries = Vec::with_capacity(columns.len());
        for column in &columns {
            entries.push(encode_value(&column.get(row), graph)?);
        }
        rows.push(ResultRow { entries });
    }
    Ok(ResultSet {
        tags: tags.iter().map(|t| t.0).collect(),
        rows,
    })
}

fn vertex_entry(label: LabelId, vid: VertexId, graph: &dyn ReadGraph) -> Result<ResultEntry> {
    Ok(ResultEntry::Vertex {
        label: label_name(label, graph)?,
        id: original(label, vid, graph)?,
    })
}

fn label_name(label: LabelId, graph: &dyn ReadGraph) -> Result<String> {
    graph
        .schema()
        .vertex_label_name(label)
        .map(str::to_owned)
        .ok_or_else(|| SendaError::internal(format!("vertex label {} has no name", label.0)))
}

fn original(label: LabelId, vid: VertexId, graph: &dyn ReadGraph) -> Result<i64> {
    graph.original_id(label, vid).ok_or_else(|| {
        SendaError::internal(format!(
            "vertex {}:{} has no original id",
            label.0, vid.0
        ))
    })
}

/// Encodes one runtime value.
pub fn encode_value(value: &Value, graph: &dyn ReadGraph) -> Result<ResultEntry> {
    Ok(match value {
        Value::Null => ResultEntry::Null,
        Value::Bool(v) => ResultEntry::Bool { value: *v },
        Value::Int(v) => ResultEntry::Int { value: *v },
        Value::Float(v) => ResultEntry::Float { value: *v },
        Value::Str(v) => ResultEntry::Str {
            value: v.to_string(),
        },
        Value::Timestamp(v) => ResultEntry::Timestamp { value: *v },
        Value::Vertex { label, vid } => vertex_entry(*label, *vid, graph)?,
        Value::Edge(edge) => {
            let edge_name = graph
                .schema()
                .edge_type_name(edge.triplet.edge_type)
                .map(str::to_owned)
                .ok_or_else(|| {
                    SendaError::internal(format!(
                        "edge type {} has no name",
                        edge.triplet.edge_type.0
                    ))
                })?;
            ResultEntry::Edge {
                label: edge_name,
                src_label: label_name(edge.triplet.src_label, graph)?,
                dst_label: label_name(edge.triplet.dst_label, graph)?,
                src: original(edge.triplet.src_label, edge.src, graph)?,
                dst: original(edge.triplet.dst_label, edge.dst, graph)?,
                data: Box::new(encode_value(&edge.data, graph)?),
            }
        }
        Value::Path(steps) => {
            let mut encoded = Vec::with_capacity(steps.len());
            for (label, vid) in steps.iter() {
                encoded.push(vertex_entry(*label, *vid, graph)?);
            }
            ResultEntry::Path { steps: encoded }
        }
        Value::List(items) => ResultEntry::List {
            items: encode_items(items, graph)?,
        },
        Value::Tuple(items) => ResultEntry::Tuple {
            items: encode_items(items, graph)?,
        },
    })
}

fn encode_items(items: &[Value], graph: &dyn ReadGraph) -> Result<Vec<ResultEntry>> {
    items.iter().map(|item| encode_value(item, graph)).collect()
}
