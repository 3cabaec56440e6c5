#![forbid(unsafe_code)]

//! GetV: endpoint extraction from edge or path columns.

use crate::columns::{Column, PathNode, VertexColumnBuilder};
use crate::context::Context;
use crate::expr::Evaluator;
use crate::graph::ReadGraph;
use crate::ops::{ExecEnv, Operator};
use crate::plan::{GetVOpt, GetVParams, Params};
use crate::types::{Dir, LabelId, Result, SendaError, Tag, VertexId};
use crate::value::Value;

/// Extracts a vertex column from the edge, path, or vertex column at `tag`
/// and binds it at `alias`, optionally filtering by label set and predicate.
pub struct GetVOp {
    tag: Tag,
    alias: Tag,
    opt: GetVOpt,
    labels: Vec<LabelId>,
    predicate: Option<Evaluator>,
}

impl GetVOp {
    /// Resolves label names and compiles the predicate.
    pub fn build(params: &GetVParams, graph: &dyn ReadGraph, exec_params: &Params) -> Result<Self> {
        let schema = graph.schema();
        let labels = params
            .labels
            .iter()
            .map(|name| {
                schema
                    .vertex_label(name)
                    .ok_or_else(|| SendaError::bad_request(format!("unknown vertex label '{name}'")))
            })
            .collect::<Result<Vec<_>>>()?;
        let predicate = params
            .predicate
            .as_ref()
            .map(|expr| Evaluator::compile(expr, graph, exec_params))
            .transpose()?;
        Ok(Self {
            tag: params.tag,
            alias: params.alias,
            opt: params.opt,
            labels,
            predicate,
        })
    }

    /// Vertex the selector extracts from one non-null input row.
    fn extract(&self, column: &Column, row: usize) -> Result<Option<(LabelId, VertexId)>> {
        match (column, self.opt) {
            (Column::Edge(col), GetVOpt::Start) => Ok(col
                .get(row)
                .map(|elem| (elem.triplet.src_label, elem.src))),
            (Column::Edge(col), GetVOpt::End) => Ok(col
                .get(row)
                .map(|elem| (elem.triplet.dst_label, elem.dst))),
            (Column::Edge(col), GetVOpt::Other) => Ok(col.get(row).map(|elem| match elem.dir {
                Dir::In => (elem.triplet.src_label, elem.src),
                _ => (elem.triplet.dst_label, elem.dst),
            })),
            (Column::Edge(_), GetVOpt::Itself) => Err(SendaError::bad_request(
                "'itself' extraction expects a vertex column, not edges",
            )),
            (Column::Path(col), GetVOpt::Start) => Ok(col.node(row).map(|node| path_origin(node))),
            (Column::Path(col), _) => Ok(col.end(row)),
            (Column::Vertex(col), GetVOpt::Itself) => Ok(col.get(row)),
            (Column::Vertex(_), _) => Err(SendaError::bad_request(
                "endpoint extraction over a vertex column; use 'itself'",
            )),
            (Column::Value(_), _) => Err(SendaError::bad_request(
                "vertex extraction over a value column",
            )),
        }
    }
}

/// First step of a path backbone; paths always hold their origin step.
fn path_origin(node: &PathNode) -> (LabelId, VertexId) {
    node.materialize()[0]
}

impl Operator for GetVOp {
    fn name(&self) -> &'static str {
        "GetV"
    }

    fn execute(&self, mut ctx: Context, _env: &ExecEnv<'_>) -> Result<Context> {
        let input = ctx
            .column(self.tag)
            .cloned()
            .ok_or_else(|| {
                SendaError::bad_request(format!("extraction input tag {} is unbound", self.tag))
            })?;

        let mut offsets = Vec::with_capacity(ctx.row_num());
        let mut builder = VertexColumnBuilder::with_capacity(ctx.row_num());
        for row in 0..ctx.row_num() {
            let Some((label, vid)) = self.extract(&input, row)? else {
                continue;
            };
            if !self.labels.is_empty() && !self.labels.contains(&label) {
                continue;
            }
            if let Some(predicate) = &self.predicate {
                let candidate = Value::Vertex { label, vid };
                if !predicate
                    .eval_with_candidate(&ctx, row, (self.alias, &candidate))?
                    .as_predicate()?
                {
                    continue;
                }
            }
            builder.push(label, vid);
            offsets.push(row);
        }

        ctx.apply_shuffle(&offsets);
        ctx.set(self.alias, Column::Vertex(builder.finish()));
        ctx.push_visible(self.alias);
        Ok(ctx)
    }
}
