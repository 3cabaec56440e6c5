#![forbid(unsafe_code)]

//! Scan: the stock source operator, emitting one vertex column.

use crate::columns::{Column, SegmentedVertexColumn, VertexColumn, VertexColumnBuilder};
use crate::context::Context;
use crate::expr::Evaluator;
use crate::graph::ReadGraph;
use crate::ops::{ExecEnv, Operator};
use crate::plan::{IndexLookup, Params, ScanParams};
use crate::types::{LabelId, Result, SendaError, Tag, VertexId};
use crate::value::Value;

/// Emits all (or index-selected) vertices of a label set that satisfy the
/// residual predicate, as a fresh vertex column at the alias tag.
pub struct ScanOp {
    labels: Vec<LabelId>,
    alias: Tag,
    predicate: Option<Evaluator>,
    index: Option<IndexLookup>,
}

impl ScanOp {
    /// Resolves label names and compiles the predicate.
    pub fn build(params: &ScanParams, graph: &dyn ReadGraph, exec_params: &Params) -> Result<Self> {
        if params.labels.is_empty() {
            return Err(SendaError::bad_request("scan requires at least one label"));
        }
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
        if params.index.is_some() && labels.len() != 1 {
            return Err(SendaError::bad_request(
                "index lookup requires a single scanned label",
            ));
        }
        let predicate = params
            .predicate
            .as_ref()
            .map(|expr| Evaluator::compile(expr, graph, exec_params))
            .transpose()?;
        Ok(Self {
            labels,
            alias: params.alias,
            predicate,
            index: params.index.clone(),
        })
    }

    /// Internal ids the scan visits for one label, index-pruned when an
    /// index lookup is present.
    fn candidates(&self, label: LabelId, graph: &dyn ReadGraph) -> Vec<VertexId> {
        let count = graph.vertex_count(label);
        match &self.index {
            Some(IndexLookup::OriginalIds(originals)) => originals
                .iter()
                .filter_map(|original| graph.resolve_original(label, *original))
                .collect(),
            Some(IndexLookup::InternalIds(ids)) => ids
                .iter()
                .copied()
                .filter(|id| (*id as usize) < count)
                .map(VertexId)
                .collect(),
            None => (0..count as u64).map(VertexId).collect(),
        }
    }

    fn keep(&self, ctx: &Context, label: LabelId, vid: VertexId) -> Result<bool> {
        match &self.predicate {
            Some(predicate) => {
                let candidate = Value::Vertex { label, vid };
                predicate
                    .eval_with_candidate(ctx, 0, (self.alias, &candidate))?
                    .as_predicate()
            }
            None => Ok(true),
        }
    }
}

impl Operator for ScanOp {
    fn name(&self) -> &'static str {
        "Scan"
    }

    fn execute(&self, mut ctx: Context, env: &ExecEnv<'_>) -> Result<Context> {
        if ctx.is_populated() {
            return Err(SendaError::bad_request(
                "scan is a source operator and cannot run over a populated context",
            ));
        }
        let column = if self.labels.len() == 1 {
            let label = self.labels[0];
            let mut builder = VertexColumnBuilder::new();
            for vid in self.candidates(label, env.graph) {
                if self.keep(&ctx, label, vid)? {
                    builder.push(label, vid);
                }
            }
            builder.finish()
        } else {
            let mut segments = Vec::with_capacity(self.labels.len());
            for &label in &self.labels {
                let mut run = Vec::new();
                for vid in self.candidates(label, env.graph) {
                    if self.keep(&ctx, label, vid)? {
                        run.push(vid);
                    }
                }
                segments.push((label, run));
            }
            VertexColumn::from_segments(SegmentedVertexColumn::new(segments))
        };
        tracing::trace!(rows = column.len(), "scan.emit");
        ctx.set(self.alias, Column::Vertex(column));
        ctx.push_visible(self.alias);
        Ok(ctx)
    }
}
