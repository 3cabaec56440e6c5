#![forbid(unsafe_code)]

//! PathExpand: bounded-length repeated expansion over a shared backbone.

use std::sync::Arc;

use crate::columns::{Column, PathColumnBuilder, PathNode, VertexColumnBuilder};
use crate::context::Context;
use crate::expr::Evaluator;
use crate::graph::ReadGraph;
use crate::ops::{ExecEnv, Operator};
use crate::plan::{Params, PathExpandParams, PathResult};
use crate::types::{Dir, LabelId, LabelTriplet, Result, SendaError, Tag, VertexId};
use crate::value::Value;

/// Expands the vertex column at `tag` through `hop_lower..hop_upper` hops
/// (lower inclusive, upper exclusive) and binds either the terminal vertex
/// or the full path object at `alias`.
///
/// Expansion is breadth-first, one level per hop; every partial path extends
/// an immutable shared backbone, so sibling paths share their prefix.
pub struct PathExpandOp {
    tag: Tag,
    alias: Tag,
    dir: Dir,
    triplets: Vec<LabelTriplet>,
    hop_lower: usize,
    hop_upper: usize,
    result: PathResult,
    exclude_visited: bool,
    predicate: Option<Evaluator>,
}

impl PathExpandOp {
    /// Validates the hop range, resolves relations, compiles the predicate.
    pub fn build(
        params: &PathExpandParams,
        graph: &dyn ReadGraph,
        exec_params: &Params,
    ) -> Result<Self> {
        if params.hop_upper == 0 || params.hop_upper <= params.hop_lower {
            return Err(SendaError::bad_request(format!(
                "disallowed hop range [{}, {})",
                params.hop_lower, params.hop_upper
            )));
        }
        if params.triplets.is_empty() {
            return Err(SendaError::bad_request(
                "path expansion requires at least one relation",
            ));
        }
        let schema = graph.schema();
        let triplets = params
            .triplets
            .iter()
            .map(|t| schema.resolve_triplet(&t.src, &t.dst, &t.edge))
            .collect::<Result<Vec<_>>>()?;
        if params.dir == Dir::Both {
            for triplet in &triplets {
                if !triplet.is_symmetric() {
                    return Err(SendaError::unsupported(
                        "both-direction path expansion over an asymmetric relation",
                    ));
                }
            }
        }
        let predicate = params
            .predicate
            .as_ref()
            .map(|expr| Evaluator::compile(expr, graph, exec_params))
            .transpose()?;
        Ok(Self {
            tag: params.tag,
            alias: params.alias,
            dir: params.dir,
            triplets,
            hop_lower: params.hop_lower,
            hop_upper: params.hop_upper,
            result: params.result,
            exclude_visited: params.exclude_visited,
            predicate,
        })
    }

    /// Expands one frontier entry a single hop, pushing the survivors.
    fn step(
        &self,
        ctx: &Context,
        env: &ExecEnv<'_>,
        origin: usize,
        node: &Arc<PathNode>,
        next: &mut Vec<(usize, Arc<PathNode>)>,
    ) -> Result<()> {
        let (label, vid) = node.last();
        let mut admit = |origin: usize,
                         node: &Arc<PathNode>,
                         label: LabelId,
                         vid: VertexId|
         -> Result<()> {
            if self.exclude_visited && node.contains(label, vid) {
                return Ok(());
            }
            if let Some(predicate) = &self.predicate {
                let candidate = Value::Vertex { label, vid };
                if !predicate
                    .eval_with_candidate(ctx, origin, (self.alias, &candidate))?
                    .as_predicate()?
                {
                    return Ok(());
                }
            }
            next.push((origin, node.extend(label, vid)));
            Ok(())
        };
        for triplet in &self.triplets {
            if matches!(self.dir, Dir::Out | Dir::Both) && triplet.src_label == label {
                for edge in env.graph.out_edges(*triplet, vid) {
                    admit(origin, node, triplet.dst_label, edge.dst)?;
                }
            }
            if matches!(self.dir, Dir::In | Dir::Both) && triplet.dst_label == label {
                for edge in env.graph.in_edges(*triplet, vid) {
                    admit(origin, node, triplet.src_label, edge.src)?;
                }
            }
        }
        Ok(())
    }
}

enum PathOutput {
    Vertex(VertexColumnBuilder),
    Path(PathColumnBuilder),
}

impl PathOutput {
    fn push(&mut self, node: &Arc<PathNode>) {
        match self {
            PathOutput::Vertex(builder) => {
                let (label, vid) = node.last();
                builder.push(label, vid);
            }
            PathOutput::Path(builder) => builder.push(Arc::clone(node)),
        }
    }

    fn finish(self) -> Column {
        match self {
            PathOutput::Vertex(builder) => Column::Vertex(builder.finish()),
            PathOutput::Path(builder) => Column::Path(builder.finish()),
        }
    }
}

impl Operator for PathExpandOp {
    fn name(&self) -> &'static str {
        "PathExpand"
    }

    fn execute(&self, mut ctx: Context, env: &ExecEnv<'_>) -> Result<Context> {
        let input = match ctx.column(self.tag) {
            Some(Column::Vertex(col)) => col.clone(),
            Some(other) => {
                return Err(SendaError::bad_request(format!(
                    "path expansion input tag {} holds a {} column, not vertices",
                    self.tag,
                    other.kind()
                )))
            }
            None => {
                return Err(SendaError::bad_request(format!(
                    "path expansion input tag {} is unbound",
                    self.tag
                )))
            }
        };

        // Hop 0 frontier: one root backbone per non-null input row.
        let mut frontier: Vec<(usize, Arc<PathNode>)> = Vec::with_capacity(input.len());
        input.foreach(|row, label, vid| frontier.push((row, PathNode::root(label, vid))));

        let mut offsets = Vec::new();
        let mut output = match self.result {
            PathResult::Vertex => PathOutput::Vertex(VertexColumnBuilder::new()),
            PathResult::Path => PathOutput::Path(PathColumnBuilder::new()),
        };

        let mut hop = 0usize;
        loop {
            if hop >= self.hop_lower {
                for (origin, node) in &frontier {
                    output.push(node);
                    offsets.push(*origin);
                }
            }
            hop += 1;
            if hop >= self.hop_upper || frontier.is_empty() {
                break;
            }
            let mut next = Vec::new();
            for (origin, node) in &frontier {
                self.step(&ctx, env, *origin, node, &mut next)?;
            }
            frontier = next;
        }
        tracing::trace!(rows = offsets.len(), hops = hop, "path_expand.emit");

        ctx.apply_shuffle(&offsets);
        ctx.set(self.alias, output.finish());
        ctx.push_visible(self.alias);
        Ok(ctx)
    }
}
