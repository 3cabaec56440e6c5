#![forbid(unsafe_code)]

//! EdgeExpand: single-hop expansion along declared edge relations.

use smallvec::SmallVec;

use crate::columns::{Column, EdgeColumnBuilder, EdgeElem, VertexColumnBuilder};
use crate::context::Context;
use crate::expr::Evaluator;
use crate::graph::ReadGraph;
use crate::ops::{ExecEnv, Operator};
use crate::plan::{EdgeExpandParams, ExpandKind, Params};
use crate::types::{Dir, LabelId, LabelTriplet, Result, SendaError, Tag, VertexId};
use crate::value::Value;

/// Follows edges from the vertex column at `tag` and binds either the
/// neighbor vertices or the traversed edges at `alias`.
///
/// Non-optional expansion emits one row per matching edge (zero-match input
/// rows disappear); optional expansion emits exactly one row per input row no
/// matter how many edges match, binding the first admitted edge or a null
/// marker, so downstream joins see a stable cardinality.
pub struct EdgeExpandOp {
    tag: Tag,
    alias: Tag,
    dir: Dir,
    triplets: Vec<LabelTriplet>,
    expand: ExpandKind,
    is_optional: bool,
    predicate: Option<Evaluator>,
}

impl EdgeExpandOp {
    /// Resolves the relation names and compiles the candidate predicate.
    pub fn build(
        params: &EdgeExpandParams,
        graph: &dyn ReadGraph,
        exec_params: &Params,
    ) -> Result<Self> {
        if params.triplets.is_empty() {
            return Err(SendaError::bad_request(
                "edge expansion requires at least one relation",
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
                        "both-direction expansion over an asymmetric relation",
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
            expand: params.expand,
            is_optional: params.is_optional,
            predicate,
        })
    }

    /// One candidate edge reached from an input row; returns true when it
    /// survives the predicate.
    fn admit(&self, ctx: &Context, row: usize, elem: &EdgeElem) -> Result<bool> {
        let Some(predicate) = &self.predicate else {
            return Ok(true);
        };
        let candidate = match self.expand {
            ExpandKind::Vertex => {
                let (label, vid) = neighbor(elem);
                Value::Vertex { label, vid }
            }
            ExpandKind::Edge => elem.clone().into_value(),
        };
        predicate
            .eval_with_candidate(ctx, row, (self.alias, &candidate))?
            .as_predicate()
    }

    /// First edge out of `vid` surviving the predicate, scanning the pruned
    /// relations in declaration order. Drives the optional path.
    fn first_admitted(
        &self,
        ctx: &Context,
        row: usize,
        label: LabelId,
        vid: VertexId,
        pruned: &[LabelTriplet],
        env: &ExecEnv<'_>,
    ) -> Result<Option<EdgeElem>> {
        for triplet in pruned {
            if matches!(self.dir, Dir::Out | Dir::Both) && triplet.src_label == label {
                for edge in env.graph.out_edges(*triplet, vid) {
                    let elem = EdgeElem {
                        triplet: *triplet,
                        src: edge.src,
                        dst: edge.dst,
                        dir: Dir::Out,
                        data: edge.data,
                    };
                    if self.admit(ctx, row, &elem)? {
                        return Ok(Some(elem));
                    }
                }
            }
            if matches!(self.dir, Dir::In | Dir::Both) && triplet.dst_label == label {
                for edge in env.graph.in_edges(*triplet, vid) {
                    let elem = EdgeElem {
                        triplet: *triplet,
                        src: edge.src,
                        dst: edge.dst,
                        dir: Dir::In,
                        data: edge.data,
                    };
                    if self.admit(ctx, row, &elem)? {
                        return Ok(Some(elem));
                    }
                }
            }
        }
        Ok(None)
    }
}

/// Label and id of the endpoint opposite the traversal origin.
fn neighbor(elem: &EdgeElem) -> (LabelId, VertexId) {
    match elem.dir {
        Dir::In => (elem.triplet.src_label, elem.src),
        _ => (elem.triplet.dst_label, elem.dst),
    }
}

enum ExpandOutput {
    Vertex(VertexColumnBuilder),
    Edge(EdgeColumnBuilder),
}

impl ExpandOutput {
    fn push(&mut self, elem: EdgeElem) {
        match self {
            ExpandOutput::Vertex(builder) => {
                let (label, vid) = neighbor(&elem);
                builder.push(label, vid);
            }
            ExpandOutput::Edge(builder) => builder.push(elem),
        }
    }

    fn push_null(&mut self) {
        match self {
            ExpandOutput::Vertex(builder) => builder.push_null(),
            ExpandOutput::Edge(builder) => builder.push_null(),
        }
    }

    fn finish(self) -> Column {
        match self {
            ExpandOutput::Vertex(builder) => Column::Vertex(builder.finish()),
            ExpandOutput::Edge(builder) => Column::Edge(builder.finish()),
        }
    }
}

impl Operator for EdgeExpandOp {
    fn name(&self) -> &'static str {
        "EdgeExpand"
    }

    fn execute(&self, mut ctx: Context, env: &ExecEnv<'_>) -> Result<Context> {
        let input = match ctx.column(self.tag) {
            Some(Column::Vertex(col)) => col.clone(),
            Some(other) => {
                return Err(SendaError::bad_request(format!(
                    "expansion input tag {} holds a {} column, not vertices",
                    self.tag,
                    other.kind()
                )))
            }
            None => {
                return Err(SendaError::bad_request(format!(
                    "expansion input tag {} is unbound",
                    self.tag
                )))
            }
        };

        // Relations that cannot start from any label present in the input
        // are pruned before the row loop.
        let present = input.labels();
        let pruned: SmallVec<[LabelTriplet; 4]> = self
            .triplets
            .iter()
            .copied()
            .filter(|triplet| match self.dir {
                Dir::Out => present.contains(&triplet.src_label),
                Dir::In => present.contains(&triplet.dst_label),
                Dir::Both => {
                    present.contains(&triplet.src_label) || present.contains(&triplet.dst_label)
                }
            })
            .collect();

        let mut offsets: Vec<usize> = Vec::with_capacity(ctx.row_num());
        let mut output = match self.expand {
            ExpandKind::Vertex => ExpandOutput::Vertex(VertexColumnBuilder::new()),
            ExpandKind::Edge => ExpandOutput::Edge(EdgeColumnBuilder::new()),
        };

        if self.is_optional {
            // One output row per input row, no matter how many edges match.
            for row in 0..ctx.row_num() {
                let elem = match input.get(row) {
                    Some((label, vid)) => {
                        self.first_admitted(&ctx, row, label, vid, &pruned, env)?
                    }
                    None => None,
                };
                match elem {
                    Some(elem) => output.push(elem),
                    None => output.push_null(),
                }
                offsets.push(row);
            }
        } else {
            for row in 0..ctx.row_num() {
                if let Some((label, vid)) = input.get(row) {
                    for triplet in &pruned {
                        if matches!(self.dir, Dir::Out | Dir::Both) && triplet.src_label == label
                        {
                            for edge in env.graph.out_edges(*triplet, vid) {
                                let elem = EdgeElem {
                                    triplet: *triplet,
                                    src: edge.src,
                                    dst: edge.dst,
                                    dir: Dir::Out,
                                    data: edge.data,
                                };
                                if self.admit(&ctx, row, &elem)? {
                                    output.push(elem);
                                    offsets.push(row);
                                }
                            }
                        }
                        if matches!(self.dir, Dir::In | Dir::Both) && triplet.dst_label == label {
                            for edge in env.graph.in_edges(*triplet, vid) {
                                let elem = EdgeElem {
                                    triplet: *triplet,
                                    src: edge.src,
                                    dst: edge.dst,
                                    dir: Dir::In,
                                    data: edge.data,
                                };
                                if self.admit(&ctx, row, &elem)? {
                                    output.push(elem);
                                    offsets.push(row);
                                }
                            }
                        }
                    }
                }
            }
        }

        ctx.apply_shuffle(&offsets);
        ctx.set(self.alias, output.finish());
        ctx.push_visible(self.alias);
        Ok(ctx)
    }
}
