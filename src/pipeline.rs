#![forbid(unsafe_code)]

//! Pipeline: plan validation, operator building, and end-to-end execution.
//!
//! A pipeline is built once from a parsed [`Plan`] against one graph and one
//! parameter binding, and can then be executed any number of times. Building
//! resolves every name, compiles every expression, and recursively builds
//! nested sub-plans; execution is a straight left-to-right fold of the
//! operator chain over a fresh context, finished by sink encoding.

use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::columns::ColumnKind;
use crate::context::Context;
use crate::expr::{Evaluator, Expr};
use crate::graph::ReadGraph;
use crate::ops::{
    sink, ChainProcedure, DedupOp, EdgeExpandOp, ExecEnv, GetVOp, GroupByOp, IntersectOp, JoinOp,
    LimitOp, OpChain, Operator, OrderByOp, PathExpandOp, ProcedureCallOp, ProcedureRegistry,
    ProjectOp, ScanOp, SelectOp, UnionOp,
};
use crate::plan::{ExpandKind, Params, PathResult, Plan, PlanOp};
use crate::profile::PipelineProfile;
use crate::result::ResultSet;
use crate::types::{Result, SendaError, Tag};

/// Execution knobs applied per pipeline.
#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineOptions {
    /// Fails the run when any intermediate context exceeds this many rows.
    pub max_rows: Option<usize>,
    /// Emits a debug trace event per executed operator.
    pub trace_ops: bool,
}

/// A built, executable plan.
pub struct Pipeline {
    chain: OpChain,
    sink_tags: Option<Vec<Tag>>,
    options: PipelineOptions,
}

impl Pipeline {
    /// Builds a pipeline with default options.
    pub fn build(plan: &Plan, graph: &dyn ReadGraph, params: &Params) -> Result<Pipeline> {
        Self::build_with_options(plan, graph, params, PipelineOptions::default())
    }

    /// Builds a pipeline.
    ///
    /// Leading `root` operators are skipped. The first `sink` is captured
    /// as the encoding tag list and ends the visible pipeline; operators
    /// after it are dropped. A `root` anywhere else, or either operator
    /// inside a sub-plan, is a plan error.
    pub fn build_with_options(
        plan: &Plan,
        graph: &dyn ReadGraph,
        params: &Params,
        options: PipelineOptions,
    ) -> Result<Pipeline> {
        let mut ops = plan.ops.as_slice();
        while let Some((PlanOp::Root, rest)) = ops.split_first() {
            ops = rest;
        }
        let mut sink_tags = None;
        if let Some(pos) = ops.iter().position(|op| matches!(op, PlanOp::Sink(_))) {
            if let PlanOp::Sink(sink) = &ops[pos] {
                sink_tags = Some(sink.tags.clone());
            }
            ops = &ops[..pos];
        }
        let chain = build_chain(ops, graph, params)?;
        Ok(Pipeline {
            chain,
            sink_tags,
            options,
        })
    }

    /// Builds a plan as a registrable procedure body.
    ///
    /// Procedure plans take the sub-plan shape: no `root`, no `sink`.
    pub fn build_procedure(
        plan: &Plan,
        graph: &dyn ReadGraph,
        params: &Params,
    ) -> Result<ChainProcedure> {
        Ok(ChainProcedure::new(build_chain(&plan.ops, graph, params)?))
    }

    /// Operators in the built chain (the captured sink excluded).
    pub fn op_count(&self) -> usize {
        self.chain.len()
    }

    /// Runs the pipeline over a fresh context and encodes the result.
    pub fn execute(
        &self,
        graph: &dyn ReadGraph,
        procedures: &ProcedureRegistry,
    ) -> Result<ResultSet> {
        self.run(graph, procedures, None)
    }

    /// As [`Pipeline::execute`], recording per-operator stats.
    pub fn execute_with_profile(
        &self,
        graph: &dyn ReadGraph,
        procedures: &ProcedureRegistry,
        profile: &mut PipelineProfile,
    ) -> Result<ResultSet> {
        self.run(graph, procedures, Some(profile))
    }

    fn run(
        &self,
        graph: &dyn ReadGraph,
        procedures: &ProcedureRegistry,
        mut profile: Option<&mut PipelineProfile>,
    ) -> Result<ResultSet> {
        let env = ExecEnv { graph, procedures };
        let mut ctx = Context::new();
        for op in self.chain.iter() {
            let started = Instant::now();
            ctx = op.execute(ctx, &env).map_err(|err| err.annotate(op.name()))?;
            let elapsed = started.elapsed();
            if self.options.trace_ops {
                tracing::debug!(
                    op = op.name(),
                    rows = ctx.row_num(),
                    elapsed_us = elapsed.as_micros() as u64,
                    "pipeline.step"
                );
            }
            if let Some(profile) = profile.as_deref_mut() {
                profile.record(op.name(), elapsed, ctx.row_num());
            }
            if let Some(cap) = self.options.max_rows {
                if ctx.row_num() > cap {
                    return Err(SendaError::unsupported(format!(
                        "{}: intermediate result of {} rows exceeds the {cap} row cap",
                        op.name(),
                        ctx.row_num()
                    )));
                }
            }
        }
        let tags = self.sink_tags.as_deref().unwrap_or(&[]);
        sink::encode(&ctx, tags, graph)
    }
}

fn build_chain(ops: &[PlanOp], graph: &dyn ReadGraph, params: &Params) -> Result<OpChain> {
    let mut built: Vec<Box<dyn Operator>> = Vec::with_capacity(ops.len());
    for op in ops {
        built.push(build_op(op, graph, params)?);
    }
    Ok(OpChain::new(built))
}

fn build_op(op: &PlanOp, graph: &dyn ReadGraph, params: &Params) -> Result<Box<dyn Operator>> {
    Ok(match op {
        PlanOp::Root => {
            return Err(SendaError::bad_request(
                "root is only allowed at the head of the top-level plan",
            ))
        }
        PlanOp::Sink(_) => {
            return Err(SendaError::bad_request(
                "sink is not allowed inside a sub-plan",
            ))
        }
        PlanOp::Scan(p) => Box::new(ScanOp::build(p, graph, params)?),
        PlanOp::EdgeExpand(p) => Box::new(EdgeExpandOp::build(p, graph, params)?),
        PlanOp::GetV(p) => Box::new(GetVOp::build(p, graph, params)?),
        PlanOp::PathExpand(p) => Box::new(PathExpandOp::build(p, graph, params)?),
        PlanOp::Project(p) => Box::new(ProjectOp::build(p, graph, params)?),
        PlanOp::OrderBy(p) => Box::new(OrderByOp::build(p, graph, params)?),
        PlanOp::GroupBy(p) => Box::new(GroupByOp::build(p, graph, params)?),
        PlanOp::Dedup(p) => Box::new(DedupOp::build(p, graph, params)?),
        PlanOp::Select(p) => Box::new(SelectOp::build(p, graph, params)?),
        PlanOp::Limit(p) => Box::new(LimitOp::build(p)?),
        PlanOp::ProcedureCall(p) => Box::new(ProcedureCallOp::build(p.name.clone())),
        PlanOp::Join(p) => {
            let left = build_chain(&p.left_plan, graph, params)?;
            let right = build_chain(&p.right_plan, graph, params)?;
            Box::new(JoinOp::new(
                p.kind,
                Evaluator::compile_all(&p.left_keys, graph, params)?,
                Evaluator::compile_all(&p.right_keys, graph, params)?,
                left,
                right,
            )?)
        }
        PlanOp::Intersect(p) => {
            let mut branches = Vec::with_capacity(p.sub_plans.len());
            for sub in &p.sub_plans {
                branches.push(build_chain(sub, graph, params)?);
            }
            Box::new(IntersectOp::new(p.key, branches)?)
        }
        PlanOp::Union(p) => {
            check_union_schemas(&p.sub_plans)?;
            let mut branches = Vec::with_capacity(p.sub_plans.len());
            for sub in &p.sub_plans {
                branches.push(build_chain(sub, graph, params)?);
            }
            Box::new(UnionOp::new(branches)?)
        }
    })
}

/// Conservative per-branch inference of the column kinds a sub-plan binds.
///
/// Only tags bound *within* the branch are tracked; a projection of a tag the
/// branch never bound infers as a plain value. Branches that disagree on any
/// inferred tag are rejected before execution can reach the column merge.
fn check_union_schemas(sub_plans: &[Vec<PlanOp>]) -> Result<()> {
    let mut expected: Option<FxHashMap<Tag, ColumnKind>> = None;
    for branch in sub_plans {
        let mut schema = FxHashMap::default();
        infer_branch_schema(branch, &mut schema);
        match &expected {
            None => expected = Some(schema),
            Some(first) if *first == schema => {}
            Some(_) => {
                return Err(SendaError::bad_request(
                    "union sub-plans disagree on the kinds of their bound tags",
                ))
            }
        }
    }
    Ok(())
}

fn infer_branch_schema(ops: &[PlanOp], schema: &mut FxHashMap<Tag, ColumnKind>) {
    for op in ops {
        match op {
            PlanOp::Scan(p) => {
                schema.insert(p.alias, ColumnKind::Vertex);
            }
            PlanOp::GetV(p) => {
                schema.insert(p.alias, ColumnKind::Vertex);
            }
            PlanOp::EdgeExpand(p) => {
                let kind = match p.expand {
                    ExpandKind::Vertex => ColumnKind::Vertex,
                    ExpandKind::Edge => ColumnKind::Edge,
                };
                schema.insert(p.alias, kind);
            }
            PlanOp::PathExpand(p) => {
                let kind = match p.result {
                    PathResult::Vertex => ColumnKind::Vertex,
                    PathResult::Path => ColumnKind::Path,
                };
                schema.insert(p.alias, kind);
            }
            PlanOp::Project(p) => {
                let mut bound = Vec::with_capacity(p.exprs.len());
                for item in &p.exprs {
                    let kind = match &item.expr {
                        Expr::Var { tag } => {
                            schema.get(tag).copied().unwrap_or(ColumnKind::Value)
                        }
                        _ => ColumnKind::Value,
                    };
                    bound.push((item.alias, kind));
                }
                schema.extend(bound);
            }
            PlanOp::GroupBy(p) => {
                let mut next = FxHashMap::default();
                for key in &p.keys {
                    let kind = match &key.expr {
                        Expr::Var { tag } => {
                            schema.get(tag).copied().unwrap_or(ColumnKind::Value)
                        }
                        _ => ColumnKind::Value,
                    };
                    next.insert(key.alias, kind);
                }
                for agg in &p.aggregates {
                    next.insert(agg.alias, ColumnKind::Value);
                }
                *schema = next;
            }
            PlanOp::Join(p) => {
                let mut left = schema.clone();
                infer_branch_schema(&p.left_plan, &mut left);
                if matches!(
                    p.kind,
                    crate::plan::JoinKind::Inner | crate::plan::JoinKind::LeftOuter
                ) {
                    let mut right = schema.clone();
                    infer_branch_schema(&p.right_plan, &mut right);
                    for (tag, kind) in right {
                        left.entry(tag).or_insert(kind);
                    }
                }
                *schema = left;
            }
            PlanOp::Union(p) => {
                if let Some(first) = p.sub_plans.first() {
                    infer_branch_schema(first, schema);
                }
            }
            PlanOp::Intersect(p) => {
                if let Some(last) = p.sub_plans.last() {
                    infer_branch_schema(last, schema);
                }
            }
            PlanOp::Select(_)
            | PlanOp::OrderBy(_)
            | PlanOp::Dedup(_)
            | PlanOp::Limit(_)
            | PlanOp::Root
            | PlanOp::Sink(_)
            | PlanOp::ProcedureCall(_) => {}
        }
    }
}
