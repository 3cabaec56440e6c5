#![forbid(unsafe_code)]

//! The operator set: pure `Context -> Result<Context>` transformations.
//!
//! Operators are instantiated once per pipeline build (names resolved,
//! expressions compiled, sub-plans recursively built) and then executed in
//! plan order. Execution threads the context by value; an operator that
//! fails returns its error and no partial context survives.

pub mod dedup;
pub mod edge_expand;
pub mod get_v;
pub mod group_by;
pub mod intersect;
pub mod join;
pub mod limit;
pub mod order_by;
pub mod path_expand;
pub mod procedure;
pub mod project;
pub mod scan;
pub mod select;
pub mod sink;
pub mod union;

pub use dedup::DedupOp;
pub use edge_expand::EdgeExpandOp;
pub use get_v::GetVOp;
pub use group_by::GroupByOp;
pub use intersect::IntersectOp;
pub use join::JoinOp;
pub use limit::LimitOp;
pub use order_by::OrderByOp;
pub use path_expand::PathExpandOp;
pub use procedure::{ChainProcedure, Procedure, ProcedureCallOp, ProcedureRegistry};
pub use project::ProjectOp;
pub use scan::ScanOp;
pub use select::SelectOp;
pub use union::UnionOp;

use crate::context::Context;
use crate::graph::ReadGraph;
use crate::types::Result;

/// Execution-time collaborators shared by every operator of one run.
pub struct ExecEnv<'a> {
    /// The graph snapshot the pipeline reads.
    pub graph: &'a dyn ReadGraph,
    /// Procedures callable through [`ProcedureCallOp`].
    pub procedures: &'a ProcedureRegistry,
}

/// One built operator instance.
pub trait Operator: Send + Sync {
    /// Operator name used for error annotation and logging.
    fn name(&self) -> &'static str;

    /// Transforms the context; the first failure terminates the pipeline.
    fn execute(&self, ctx: Context, env: &ExecEnv<'_>) -> Result<Context>;
}

/// An ordered list of built operators, as held by a pipeline or a nested
/// sub-plan (join branch, union branch, procedure body).
pub struct OpChain {
    ops: Vec<Box<dyn Operator>>,
}

impl OpChain {
    /// Wraps an already-built operator list.
    pub fn new(ops: Vec<Box<dyn Operator>>) -> Self {
        Self { ops }
    }

    /// Number of operators in the chain.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true when the chain holds no operators.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The operators, in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Operator> {
        self.ops.iter().map(AsRef::as_ref)
    }

    /// Runs the chain to completion, annotating the first failure with the
    /// failing operator's name.
    pub fn run(&self, mut ctx: Context, env: &ExecEnv<'_>) -> Result<Context> {
        for op in &self.ops {
            ctx = op.execute(ctx, env).map_err(|err| err.annotate(op.name()))?;
        }
        Ok(ctx)
    }
}
