#![forbid(unsafe_code)]

//! Select: order-preserving row filter.

use crate::context::Context;
use crate::expr::Evaluator;
use crate::graph::ReadGraph;
use crate::ops::{ExecEnv, Operator};
use crate::plan::{Params, SelectParams};
use crate::types::Result;

/// Keeps the rows whose predicate evaluates to true; a null predicate
/// outcome never selects a row.
pub struct SelectOp {
    predicate: Evaluator,
}

impl SelectOp {
    /// Compiles the predicate.
    pub fn build(
        params: &SelectParams,
        graph: &dyn ReadGraph,
        exec_params: &Params,
    ) -> Result<Self> {
        Ok(Self {
            predicate: Evaluator::compile(&params.predicate, graph, exec_params)?,
        })
    }
}

impl Operator for SelectOp {
    fn name(&self) -> &'static str {
        "Select"
    }

    fn execute(&self, mut ctx: Context, _env: &ExecEnv<'_>) -> Result<Context> {
        let mut offsets = Vec::with_capacity(ctx.row_num());
        for row in 0..ctx.row_num() {
            if self.predicate.eval_predicate(&ctx, row)? {
                offsets.push(row);
            }
        }
        ctx.apply_shuffle(&offsets);
        Ok(ctx)
    }
}
