#![forbid(unsafe_code)]

//! Union: column-wise concatenation of sibling sub-plan results.

use crate::context::Context;
use crate::ops::{ExecEnv, OpChain, Operator};
use crate::types::{Result, SendaError, Tag};

/// Runs every sub-plan over an independent copy of the incoming context
/// and concatenates the branch results column by column.
///
/// Branch schemas (tag to column kind) were checked for equality when the
/// plan was built; `union_col` re-checks the family per merge as a
/// contract, so a mismatch here is an internal error, not a crash.
pub struct UnionOp {
    branches: Vec<OpChain>,
}

impl UnionOp {
    /// Wraps pre-built branches.
    pub fn new(branches: Vec<OpChain>) -> Result<Self> {
        if branches.len() < 2 {
            return Err(SendaError::bad_request(
                "union requires at least two sub-plans",
            ));
        }
        Ok(Self { branches })
    }
}

impl Operator for UnionOp {
    fn name(&self) -> &'static str {
        "Union"
    }

    fn execute(&self, ctx: Context, env: &ExecEnv<'_>) -> Result<Context> {
        let (last, rest) = self
            .branches
            .split_last()
            .ok_or_else(|| SendaError::internal("union without sub-plans"))?;
        let mut results = Vec::with_capacity(self.branches.len());
        for branch in rest {
            results.push(branch.run(ctx.dup(), env)?);
        }
        results.push(last.run(ctx, env)?);

        let first = &results[0];
        let tags: Vec<Tag> = first.tags().collect();
        let visible = first.visible().to_vec();

        let mut out = Context::new();
        for tag in tags {
            let mut merged = first
                .column(tag)
                .ok_or_else(|| SendaError::internal("union branch lost a bound tag"))?
                .clone();
            for peer in &results[1..] {
                let column = peer.column(tag).ok_or_else(|| {
                    SendaError::internal(format!(
                        "union branches disagree on bound tag {tag}"
                    ))
                })?;
                merged = merged.union_col(column)?;
            }
            out.set(tag, merged);
        }
        out.set_visible(visible);
        Ok(out)
    }
}
