#![forbid(unsafe_code)]

//! Dedup: first-seen row retention keyed by canonical signatures.

use ahash::AHashSet;

use crate::context::Context;
use crate::expr::sig::{check_signature_len, row_signature};
use crate::expr::Evaluator;
use crate::graph::ReadGraph;
use crate::ops::{ExecEnv, Operator};
use crate::plan::{DedupParams, Params};
use crate::types::{Result, SendaError};

/// Keeps the first row of every distinct key-signature, in row order.
pub struct DedupOp {
    keys: Vec<Evaluator>,
}

impl DedupOp {
    /// Compiles the uniqueness keys.
    pub fn build(params: &DedupParams, graph: &dyn ReadGraph, exec_params: &Params) -> Result<Self> {
        if params.keys.is_empty() {
            return Err(SendaError::bad_request("dedup requires at least one key"));
        }
        Ok(Self {
            keys: Evaluator::compile_all(&params.keys, graph, exec_params)?,
        })
    }
}

impl Operator for DedupOp {
    fn name(&self) -> &'static str {
        "Dedup"
    }

    fn execute(&self, mut ctx: Context, _env: &ExecEnv<'_>) -> Result<Context> {
        let mut seen: AHashSet<Vec<u8>> = AHashSet::with_capacity(ctx.row_num());
        let mut offsets = Vec::with_capacity(ctx.row_num());
        for row in 0..ctx.row_num() {
            let sig = row_signature(&self.keys, &ctx, row)?;
            check_signature_len(&sig)?;
            if seen.insert(sig) {
                offsets.push(row);
            }
        }
        ctx.apply_shuffle(&offsets);
        Ok(ctx)
    }
}
