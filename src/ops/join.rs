#![forbid(unsafe_code)]

//! Join: hash join of two sub-plan branches.

use ahash::AHashMap;

use crate::context::Context;
use crate::expr::sig::{check_signature_len, row_signature};
use crate::expr::Evaluator;
use crate::ops::{ExecEnv, OpChain, Operator};
use crate::plan::JoinKind;
use crate::types::{Result, SendaError, Tag};

/// Runs the left and right sub-plans over independent copies of the
/// incoming context, then joins their row sets on positionally-paired key
/// expressions.
///
/// Inner and left-outer output carries every left column plus each right
/// column whose tag the left branch does not bind; semi and anti keep only
/// the left columns.
pub struct JoinOp {
    kind: JoinKind,
    left_keys: Vec<Evaluator>,
    right_keys: Vec<Evaluator>,
    left: OpChain,
    right: OpChain,
}

impl JoinOp {
    /// Wraps pre-built branches and compiled keys.
    pub fn new(
        kind: JoinKind,
        left_keys: Vec<Evaluator>,
        right_keys: Vec<Evaluator>,
        left: OpChain,
        right: OpChain,
    ) -> Result<Self> {
        if left_keys.is_empty() || left_keys.len() != right_keys.len() {
            return Err(SendaError::bad_request(
                "join requires matching non-empty key lists",
            ));
        }
        Ok(Self {
            kind,
            left_keys,
            right_keys,
            left,
            right,
        })
    }
}

impl Operator for JoinOp {
    fn name(&self) -> &'static str {
        "Join"
    }

    fn execute(&self, ctx: Context, env: &ExecEnv<'_>) -> Result<Context> {
        let left_ctx = self.left.run(ctx.dup(), env)?;
        let right_ctx = self.right.run(ctx, env)?;

        // Build side: right rows indexed by key signature.
        let mut table: AHashMap<Vec<u8>, Vec<usize>> =
            AHashMap::with_capacity(right_ctx.row_num());
        for row in 0..right_ctx.row_num() {
            let sig = row_signature(&self.right_keys, &right_ctx, row)?;
            check_signature_len(&sig)?;
            table.entry(sig).or_default().push(row);
        }

        let mut left_off: Vec<usize> = Vec::new();
        let mut right_off: Vec<Option<usize>> = Vec::new();
        for row in 0..left_ctx.row_num() {
            let sig = row_signature(&self.left_keys, &left_ctx, row)?;
            check_signature_len(&sig)?;
            let matches = table.get(&sig).map(Vec::as_slice).unwrap_or(&[]);
            match self.kind {
                JoinKind::Inner => {
                    for &peer in matches {
                        left_off.push(row);
                        right_off.push(Some(peer));
                    }
                }
                JoinKind::Semi => {
                    if !matches.is_empty() {
                        left_off.push(row);
                    }
                }
                JoinKind::Anti => {
                    if matches.is_empty() {
                        left_off.push(row);
                    }
                }
                JoinKind::LeftOuter => {
                    if matches.is_empty() {
                        left_off.push(row);
                        right_off.push(None);
                    } else {
                        for &peer in matches {
                            left_off.push(row);
                            right_off.push(Some(peer));
                        }
                    }
                }
            }
        }

        let mut out = left_ctx;
        out.apply_shuffle(&left_off);
        if matches!(self.kind, JoinKind::Inner | JoinKind::LeftOuter) {
            let mut visible = out.visible().to_vec();
            for tag in right_ctx.tags().collect::<Vec<Tag>>() {
                if out.column(tag).is_some() {
                    continue;
                }
                let column = right_ctx
                    .column(tag)
                    .ok_or_else(|| SendaError::internal("right branch lost a bound tag"))?
                    .shuffle_optional(&right_off);
                out.set(tag, column);
            }
            for tag in right_ctx.visible() {
                if !visible.contains(tag) {
                    visible.push(*tag);
                }
            }
            out.set_visible(visible);
        }
        Ok(out)
    }
}
