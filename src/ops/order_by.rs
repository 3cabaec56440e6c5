#![forbid(unsafe_code)]

//! OrderBy: stable multi-key sort with an optional result window.

use std::cmp::Ordering;

use crate::context::Context;
use crate::expr::Evaluator;
use crate::graph::ReadGraph;
use crate::ops::{ExecEnv, Operator};
use crate::plan::{OrderByParams, Params, SortOrder};
use crate::types::{Result, SendaError};
use crate::value::{cmp_values, Value};

/// Sorts rows by an ordered key list (row index as the final tie-break)
/// and optionally keeps only the `[lower, upper)` window of the result.
pub struct OrderByOp {
    keys: Vec<(Evaluator, SortOrder)>,
    window: Option<(usize, usize)>,
}

impl OrderByOp {
    /// Compiles the keys and validates the window.
    pub fn build(
        params: &OrderByParams,
        graph: &dyn ReadGraph,
        exec_params: &Params,
    ) -> Result<Self> {
        if params.keys.is_empty() {
            return Err(SendaError::bad_request("ordering requires at least one key"));
        }
        let keys = params
            .keys
            .iter()
            .map(|key| {
                Ok((
                    Evaluator::compile(&key.expr, graph, exec_params)?,
                    key.order,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        let window = match params.window {
            Some(window) => {
                if window.upper <= window.lower {
                    return Err(SendaError::bad_request(format!(
                        "disallowed row window [{}, {})",
                        window.lower, window.upper
                    )));
                }
                Some((window.lower, window.upper))
            }
            None => None,
        };
        Ok(Self { keys, window })
    }
}

impl Operator for OrderByOp {
    fn name(&self) -> &'static str {
        "OrderBy"
    }

    fn execute(&self, mut ctx: Context, _env: &ExecEnv<'_>) -> Result<Context> {
        // Keys are evaluated once up front; evaluation errors surface before
        // the sort starts.
        let mut key_rows: Vec<Vec<Value>> = Vec::with_capacity(ctx.row_num());
        for row in 0..ctx.row_num() {
            let mut values = Vec::with_capacity(self.keys.len());
            for (eval, _) in &self.keys {
                values.push(eval.eval(&ctx, row)?);
            }
            key_rows.push(values);
        }

        let mut order: Vec<usize> = (0..ctx.row_num()).collect();
        // Comparison failures (unorderable kind mixes) cannot escape the
        // comparator; the first one is captured and re-raised after.
        let mut error: Option<SendaError> = None;
        let mut compare = |a: &usize, b: &usize| {
            for (slot, (_, direction)) in self.keys.iter().enumerate() {
                match cmp_values(&key_rows[*a][slot], &key_rows[*b][slot]) {
                    Ok(Ordering::Equal) => continue,
                    Ok(ordering) => {
                        return match direction {
                            SortOrder::Asc => ordering,
                            SortOrder::Desc => ordering.reverse(),
                        }
                    }
                    Err(err) => {
                        error.get_or_insert(err);
                        return Ordering::Equal;
                    }
                }
            }
            a.cmp(b)
        };
        // The index tie-break makes the comparator a total order, so a small
        // window only needs the top `upper` rows selected before the sort.
        if let Some((_, upper)) = self.window {
            if upper < order.len() {
                order.select_nth_unstable_by(upper, &mut compare);
                order.truncate(upper);
            }
        }
        order.sort_by(&mut compare);
        if let Some(err) = error {
            return Err(err);
        }

        if let Some((lower, upper)) = self.window {
            let lower = lower.min(order.len());
            let upper = upper.min(order.len());
            order = order[lower..upper].to_vec();
        }
        ctx.apply_shuffle(&order);
        Ok(ctx)
    }
}
