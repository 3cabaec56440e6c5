#![forbid(unsafe_code)]

//! Limit: `[lower, upper)` slice of the current row set.

use crate::context::Context;
use crate::ops::{ExecEnv, Operator};
use crate::plan::LimitParams;
use crate::types::{Result, SendaError};

/// Keeps the rows in the half-open window, preserving their order.
pub struct LimitOp {
    lower: usize,
    upper: usize,
}

impl LimitOp {
    /// Validates the window.
    pub fn build(params: &LimitParams) -> Result<Self> {
        if params.upper <= params.lower {
            return Err(SendaError::bad_request(format!(
                "disallowed row window [{}, {})",
                params.lower, params.upper
            )));
        }
        Ok(Self {
            lower: params.lower,
            upper: params.upper,
        })
    }
}

impl Operator for LimitOp {
    fn name(&self) -> &'static str {
        "Limit"
    }

    fn execute(&self, mut ctx: Context, _env: &ExecEnv<'_>) -> Result<Context> {
        let lower = self.lower.min(ctx.row_num());
        let upper = self.upper.min(ctx.row_num());
        let offsets: Vec<usize> = (lower..upper).collect();
        ctx.apply_shuffle(&offsets);
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{Column, ValueColumnBuilder};
    use crate::graph::MemoryGraph;
    use crate::ops::ProcedureRegistry;
    use crate::schema::GraphSchema;
    use crate::types::Tag;
    use crate::value::Value;

    fn ctx_of(n: i64) -> Context {
        let mut builder = ValueColumnBuilder::new();
        for v in 0..n {
            builder.push(Value::Int(v));
        }
        let mut ctx = Context::new();
        ctx.set(Tag(0), Column::Value(builder.finish()));
        ctx
    }

    #[test]
    fn slice_is_half_open() -> Result<()> {
        let graph = MemoryGraph::new(
            GraphSchema::from_json(br#"{"vertices": [{"label": "n"}], "edges": []}"#).unwrap(),
        )
        .unwrap();
        let procedures = ProcedureRegistry::new();
        let env = ExecEnv {
            graph: &graph,
            procedures: &procedures,
        };
        let op = LimitOp::build(&LimitParams { lower: 1, upper: 3 })?;
        let out = op.execute(ctx_of(5), &env)?;
        assert_eq!(out.row_num(), 2);
        assert_eq!(out.column(Tag(0)).unwrap().get(0), Value::Int(1));

        // Window past the end clamps to what exists.
        let out = op.execute(ctx_of(2), &env)?;
        assert_eq!(out.row_num(), 1);
        Ok(())
    }

    #[test]
    fn empty_window_is_rejected_at_build() {
        assert!(matches!(
            LimitOp::build(&LimitParams { lower: 3, upper: 3 }),
            Err(SendaError::BadRequest(_))
        ));
    }
}
