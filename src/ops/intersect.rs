#![forbid(unsafe_code)]

//! Intersect: key-tag intersection across sibling sub-plans.

use ahash::AHashSet;

use crate::context::Context;
use crate::expr::sig::value_signature;
use crate::ops::{ExecEnv, OpChain, Operator};
use crate::types::{Result, SendaError, Tag};

/// Runs all but the last sub-plan over duplicated contexts and the last
/// over the live context, keeping at most one row per distinct value of
/// the key tag seen in every branch.
pub struct IntersectOp {
    key: Tag,
    branches: Vec<OpChain>,
}

impl IntersectOp {
    /// Wraps pre-built branches.
    pub fn new(key: Tag, branches: Vec<OpChain>) -> Result<Self> {
        if branches.len() < 2 {
            return Err(SendaError::bad_request(
                "intersection requires at least two sub-plans",
            ));
        }
        Ok(Self { key, branches })
    }

    /// Distinct key signatures a finished branch produced.
    fn key_set(&self, ctx: &Context) -> Result<AHashSet<Vec<u8>>> {
        let column = ctx.column(self.key).ok_or_else(|| {
            SendaError::bad_request(format!(
                "intersection key tag {} is unbound after a sub-plan",
                self.key
            ))
        })?;
        let mut set = AHashSet::with_capacity(ctx.row_num());
        for row in 0..ctx.row_num() {
            set.insert(value_signature(&column.get(row))?);
        }
        Ok(set)
    }
}

impl Operator for IntersectOp {
    fn name(&self) -> &'static str {
        "Intersect"
    }

    fn execute(&self, ctx: Context, env: &ExecEnv<'_>) -> Result<Context> {
        let (last, rest) = self
            .branches
            .split_last()
            .ok_or_else(|| SendaError::internal("intersection without sub-plans"))?;

        let mut shared: Option<AHashSet<Vec<u8>>> = None;
        for branch in rest {
            let branch_ctx = branch.run(ctx.dup(), env)?;
            let keys = self.key_set(&branch_ctx)?;
            shared = Some(match shared {
                None => keys,
                Some(acc) => acc.intersection(&keys).cloned().collect(),
            });
        }
        let shared = shared.unwrap_or_default();

        let mut out = last.run(ctx, env)?;
        let column = out
            .column(self.key)
            .cloned()
            .ok_or_else(|| {
                SendaError::bad_request(format!(
                    "intersection key tag {} is unbound after a sub-plan",
                    self.key
                ))
            })?;
        let mut emitted: AHashSet<Vec<u8>> = AHashSet::new();
        let mut offsets = Vec::new();
        for row in 0..out.row_num() {
            let sig = value_signature(&column.get(row))?;
            if shared.contains(&sig) && emitted.insert(sig) {
                offsets.push(row);
            }
        }
        out.apply_shuffle(&offsets);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{Column, ValueColumnBuilder};
    use crate::graph::MemoryGraph;
    use crate::ops::{ProcedureRegistry, SelectOp};
    use crate::plan::Params;
    use crate::schema::GraphSchema;
    use crate::value::Value;

    fn graph() -> MemoryGraph {
        MemoryGraph::new(
            GraphSchema::from_json(br#"{"vertices": [{"label": "n"}], "edges": []}"#).unwrap(),
        )
        .unwrap()
    }

    fn filter_chain(graph: &MemoryGraph, threshold: i64) -> OpChain {
        let select = SelectOp::build(
            &serde_json::from_value(serde_json::json!({
                "predicate": {"kind": "binary", "op": "gt",
                    "left": {"kind": "var", "tag": 0},
                    "right": {"kind": "const", "value": threshold}}
            }))
            .unwrap(),
            graph,
            &Params::default(),
        )
        .unwrap();
        OpChain::new(vec![Box::new(select)])
    }

    #[test]
    fn keeps_keys_present_in_every_branch_once() -> Result<()> {
        let graph = graph();
        let op = IntersectOp::new(
            Tag(0),
            vec![filter_chain(&graph, 1), filter_chain(&graph, 2)],
        )?;
        let mut builder = ValueColumnBuilder::new();
        for v in [1, 2, 3, 3, 4] {
            builder.push(Value::Int(v));
        }
        let mut ctx = Context::new();
        ctx.set(Tag(0), Column::Value(builder.finish()));
        let procedures = ProcedureRegistry::new();
        let env = ExecEnv {
            graph: &graph,
            procedures: &procedures,
        };
        let out = op.execute(ctx, &env)?;
        // Branch one keeps {2,3,4}, branch two keeps {3,4}; the duplicate 3
        // collapses to one row.
        assert_eq!(out.row_num(), 2);
        assert_eq!(out.column(Tag(0)).unwrap().get(0), Value::Int(3));
        assert_eq!(out.column(Tag(0)).unwrap().get(1), Value::Int(4));
        Ok(())
    }

    #[test]
    fn fewer_than_two_branches_is_rejected() {
        let graph = graph();
        assert!(matches!(
            IntersectOp::new(Tag(0), vec![filter_chain(&graph, 0)]),
            Err(SendaError::BadRequest(_))
        ));
    }
}
