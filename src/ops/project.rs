#![forbid(unsafe_code)]

//! Project: per-row expression evaluation into alias-tagged columns.

use crate::columns::{Column, ValueColumnBuilder};
use crate::context::Context;
use crate::expr::{Evaluator, Expr};
use crate::graph::ReadGraph;
use crate::ops::{ExecEnv, Operator};
use crate::plan::{Params, ProjectParams};
use crate::types::{Result, SendaError, Tag};

enum Projection {
    /// Plain tag variable: re-binds the existing column without copying.
    Alias(Tag),
    /// Anything else evaluates per row into a value column.
    Expr(Evaluator),
}

/// Binds one column per (expression, alias) pair; row count is unchanged.
/// `is_append` extends the visible tag list instead of replacing it.
pub struct ProjectOp {
    items: Vec<(Projection, Tag)>,
    is_append: bool,
}

impl ProjectOp {
    /// Compiles the projections.
    pub fn build(
        params: &ProjectParams,
        graph: &dyn ReadGraph,
        exec_params: &Params,
    ) -> Result<Self> {
        if params.exprs.is_empty() {
            return Err(SendaError::bad_request("projection requires at least one expression"));
        }
        let items = params
            .exprs
            .iter()
            .map(|item| {
                let projection = match &item.expr {
                    Expr::Var { tag } => Projection::Alias(*tag),
                    expr => Projection::Expr(Evaluator::compile(expr, graph, exec_params)?),
                };
                Ok((projection, item.alias))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            items,
            is_append: params.is_append,
        })
    }
}

impl Operator for ProjectOp {
    fn name(&self) -> &'static str {
        "Project"
    }

    fn execute(&self, mut ctx: Context, _env: &ExecEnv<'_>) -> Result<Context> {
        // Outputs are computed against the pre-projection context so that
        // one projection cannot observe a sibling's alias.
        let mut outputs = Vec::with_capacity(self.items.len());
        for (projection, alias) in &self.items {
            let column = match projection {
                Projection::Alias(tag) => ctx
                    .column(*tag)
                    .cloned()
                    .ok_or_else(|| {
                        SendaError::bad_request(format!("projection references unbound tag {tag}"))
                    })?,
                Projection::Expr(eval) => {
                    let mut builder = ValueColumnBuilder::with_capacity(ctx.row_num());
                    for row in 0..ctx.row_num() {
                        builder.push(eval.eval(&ctx, row)?);
                    }
                    Column::Value(builder.finish())
                }
            };
            outputs.push((*alias, column));
        }

        let aliases: Vec<Tag> = outputs.iter().map(|(alias, _)| *alias).collect();
        for (alias, column) in outputs {
            ctx.set(alias, column);
        }
        if self.is_append {
            for alias in aliases {
                ctx.push_visible(alias);
            }
        } else {
            ctx.set_visible(aliases);
        }
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::VertexColumnBuilder;
    use crate::graph::MemoryGraph;
    use crate::ops::ProcedureRegistry;
    use crate::schema::GraphSchema;
    use crate::types::{LabelId, VertexId};
    use crate::value::Value;

    fn graph() -> MemoryGraph {
        let schema = GraphSchema::from_json(
            br#"{"vertices": [{"label": "person"}], "edges": []}"#,
        )
        .unwrap();
        MemoryGraph::new(schema).unwrap()
    }

    fn ctx() -> Context {
        let mut builder = VertexColumnBuilder::new();
        builder.push(LabelId(0), VertexId(0));
        builder.push(LabelId(0), VertexId(1));
        let mut ctx = Context::new();
        ctx.set(Tag(0), Column::Vertex(builder.finish()));
        ctx.push_visible(Tag(0));
        ctx
    }

    #[test]
    fn expression_projection_replaces_visible_tags() -> Result<()> {
        let graph = graph();
        let op = ProjectOp::build(
            &serde_json::from_value(serde_json::json!({
                "exprs": [{"expr": {"kind": "const", "value": 7}, "alias": 3}]
            }))
            .unwrap(),
            &graph,
            &Params::default(),
        )?;
        let procedures = ProcedureRegistry::new();
        let env = ExecEnv {
            graph: &graph,
            procedures: &procedures,
        };
        let out = op.execute(ctx(), &env)?;
        assert_eq!(out.row_num(), 2);
        assert_eq!(out.visible(), &[Tag(3)]);
        assert_eq!(out.column(Tag(3)).unwrap().get(1), Value::Int(7));
        // Source column stays bound, just not visible.
        assert!(out.column(Tag(0)).is_some());
        Ok(())
    }

    #[test]
    fn var_projection_aliases_without_copying() -> Result<()> {
        let graph = graph();
        let op = ProjectOp::build(
            &serde_json::from_value(serde_json::json!({
                "exprs": [{"expr": {"kind": "var", "tag": 0}, "alias": 5}],
                "is_append": true
            }))
            .unwrap(),
            &graph,
            &Params::default(),
        )?;
        let procedures = ProcedureRegistry::new();
        let env = ExecEnv {
            graph: &graph,
            procedures: &procedures,
        };
        let out = op.execute(ctx(), &env)?;
        assert_eq!(out.visible(), &[Tag(0), Tag(5)]);
        assert_eq!(
            out.column(Tag(5)).unwrap().get(0),
            out.column(Tag(0)).unwrap().get(0)
        );
        Ok(())
    }
}
