#![forbid(unsafe_code)]

//! Compiled expression evaluation over context rows.

use std::cmp::Ordering;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::context::Context;
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::graph::{PropertyColumn, ReadGraph};
use crate::plan::Params;
use crate::types::{LabelId, LabelTriplet, Result, SendaError, Tag};
use crate::value::{cmp_values, Value};

enum Compiled {
    Const(Value),
    Var(Tag),
    Property {
        tag: Tag,
        /// Pre-resolved vertex property columns, per label carrying the name.
        by_label: FxHashMap<LabelId, PropertyColumn>,
        /// Edge relations whose payload property carries the name.
        payload_triplets: FxHashSet<LabelTriplet>,
    },
    Label(Tag),
    Unary {
        op: UnaryOp,
        expr: Box<Compiled>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Compiled>,
        right: Box<Compiled>,
    },
    Within {
        expr: Box<Compiled>,
        values: Vec<Value>,
    },
    IsNull(Box<Compiled>),
}

/// An expression compiled against one graph and one parameter binding.
///
/// Compilation resolves parameters and property names up front; evaluation
/// is per row and touches only columns and pre-resolved handles.
pub struct Evaluator {
    root: Compiled,
}

/// A value standing in for a tag that has no column yet.
///
/// Expansion predicates are evaluated per candidate edge or vertex before
/// the output column exists; the candidate is injected at the operator's
/// alias tag.
pub type Candidate<'a> = (Tag, &'a Value);

impl Evaluator {
    /// Compiles an expression tree.
    pub fn compile(expr: &Expr, graph: &dyn ReadGraph, params: &Params) -> Result<Self> {
        Ok(Self {
            root: compile(expr, graph, params)?,
        })
    }

    /// Compiles a list of expressions.
    pub fn compile_all(
        exprs: &[Expr],
        graph: &dyn ReadGraph,
        params: &Params,
    ) -> Result<Vec<Evaluator>> {
        exprs
            .iter()
            .map(|expr| Self::compile(expr, graph, params))
            .collect()
    }

    /// Evaluates over one context row.
    pub fn eval(&self, ctx: &Context, row: usize) -> Result<Value> {
        eval(&self.root, ctx, row, None)
    }

    /// Evaluates with a candidate value standing in at one tag.
    pub fn eval_with_candidate(
        &self,
        ctx: &Context,
        row: usize,
        candidate: Candidate<'_>,
    ) -> Result<Value> {
        eval(&self.root, ctx, row, Some(candidate))
    }

    /// Evaluates as a row predicate; null counts as false.
    pub fn eval_predicate(&self, ctx: &Context, row: usize) -> Result<bool> {
        self.eval(ctx, row)?.as_predicate()
    }
}

fn compile(expr: &Expr, graph: &dyn ReadGraph, params: &Params) -> Result<Compiled> {
    Ok(match expr {
        Expr::Const { value } => Compiled::Const(value.to_value()),
        Expr::Param { name, as_kind } => {
            let raw = params.get(name).ok_or_else(|| {
                SendaError::bad_request(format!("missing parameter '{name}'"))
            })?;
            Compiled::Const(as_kind.parse(raw)?)
        }
        Expr::Var { tag } => Compiled::Var(*tag),
        Expr::Property { tag, name } => {
            let schema = graph.schema();
            let mut by_label = FxHashMap::default();
            for pos in 0..schema.vertex_label_count() {
                let label = LabelId(pos as u32);
                if schema.vertex_property(label, name).is_some() {
                    if let Some(column) = graph.property_column(label, name) {
                        by_label.insert(label, column);
                    }
                }
            }
            let payload_triplets = schema
                .triplets()
                .filter(|triplet| {
                    schema
                        .triplet_payload(*triplet)
                        .map(|def| def.name == *name)
                        .unwrap_or(false)
                })
                .collect();
            Compiled::Property {
                tag: *tag,
                by_label,
                payload_triplets,
            }
        }
        Expr::Label { tag } => Compiled::Label(*tag),
        Expr::Unary { op, expr } => Compiled::Unary {
            op: *op,
            expr: Box::new(compile(expr, graph, params)?),
        },
        Expr::Binary { op, left, right } => Compiled::Binary {
            op: *op,
            left: Box::new(compile(left, graph, params)?),
            right: Box::new(compile(right, graph, params)?),
        },
        Expr::Within { expr, values } => Compiled::Within {
            expr: Box::new(compile(expr, graph, params)?),
            values: values.iter().map(|lit| lit.to_value()).collect(),
        },
        Expr::IsNull { expr } => Compiled::IsNull(Box::new(compile(expr, graph, params)?)),
    })
}

fn tag_value(
    ctx: &Context,
    tag: Tag,
    row: usize,
    candidate: Option<Candidate<'_>>,
) -> Result<Value> {
    if let Some((candidate_tag, value)) = candidate {
        if candidate_tag == tag {
            return Ok(value.clone());
        }
    }
    let column = ctx
        .column(tag)
        .ok_or_else(|| SendaError::bad_request(format!("expression references unbound tag {tag}")))?;
    Ok(column.get(row))
}

fn eval(
    node: &Compiled,
    ctx: &Context,
    row: usize,
    candidate: Option<Candidate<'_>>,
) -> Result<Value> {
    match node {
        Compiled::Const(value) => Ok(value.clone()),
        Compiled::Var(tag) => tag_value(ctx, *tag, row, candidate),
        Compiled::Property {
            tag,
            by_label,
            payload_triplets,
        } => {
            let element = match candidate {
                Some((candidate_tag, value)) if candidate_tag == *tag => value.clone(),
                _ => tag_value(ctx, *tag, row, None)?,
            };
            Ok(match element {
                Value::Null => Value::Null,
                Value::Vertex { label, vid } => by_label
                    .get(&label)
                    .map(|column| column.get(vid))
                    .unwrap_or(Value::Null),
                Value::Edge(edge) => {
                    if payload_triplets.contains(&edge.triplet) {
                        edge.data.clone()
                    } else {
                        Value::Null
                    }
                }
                other => {
                    return Err(SendaError::unsupported(format!(
                        "property access on non-graph element {other}"
                    )))
                }
            })
        }
        Compiled::Label(tag) => Ok(match tag_value(ctx, *tag, row, candidate)? {
            Value::Null => Value::Null,
            Value::Vertex { label, .. } => Value::Int(label.0 as i64),
            other => {
                return Err(SendaError::unsupported(format!(
                    "label access on non-vertex element {other}"
                )))
            }
        }),
        Compiled::Unary { op, expr } => {
            let value = eval(expr, ctx, row, candidate)?;
            eval_unary(*op, value)
        }
        Compiled::Binary { op, left, right } => {
            let lhs = eval(left, ctx, row, candidate)?;
            let rhs = eval(right, ctx, row, candidate)?;
            eval_binary(*op, lhs, rhs)
        }
        Compiled::Within { expr, values } => {
            let value = eval(expr, ctx, row, candidate)?;
            if value.is_null() {
                return Ok(Value::Null);
            }
            let found = values.iter().any(|member| {
                cmp_values(member, &value)
                    .map(|ordering| ordering == Ordering::Equal)
                    .unwrap_or(false)
            });
            Ok(Value::Bool(found))
        }
        Compiled::IsNull(expr) => {
            let value = eval(expr, ctx, row, candidate)?;
            Ok(Value::Bool(value.is_null()))
        }
    }
}

fn eval_unary(op: UnaryOp, value: Value) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match (op, value) {
        (UnaryOp::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
        (UnaryOp::Neg, Value::Int(v)) => v
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| SendaError::unsupported("integer overflow in negation")),
        (UnaryOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
        (op, value) => Err(SendaError::unsupported(format!(
            "cannot apply {op:?} to {value}"
        ))),
    }
}

fn eval_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
    match op {
        BinaryOp::And | BinaryOp::Or => {
            let l = lhs.as_predicate()?;
            let r = rhs.as_predicate()?;
            Ok(Value::Bool(match op {
                BinaryOp::And => l && r,
                _ => l || r,
            }))
        }
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            if lhs.is_null() || rhs.is_null() {
                return Ok(Value::Null);
            }
            let ordering = cmp_values(&lhs, &rhs)?;
            Ok(Value::Bool(match op {
                BinaryOp::Eq => ordering == Ordering::Equal,
                BinaryOp::Ne => ordering != Ordering::Equal,
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            if lhs.is_null() || rhs.is_null() {
                return Ok(Value::Null);
            }
            eval_arithmetic(op, lhs, rhs)
        }
    }
}

fn eval_arithmetic(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div => a.checked_div(b),
                _ => a.checked_rem(b),
            };
            result
                .map(Value::Int)
                .ok_or_else(|| SendaError::unsupported("integer overflow or division by zero"))
        }
        (a, b) => {
            let (a, b) = match (a, b) {
                (Value::Float(a), Value::Float(b)) => (a, b),
                (Value::Int(a), Value::Float(b)) => (a as f64, b),
                (Value::Float(a), Value::Int(b)) => (a, b as f64),
                (a, b) => {
                    return Err(SendaError::unsupported(format!(
                        "cannot apply {op:?} to {a} and {b}"
                    )))
                }
            };
            Ok(Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{Column, VertexColumnBuilder};
    use crate::graph::{MemoryGraph, MutGraph};
    use crate::schema::GraphSchema;
    use crate::types::VertexId;

    fn graph() -> MemoryGraph {
        let schema = GraphSchema::from_json(
            br#"{
                "vertices": [
                    {"label": "person", "properties": [
                        {"name": "name", "kind": "string"},
                        {"name": "age", "kind": "int"}
                    ]}
                ],
                "edges": []
            }"#,
        )
        .unwrap();
        let mut graph = MemoryGraph::new(schema).unwrap();
        let person = graph.schema().vertex_label("person").unwrap();
        graph
            .insert_vertex(person, 1, vec!["ada".into(), Value::Int(36)])
            .unwrap();
        graph
            .insert_vertex(person, 2, vec!["brin".into(), Value::Int(17)])
            .unwrap();
        graph
    }

    fn person_ctx(graph: &MemoryGraph) -> Context {
        let person = graph.schema().vertex_label("person").unwrap();
        let mut builder = VertexColumnBuilder::new();
        builder.push(person, VertexId(0));
        builder.push(person, VertexId(1));
        let mut ctx = Context::new();
        ctx.set(Tag(0), Column::Vertex(builder.finish()));
        ctx
    }

    #[test]
    fn property_predicate_over_rows() -> Result<()> {
        let graph = graph();
        let ctx = person_ctx(&graph);
        let expr: Expr = serde_json::from_str(
            r#"{"kind": "binary", "op": "ge",
                "left": {"kind": "property", "tag": 0, "name": "age"},
                "right": {"kind": "const", "value": 18}}"#,
        )
        .unwrap();
        let eval = Evaluator::compile(&expr, &graph, &Params::default())?;
        assert!(eval.eval_predicate(&ctx, 0)?);
        assert!(!eval.eval_predicate(&ctx, 1)?);
        Ok(())
    }

    #[test]
    fn parameter_binds_at_compile_time() -> Result<()> {
        let graph = graph();
        let ctx = person_ctx(&graph);
        let expr: Expr = serde_json::from_str(
            r#"{"kind": "binary", "op": "lt",
                "left": {"kind": "property", "tag": 0, "name": "age"},
                "right": {"kind": "param", "name": "cutoff", "as": "int"}}"#,
        )
        .unwrap();
        let mut params = Params::default();
        params.insert("cutoff".to_string(), "20".to_string());
        let eval = Evaluator::compile(&expr, &graph, &params)?;
        assert!(!eval.eval_predicate(&ctx, 0)?);
        assert!(eval.eval_predicate(&ctx, 1)?);

        let missing = Evaluator::compile(&expr, &graph, &Params::default());
        assert!(matches!(missing, Err(SendaError::BadRequest(_))));
        Ok(())
    }

    #[test]
    fn within_and_null_handling() -> Result<()> {
        let graph = graph();
        let ctx = person_ctx(&graph);
        let expr: Expr = serde_json::from_str(
            r#"{"kind": "within",
                "expr": {"kind": "property", "tag": 0, "name": "name"},
                "values": ["ada", "cleo"]}"#,
        )
        .unwrap();
        let eval = Evaluator::compile(&expr, &graph, &Params::default())?;
        assert!(eval.eval_predicate(&ctx, 0)?);
        assert!(!eval.eval_predicate(&ctx, 1)?);
        Ok(())
    }

    #[test]
    fn candidate_substitutes_the_missing_tag() -> Result<()> {
        let graph = graph();
        let ctx = person_ctx(&graph);
        let expr: Expr = serde_json::from_str(
            r#"{"kind": "binary", "op": "gt",
                "left": {"kind": "var", "tag": 5},
                "right": {"kind": "const", "value": 10}}"#,
        )
        .unwrap();
        let eval = Evaluator::compile(&expr, &graph, &Params::default())?;
        let candidate = Value::Int(11);
        assert!(eval
            .eval_with_candidate(&ctx, 0, (Tag(5), &candidate))?
            .as_predicate()?);
        // Without the candidate the tag is unbound.
        assert!(eval.eval(&ctx, 0).is_err());
        Ok(())
    }

    #[test]
    fn overflow_is_unsupported() -> Result<()> {
        let graph = graph();
        let ctx = person_ctx(&graph);
        let expr = Expr::Binary {
            op: BinaryOp::Add,
            left: Box::new(Expr::Const {
                value: crate::expr::Literal::Int(i64::MAX),
            }),
            right: Box::new(Expr::Const {
                value: crate::expr::Literal::Int(1),
            }),
        };
        let eval = Evaluator::compile(&expr, &graph, &Params::default())?;
        assert!(matches!(
            eval.eval(&ctx, 0),
            Err(SendaError::Unsupported(_))
        ));
        Ok(())
    }
}
