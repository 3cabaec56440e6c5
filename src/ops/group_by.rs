#![forbid(unsafe_code)]

//! GroupBy: signature-bucketed aggregation in first-seen-bucket order.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};

use crate::columns::{Column, ValueColumnBuilder};
use crate::context::Context;
use crate::expr::sig::{check_signature_len, value_signature};
use crate::expr::{Evaluator, Expr};
use crate::graph::ReadGraph;
use crate::ops::{ExecEnv, Operator};
use crate::plan::{AggregateFn, GroupByParams, Params};
use crate::types::{LabelId, Result, SendaError, Tag, VertexId};
use crate::value::{cmp_values, Value};

struct GroupKey {
    eval: Evaluator,
    /// Set when the key is a plain tag variable; the key column then keeps
    /// its column kind by shuffling the source column.
    var_tag: Option<Tag>,
    alias: Tag,
}

struct Aggregate {
    func: AggregateFn,
    inputs: Vec<Evaluator>,
    alias: Tag,
}

/// Buckets rows by the canonical signature of the key expressions, then
/// computes each aggregate per bucket. With no keys, all rows form one
/// implicit bucket. Output rows follow first-seen-bucket order.
pub struct GroupByOp {
    keys: Vec<GroupKey>,
    aggregates: Vec<Aggregate>,
}

impl GroupByOp {
    /// Compiles keys and aggregates and checks aggregate arity.
    pub fn build(
        params: &GroupByParams,
        graph: &dyn ReadGraph,
        exec_params: &Params,
    ) -> Result<Self> {
        if params.aggregates.is_empty() {
            return Err(SendaError::bad_request(
                "grouping requires at least one aggregate",
            ));
        }
        let keys = params
            .keys
            .iter()
            .map(|key| {
                Ok(GroupKey {
                    eval: Evaluator::compile(&key.expr, graph, exec_params)?,
                    var_tag: match &key.expr {
                        Expr::Var { tag } => Some(*tag),
                        _ => None,
                    },
                    alias: key.alias,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let aggregates = params
            .aggregates
            .iter()
            .map(|agg| {
                check_arity(agg.func, agg.inputs.len())?;
                Ok(Aggregate {
                    func: agg.func,
                    inputs: Evaluator::compile_all(&agg.inputs, graph, exec_params)?,
                    alias: agg.alias,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { keys, aggregates })
    }
}

fn check_arity(func: AggregateFn, inputs: usize) -> Result<()> {
    let ok = match func {
        AggregateFn::Count => inputs <= 1,
        AggregateFn::CountDistinct => inputs >= 1,
        _ => inputs == 1,
    };
    if ok {
        Ok(())
    } else {
        Err(SendaError::bad_request(format!(
            "aggregate {func:?} does not accept {inputs} inputs"
        )))
    }
}

impl Operator for GroupByOp {
    fn name(&self) -> &'static str {
        "GroupBy"
    }

    fn execute(&self, ctx: Context, _env: &ExecEnv<'_>) -> Result<Context> {
        // Phase one: bucket rows by key signature.
        let mut bucket_rows: Vec<Vec<usize>> = Vec::new();
        if self.keys.is_empty() {
            // Implicit single bucket, present even over zero rows so that
            // e.g. a bare count yields one row.
            bucket_rows.push((0..ctx.row_num()).collect());
        } else {
            let key_evals: Vec<&Evaluator> = self.keys.iter().map(|k| &k.eval).collect();
            let mut index: AHashMap<Vec<u8>, usize> = AHashMap::with_capacity(ctx.row_num());
            for row in 0..ctx.row_num() {
                let mut sig = Vec::with_capacity(key_evals.len() * 12);
                for eval in &key_evals {
                    crate::expr::sig::encode_value(&eval.eval(&ctx, row)?, &mut sig)?;
                }
                check_signature_len(&sig)?;
                let bucket = *index.entry(sig).or_insert_with(|| {
                    bucket_rows.push(Vec::new());
                    bucket_rows.len() - 1
                });
                bucket_rows[bucket].push(row);
            }
        }

        // Phase two: one output row per bucket.
        let representatives: Vec<usize> = bucket_rows
            .iter()
            .filter_map(|rows| rows.first().copied())
            .collect();

        let mut out = Context::new();
        let mut visible = Vec::with_capacity(self.keys.len() + self.aggregates.len());
        for key in &self.keys {
            let column = match key.var_tag {
                Some(tag) => ctx
                    .column(tag)
                    .ok_or_else(|| {
                        SendaError::bad_request(format!("grouping key references unbound tag {tag}"))
                    })?
                    .shuffle(&representatives),
                None => {
                    let mut builder = ValueColumnBuilder::with_capacity(representatives.len());
                    for &row in &representatives {
                        builder.push(key.eval.eval(&ctx, row)?);
                    }
                    Column::Value(builder.finish())
                }
            };
            out.set(key.alias, column);
            visible.push(key.alias);
        }

        for agg in &self.aggregates {
            let mut builder = ValueColumnBuilder::with_capacity(bucket_rows.len());
            for rows in &bucket_rows {
                builder.push(compute_aggregate(agg, &ctx, rows)?);
            }
            out.set(agg.alias, Column::Value(builder.finish()));
            visible.push(agg.alias);
        }
        out.set_visible(visible);
        Ok(out)
    }
}

/// Single-input values of one bucket, null rows excluded.
fn bucket_inputs(eval: &Evaluator, ctx: &Context, rows: &[usize]) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(rows.len());
    for &row in rows {
        let value = eval.eval(ctx, row)?;
        if !value.is_null() {
            values.push(value);
        }
    }
    Ok(values)
}

fn compute_aggregate(agg: &Aggregate, ctx: &Context, rows: &[usize]) -> Result<Value> {
    match agg.func {
        AggregateFn::Count => {
            let count = match agg.inputs.first() {
                Some(eval) => bucket_inputs(eval, ctx, rows)?.len(),
                None => rows.len(),
            };
            Ok(Value::Int(count as i64))
        }
        AggregateFn::CountDistinct => count_distinct(&agg.inputs, ctx, rows),
        AggregateFn::Sum => sum_values(&bucket_inputs(&agg.inputs[0], ctx, rows)?),
        AggregateFn::Min => fold_extreme(&bucket_inputs(&agg.inputs[0], ctx, rows)?, true),
        AggregateFn::Max => fold_extreme(&bucket_inputs(&agg.inputs[0], ctx, rows)?, false),
        AggregateFn::First => Ok(bucket_inputs(&agg.inputs[0], ctx, rows)?
            .into_iter()
            .next()
            .unwrap_or(Value::Null)),
        AggregateFn::ToList => Ok(Value::List(Arc::new(bucket_inputs(
            &agg.inputs[0],
            ctx,
            rows,
        )?))),
        AggregateFn::ToSet => {
            let mut seen: AHashSet<Vec<u8>> = AHashSet::new();
            let mut distinct = Vec::new();
            for value in bucket_inputs(&agg.inputs[0], ctx, rows)? {
                let sig = value_signature(&value)?;
                if seen.insert(sig) {
                    distinct.push(value);
                }
            }
            Ok(Value::List(Arc::new(distinct)))
        }
        AggregateFn::Avg => avg_values(&bucket_inputs(&agg.inputs[0], ctx, rows)?),
    }
}

/// Distinct count over the input tuple; rows with any null input are
/// excluded. A single vertex-valued input takes the identity fast path.
fn count_distinct(inputs: &[Evaluator], ctx: &Context, rows: &[usize]) -> Result<Value> {
    if inputs.len() == 1 {
        let mut vertices: AHashSet<(LabelId, VertexId)> = AHashSet::new();
        let mut generic: AHashSet<Vec<u8>> = AHashSet::new();
        let mut vertex_only = true;
        for &row in rows {
            let value = inputs[0].eval(ctx, row)?;
            match value {
                Value::Null => continue,
                Value::Vertex { label, vid } if vertex_only => {
                    vertices.insert((label, vid));
                }
                value => {
                    if vertex_only {
                        // Mixed input; fold the vertex set into signatures.
                        for (label, vid) in vertices.drain() {
                            generic.insert(value_signature(&Value::Vertex { label, vid })?);
                        }
                        vertex_only = false;
                    }
                    generic.insert(value_signature(&value)?);
                }
            }
        }
        let count = if vertex_only {
            vertices.len()
        } else {
            generic.len()
        };
        return Ok(Value::Int(count as i64));
    }

    let mut seen: AHashSet<Vec<u8>> = AHashSet::new();
    'rows: for &row in rows {
        let mut sig = Vec::new();
        for eval in inputs {
            let value = eval.eval(ctx, row)?;
            if value.is_null() {
                continue 'rows;
            }
            crate::expr::sig::encode_value(&value, &mut sig)?;
        }
        check_signature_len(&sig)?;
        seen.insert(sig);
    }
    Ok(Value::Int(seen.len() as i64))
}

fn sum_values(values: &[Value]) -> Result<Value> {
    let mut acc: Option<Value> = None;
    for value in values {
        acc = Some(match (acc, value) {
            (None, Value::Int(v)) => Value::Int(*v),
            (None, Value::Float(v)) => Value::Float(*v),
            (Some(Value::Int(a)), Value::Int(b)) => Value::Int(
                a.checked_add(*b)
                    .ok_or_else(|| SendaError::unsupported("integer overflow in sum"))?,
            ),
            (Some(Value::Int(a)), Value::Float(b)) => Value::Float(a as f64 + b),
            (Some(Value::Float(a)), Value::Int(b)) => Value::Float(a + *b as f64),
            (Some(Value::Float(a)), Value::Float(b)) => Value::Float(a + b),
            (_, other) => {
                return Err(SendaError::unsupported(format!(
                    "cannot sum non-numeric value {other}"
                )))
            }
        });
    }
    Ok(acc.unwrap_or(Value::Null))
}

fn fold_extreme(values: &[Value], min: bool) -> Result<Value> {
    let mut best: Option<&Value> = None;
    for value in values {
        best = Some(match best {
            None => value,
            Some(current) => {
                let ordering = cmp_values(value, current)?;
                let replace = if min {
                    ordering.is_lt()
                } else {
                    ordering.is_gt()
                };
                if replace {
                    value
                } else {
                    current
                }
            }
        });
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

/// Average with integer truncation for all-integer inputs.
fn avg_values(values: &[Value]) -> Result<Value> {
    if values.is_empty() {
        return Ok(Value::Null);
    }
    match sum_values(values)? {
        Value::Int(total) => Ok(Value::Int(total / values.len() as i64)),
        Value::Float(total) => Ok(Value::Float(total / values.len() as f64)),
        other => Err(SendaError::unsupported(format!(
            "cannot average value {other}"
        ))),
    }
}
