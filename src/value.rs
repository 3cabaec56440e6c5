#![forbid(unsafe_code)]

//! Runtime values flowing through expressions, columns, and results.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::types::{Dir, LabelId, LabelTriplet, Result, SendaError, StrId, VertexId};

/// Scalar/object kind carried by schema properties, value columns, and
/// parameter declarations.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point number.
    Float,
    /// Boolean.
    Bool,
    /// Dictionary-backed string.
    #[serde(rename = "string")]
    Str,
    /// Opaque timestamp in milliseconds since the Unix epoch.
    Timestamp,
    /// Homogeneous list.
    List,
    /// Heterogeneous tuple.
    Tuple,
}

impl ValueKind {
    /// Parses a raw string parameter into a value of this kind.
    ///
    /// Parameters arrive as a string-keyed map of string values; each
    /// parameter reference in a plan declares the kind it binds as.
    pub fn parse(self, raw: &str) -> Result<Value> {
        match self {
            ValueKind::Int => raw
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| SendaError::bad_request(format!("parameter '{raw}' is not an integer"))),
            ValueKind::Float => raw
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| SendaError::bad_request(format!("parameter '{raw}' is not a float"))),
            ValueKind::Bool => match raw {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(SendaError::bad_request(format!(
                    "parameter '{raw}' is not a boolean"
                ))),
            },
            ValueKind::Str => Ok(Value::Str(Arc::from(raw))),
            ValueKind::Timestamp => raw
                .parse::<i64>()
                .map(Value::Timestamp)
                .map_err(|_| {
                    SendaError::bad_request(format!("parameter '{raw}' is not a timestamp"))
                }),
            ValueKind::List | ValueKind::Tuple => Err(SendaError::bad_request(
                "list and tuple parameters cannot be bound from a string",
            )),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
            ValueKind::Str => "string",
            ValueKind::Timestamp => "timestamp",
            ValueKind::List => "list",
            ValueKind::Tuple => "tuple",
        };
        write!(f, "{name}")
    }
}

/// Edge identity plus payload, as seen by expressions and group keys.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeValue {
    /// The edge relation.
    pub triplet: LabelTriplet,
    /// Source endpoint (internal id under `triplet.src_label`).
    pub src: VertexId,
    /// Destination endpoint (internal id under `triplet.dst_label`).
    pub dst: VertexId,
    /// Direction the edge was reached through.
    pub dir: Dir,
    /// Payload property value; `Value::Null` when the relation carries none.
    pub data: Value,
}

/// Runtime value produced by evaluating an expression over one row.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Absent value (optional column rows, missing properties).
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// Shared string.
    Str(Arc<str>),
    /// Opaque timestamp, milliseconds since the Unix epoch.
    Timestamp(i64),
    /// Vertex record: (label, internal id).
    Vertex {
        /// Vertex label.
        label: LabelId,
        /// Internal id within the label.
        vid: VertexId,
    },
    /// Edge record.
    Edge(Box<EdgeValue>),
    /// Path record, materialized as its (label, id) step sequence.
    Path(Arc<Vec<(LabelId, VertexId)>>),
    /// Homogeneous list.
    List(Arc<Vec<Value>>),
    /// Heterogeneous tuple.
    Tuple(Arc<Vec<Value>>),
}

impl Value {
    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Interprets the value as a predicate outcome.
    ///
    /// Null counts as false (a predicate over a null row never selects it);
    /// any non-boolean value is an unsupported predicate shape.
    pub fn as_predicate(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Null => Ok(false),
            other => Err(SendaError::unsupported(format!(
                "predicate evaluated to non-boolean {other}"
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "timestamp({v})"),
            Value::Vertex { label, vid } => write!(f, "vertex({label}:{vid})"),
            Value::Edge(e) => write!(
                f,
                "edge({}-[{}]->{})",
                e.src, e.triplet.edge_type, e.dst
            ),
            Value::Path(steps) => {
                write!(f, "path[")?;
                for (i, (label, vid)) in steps.iter().enumerate() {
                    if i > 0 {
                        write!(f, " -> ")?;
                    }
                    write!(f, "{label}:{vid}")?;
                }
                write!(f, "]")
            }
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Arc::from(value.as_str()))
    }
}

/// Orders two values for sorting and min/max aggregation.
///
/// Nulls sort first; ints and floats compare numerically across kinds;
/// any other kind mix is an unsupported comparison.
pub(crate) fn cmp_values(a: &Value, b: &Value) -> Result<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Ok(Ordering::Equal),
        (Value::Null, _) => Ok(Ordering::Less),
        (_, Value::Null) => Ok(Ordering::Greater),
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::Timestamp(x), Value::Timestamp(y)) => Ok(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => Ok(x.total_cmp(y)),
        (Value::Int(x), Value::Float(y)) => Ok((*x as f64).total_cmp(y)),
        (Value::Float(x), Value::Int(y)) => Ok(x.total_cmp(&(*y as f64))),
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Vertex { label: la, vid: va }, Value::Vertex { label: lb, vid: vb }) => {
            Ok((la, va).cmp(&(lb, vb)))
        }
        (x, y) => Err(SendaError::unsupported(format!(
            "cannot order {x} against {y}"
        ))),
    }
}

/// Read-only string dictionary shared across columns and contexts.
///
/// Tables are frozen before execution starts; columns refer to entries by
/// [`StrId`] and clone the `Arc` handle instead of copying bytes.
#[derive(Debug, Default)]
pub struct StrTable {
    entries: Vec<Arc<str>>,
}

impl StrTable {
    /// Number of interned strings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the table holds no strings.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves a dictionary slot.
    pub fn get(&self, id: StrId) -> Option<&Arc<str>> {
        self.entries.get(id.0 as usize)
    }
}

/// Accumulates strings into a [`StrTable`], deduplicating on the way in.
#[derive(Debug, Default)]
pub struct StrTableBuilder {
    table: StrTable,
    index: FxHashMap<Arc<str>, StrId>,
}

impl StrTableBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a string, returning its slot.
    pub fn intern(&mut self, value: &str) -> StrId {
        if let Some(id) = self.index.get(value) {
            return *id;
        }
        let id = StrId(self.table.entries.len() as u32);
        let shared: Arc<str> = Arc::from(value);
        self.table.entries.push(Arc::clone(&shared));
        self.index.insert(shared, id);
        id
    }

    /// Freezes the builder into a shared read-only table.
    pub fn finish(self) -> Arc<StrTable> {
        Arc::new(self.table)
    }

    /// Takes a frozen snapshot without consuming the builder.
    ///
    /// The snapshot shares the interned `Arc<str>` entries; later interning
    /// does not affect tables already handed out.
    pub fn snapshot(&self) -> Arc<StrTable> {
        Arc::new(StrTable {
            entries: self.table.entries.clone(),
        })
    }
}
