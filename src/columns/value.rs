#![forbid(unsafe_code)]

//! Scalar / list / tuple value columns.
//!
//! The builder accumulates plain [`Value`]s and freezes them into the
//! tightest typed layout the rows allow; heterogeneous rows fall back to a
//! boxed object column. String columns produced straight from a property
//! column keep their dictionary encoding and are finalized against the
//! shared string table ([`StrDictColumnBuilder::finish`]).

use std::sync::Arc;

use crate::columns::{check_offsets, check_optional_offsets};
use crate::types::StrId;
use crate::value::{StrTable, Value, ValueKind};

/// A column of scalar / list / tuple values.
#[derive(Clone, Debug)]
pub enum ValueColumn {
    /// 64-bit integers.
    Int {
        /// Row payload.
        values: Arc<Vec<i64>>,
        /// `None` means all rows are valid.
        validity: Option<Arc<Vec<bool>>>,
    },
    /// 64-bit floats.
    Float {
        /// Row payload.
        values: Arc<Vec<f64>>,
        /// `None` means all rows are valid.
        validity: Option<Arc<Vec<bool>>>,
    },
    /// Booleans.
    Bool {
        /// Row payload.
        values: Arc<Vec<bool>>,
        /// `None` means all rows are valid.
        validity: Option<Arc<Vec<bool>>>,
    },
    /// Opaque millisecond timestamps.
    Timestamp {
        /// Row payload.
        values: Arc<Vec<i64>>,
        /// `None` means all rows are valid.
        validity: Option<Arc<Vec<bool>>>,
    },
    /// Shared strings, one handle per row.
    Str {
        /// Row payload.
        values: Arc<Vec<Arc<str>>>,
        /// `None` means all rows are valid.
        validity: Option<Arc<Vec<bool>>>,
    },
    /// Dictionary-encoded strings resolved against a shared table.
    StrDict {
        /// Dictionary slot per row.
        ids: Arc<Vec<StrId>>,
        /// Table the slots resolve against.
        table: Arc<StrTable>,
        /// `None` means all rows are valid.
        validity: Option<Arc<Vec<bool>>>,
    },
    /// Heterogeneous rows (lists, tuples, mixed kinds), boxed as values.
    Object(Arc<Vec<Value>>),
}

fn valid(validity: &Option<Arc<Vec<bool>>>, row: usize) -> bool {
    match validity {
        Some(mask) => mask.get(row).copied().unwrap_or(false),
        None => true,
    }
}

fn mask_has_nulls(validity: &Option<Arc<Vec<bool>>>) -> bool {
    validity
        .as_ref()
        .map(|mask| mask.iter().any(|v| !*v))
        .unwrap_or(false)
}

impl ValueColumn {
    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            ValueColumn::Int { values, .. } => values.len(),
            ValueColumn::Float { values, .. } => values.len(),
            ValueColumn::Bool { values, .. } => values.len(),
            ValueColumn::Timestamp { values, .. } => values.len(),
            ValueColumn::Str { values, .. } => values.len(),
            ValueColumn::StrDict { ids, .. } => ids.len(),
            ValueColumn::Object(values) => values.len(),
        }
    }

    /// Returns true when the column holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Declared kind, when the layout pins one (`None` for object columns).
    pub fn value_kind(&self) -> Option<ValueKind> {
        match self {
            ValueColumn::Int { .. } => Some(ValueKind::Int),
            ValueColumn::Float { .. } => Some(ValueKind::Float),
            ValueColumn::Bool { .. } => Some(ValueKind::Bool),
            ValueColumn::Timestamp { .. } => Some(ValueKind::Timestamp),
            ValueColumn::Str { .. } | ValueColumn::StrDict { .. } => Some(ValueKind::Str),
            ValueColumn::Object(_) => None,
        }
    }

    /// Value at a row; null rows yield [`Value::Null`].
    pub fn get(&self, row: usize) -> Value {
        if row >= self.len() {
            return Value::Null;
        }
        match self {
            ValueColumn::Int { values, validity } => {
                if valid(validity, row) {
                    Value::Int(values[row])
                } else {
                    Value::Null
                }
            }
            ValueColumn::Float { values, validity } => {
                if valid(validity, row) {
                    Value::Float(values[row])
                } else {
                    Value::Null
                }
            }
            ValueColumn::Bool { values, validity } => {
                if valid(validity, row) {
                    Value::Bool(values[row])
                } else {
                    Value::Null
                }
            }
            ValueColumn::Timestamp { values, validity } => {
                if valid(validity, row) {
                    Value::Timestamp(values[row])
                } else {
                    Value::Null
                }
            }
            ValueColumn::Str { values, validity } => {
                if valid(validity, row) {
                    Value::Str(Arc::clone(&values[row]))
                } else {
                    Value::Null
                }
            }
            ValueColumn::StrDict {
                ids,
                table,
                validity,
            } => {
                if valid(validity, row) {
                    table
                        .get(ids[row])
                        .map(|s| Value::Str(Arc::clone(s)))
                        .unwrap_or(Value::Null)
                } else {
                    Value::Null
                }
            }
            ValueColumn::Object(values) => values[row].clone(),
        }
    }

    /// Returns true when any row is null.
    pub fn has_nulls(&self) -> bool {
        match self {
            ValueColumn::Int { validity, .. }
            | ValueColumn::Float { validity, .. }
            | ValueColumn::Bool { validity, .. }
            | ValueColumn::Timestamp { validity, .. }
            | ValueColumn::Str { validity, .. }
            | ValueColumn::StrDict { validity, .. } => mask_has_nulls(validity),
            ValueColumn::Object(values) => values.iter().any(Value::is_null),
        }
    }

    /// Index-preserving copy to a new row set.
    pub fn shuffle(&self, offsets: &[usize]) -> ValueColumn {
        check_offsets(offsets, self.len());
        // Dictionary columns keep their encoding; everything else re-builds.
        if let ValueColumn::StrDict {
            ids,
            table,
            validity,
        } = self
        {
            let new_ids: Vec<StrId> = offsets.iter().map(|&o| ids[o]).collect();
            let new_validity = validity
                .as_ref()
                .map(|mask| Arc::new(offsets.iter().map(|&o| mask[o]).collect::<Vec<_>>()));
            return ValueColumn::StrDict {
                ids: Arc::new(new_ids),
                table: Arc::clone(table),
                validity: new_validity,
            };
        }
        let mut builder = ValueColumnBuilder::with_capacity(offsets.len());
        for &offset in offsets {
            builder.push(self.get(offset));
        }
        builder.finish()
    }

    /// As [`ValueColumn::shuffle`]; `None` offsets become null rows.
    pub fn shuffle_optional(&self, offsets: &[Option<usize>]) -> ValueColumn {
        check_optional_offsets(offsets, self.len());
        let mut builder = ValueColumnBuilder::with_capacity(offsets.len());
        for offset in offsets {
            match offset {
                Some(o) => builder.push(self.get(*o)),
                None => builder.push(Value::Null),
            }
        }
        builder.finish()
    }

    /// Concatenates two value columns (Union branch merge).
    pub fn union(&self, other: &ValueColumn) -> ValueColumn {
        let mut builder = ValueColumnBuilder::with_capacity(self.len() + other.len());
        for col in [self, other] {
            for row in 0..col.len() {
                builder.push(col.get(row));
            }
        }
        builder.finish()
    }
}

/// Accumulates values and freezes them into the tightest layout.
#[derive(Debug, Default)]
pub struct ValueColumnBuilder {
    rows: Vec<Value>,
    kind: Option<ValueKind>,
    uniform: bool,
    nulls: bool,
}

fn scalar_kind(value: &Value) -> Option<ValueKind> {
    match value {
        Value::Int(_) => Some(ValueKind::Int),
        Value::Float(_) => Some(ValueKind::Float),
        Value::Bool(_) => Some(ValueKind::Bool),
        Value::Timestamp(_) => Some(ValueKind::Timestamp),
        Value::Str(_) => Some(ValueKind::Str),
        _ => None,
    }
}

impl ValueColumnBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            kind: None,
            uniform: true,
            nulls: false,
        }
    }

    /// Creates an empty builder with row capacity reserved.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut builder = Self::new();
        builder.rows.reserve(capacity);
        builder
    }

    /// Appends one value; [`Value::Null`] marks a null row.
    pub fn push(&mut self, value: Value) {
        if value.is_null() {
            self.nulls = true;
        } else {
            match (scalar_kind(&value), self.kind) {
                (Some(kind), None) => self.kind = Some(kind),
                (Some(kind), Some(seen)) if kind == seen => {}
                _ => self.uniform = false,
            }
        }
        self.rows.push(value);
    }

    /// Rows accumulated so far.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when nothing has been pushed.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Freezes into a read-only column.
    pub fn finish(self) -> ValueColumn {
        let kind = if self.uniform { self.kind } else { None };
        let (rows, nulls) = (self.rows, self.nulls);
        match kind {
            Some(ValueKind::Int) => {
                let (values, validity) = typed_finish(rows, nulls, 0i64, |v| match v {
                    Value::Int(x) => x,
                    _ => unreachable!("non-int row in a uniform int column"),
                });
                ValueColumn::Int { values, validity }
            }
            Some(ValueKind::Float) => {
                let (values, validity) = typed_finish(rows, nulls, 0f64, |v| match v {
                    Value::Float(x) => x,
                    _ => unreachable!("non-float row in a uniform float column"),
                });
                ValueColumn::Float { values, validity }
            }
            Some(ValueKind::Bool) => {
                let (values, validity) = typed_finish(rows, nulls, false, |v| match v {
                    Value::Bool(x) => x,
                    _ => unreachable!("non-bool row in a uniform bool column"),
                });
                ValueColumn::Bool { values, validity }
            }
            Some(ValueKind::Timestamp) => {
                let (values, validity) = typed_finish(rows, nulls, 0i64, |v| match v {
                    Value::Timestamp(x) => x,
                    _ => unreachable!("non-timestamp row in a uniform timestamp column"),
                });
                ValueColumn::Timestamp { values, validity }
            }
            Some(ValueKind::Str) => {
                let (values, validity) =
                    typed_finish(rows, nulls, Arc::<str>::from(""), |v| match v {
                        Value::Str(x) => x,
                        _ => unreachable!("non-string row in a uniform string column"),
                    });
                ValueColumn::Str { values, validity }
            }
            _ => ValueColumn::Object(Arc::new(rows)),
        }
    }
}

/// Collects rows into a typed vector plus optional validity mask. Null rows
/// take the filler value and a false validity bit.
fn typed_finish<T: Clone>(
    rows: Vec<Value>,
    nulls: bool,
    null_filler: T,
    extract: impl Fn(Value) -> T,
) -> (Arc<Vec<T>>, Option<Arc<Vec<bool>>>) {
    let mut values = Vec::with_capacity(rows.len());
    let mut validity = nulls.then(|| Vec::with_capacity(rows.len()));
    for row in rows {
        if row.is_null() {
            values.push(null_filler.clone());
            if let Some(validity) = validity.as_mut() {
                validity.push(false);
            }
        } else {
            values.push(extract(row));
            if let Some(validity) = validity.as_mut() {
                validity.push(true);
            }
        }
    }
    (Arc::new(values), validity.map(Arc::new))
}

/// Accumulates dictionary slots for a string column finalized against a
/// shared table.
#[derive(Debug, Default)]
pub struct StrDictColumnBuilder {
    ids: Vec<StrId>,
    validity: Vec<bool>,
    nulls: bool,
}

impl StrDictColumnBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one dictionary slot.
    pub fn push(&mut self, id: StrId) {
        self.ids.push(id);
        self.validity.push(true);
    }

    /// Appends a null row.
    pub fn push_null(&mut self) {
        self.nulls = true;
        self.ids.push(StrId(0));
        self.validity.push(false);
    }

    /// Rows accumulated so far.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true when nothing has been pushed.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Freezes against the dictionary the slots refer to.
    pub fn finish(self, table: Arc<StrTable>) -> ValueColumn {
        ValueColumn::StrDict {
            ids: Arc::new(self.ids),
            table,
            validity: self.nulls.then(|| Arc::new(self.validity)),
        }
    }
}
