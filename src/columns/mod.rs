#![forbid(unsafe_code)]

//! The column family: typed, shareable containers holding one value per row.
//!
//! Every tag in an execution context binds one [`Column`]. Columns are
//! immutable once finished (builder pattern) and share their payload behind
//! `Arc`, so duplicating a context for a sub-plan is O(columns), not
//! O(rows). Cardinality changes go through [`Column::shuffle`] /
//! [`Column::shuffle_optional`] with per-output-row offsets into the prior
//! row set; shuffling is index-preserving copy, never reordering by value.

pub mod edge;
pub mod path;
pub mod value;
pub mod vertex;

pub use edge::{EdgeColumn, EdgeColumnBuilder, EdgeColumnType, EdgeElem};
pub use path::{PathColumn, PathColumnBuilder, PathNode};
pub use value::{StrDictColumnBuilder, ValueColumn, ValueColumnBuilder};
pub use vertex::{SegmentedVertexColumn, VertexColumn, VertexColumnBuilder, VertexColumnType};

use crate::types::{Result, SendaError};
use crate::value::Value;

/// Coarse column capability, the granularity at which branch schemas must
/// agree (Union build-time check).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ColumnKind {
    /// Vertex records.
    Vertex,
    /// Edge records.
    Edge,
    /// Path records.
    Path,
    /// Scalar / list / tuple values.
    Value,
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ColumnKind::Vertex => "vertex",
            ColumnKind::Edge => "edge",
            ColumnKind::Path => "path",
            ColumnKind::Value => "value",
        };
        write!(f, "{name}")
    }
}

/// One context column: a closed sum over the four capability families.
#[derive(Clone, Debug)]
pub enum Column {
    /// Vertex records, one per row.
    Vertex(VertexColumn),
    /// Edge records, one per row.
    Edge(EdgeColumn),
    /// Path records, one per row.
    Path(PathColumn),
    /// Scalar / list / tuple values, one per row.
    Value(ValueColumn),
}

impl Column {
    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            Column::Vertex(col) => col.len(),
            Column::Edge(col) => col.len(),
            Column::Path(col) => col.len(),
            Column::Value(col) => col.len(),
        }
    }

    /// Returns true when the column holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capability family of the column.
    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Vertex(_) => ColumnKind::Vertex,
            Column::Edge(_) => ColumnKind::Edge,
            Column::Path(_) => ColumnKind::Path,
            Column::Value(_) => ColumnKind::Value,
        }
    }

    /// Element at a row, as a runtime value; null rows yield [`Value::Null`].
    pub fn get(&self, row: usize) -> Value {
        match self {
            Column::Vertex(col) => col
                .get(row)
                .map(|(label, vid)| Value::Vertex { label, vid })
                .unwrap_or(Value::Null),
            Column::Edge(col) => col
                .get(row)
                .map(|elem| elem.into_value())
                .unwrap_or(Value::Null),
            Column::Path(col) => col.value(row),
            Column::Value(col) => col.get(row),
        }
    }

    /// Returns true when any row is null (the column is optional in effect).
    pub fn has_nulls(&self) -> bool {
        match self {
            Column::Vertex(col) => col.has_nulls(),
            Column::Edge(col) => col.has_nulls(),
            Column::Path(col) => col.has_nulls(),
            Column::Value(col) => col.has_nulls(),
        }
    }

    /// Index-preserving copy to a new row set.
    ///
    /// `offsets[i]` names the input row output row `i` derives from. Every
    /// offset must be in range; a violation is a programming-contract error
    /// and panics rather than being silently tolerated.
    pub fn shuffle(&self, offsets: &[usize]) -> Column {
        match self {
            Column::Vertex(col) => Column::Vertex(col.shuffle(offsets)),
            Column::Edge(col) => Column::Edge(col.shuffle(offsets)),
            Column::Path(col) => Column::Path(col.shuffle(offsets)),
            Column::Value(col) => Column::Value(col.shuffle(offsets)),
        }
    }

    /// As [`Column::shuffle`], but a `None` offset materializes a null row
    /// (optional expansion, left-outer join).
    pub fn shuffle_optional(&self, offsets: &[Option<usize>]) -> Column {
        match self {
            Column::Vertex(col) => Column::Vertex(col.shuffle_optional(offsets)),
            Column::Edge(col) => Column::Edge(col.shuffle_optional(offsets)),
            Column::Path(col) => Column::Path(col.shuffle_optional(offsets)),
            Column::Value(col) => Column::Value(col.shuffle_optional(offsets)),
        }
    }

    /// Concatenates two same-family columns (Union branch merge).
    ///
    /// The branch schemas were checked at build time; a family mismatch here
    /// means that check was evaded and is an internal error.
    pub fn union_col(&self, other: &Column) -> Result<Column> {
        match (self, other) {
            (Column::Vertex(a), Column::Vertex(b)) => Ok(Column::Vertex(a.union(b))),
            (Column::Edge(a), Column::Edge(b)) => Ok(Column::Edge(a.union(b))),
            (Column::Path(a), Column::Path(b)) => Ok(Column::Path(a.union(b))),
            (Column::Value(a), Column::Value(b)) => Ok(Column::Value(a.union(b))),
            (a, b) => Err(SendaError::internal(format!(
                "cannot union a {} column with a {} column",
                a.kind(),
                b.kind()
            ))),
        }
    }
}

pub(crate) fn check_offsets(offsets: &[usize], len: usize) {
    for &offset in offsets {
        assert!(
            offset < len,
            "shuffle offset {offset} out of range for a column of {len} rows"
        );
    }
}

pub(crate) fn check_optional_offsets(offsets: &[Option<usize>], len: usize) {
    for offset in offsets.iter().flatten() {
        assert!(
            *offset < len,
            "shuffle offset {offset} out of range for a column of {len} rows"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LabelId, VertexId};

    fn vertex_col(label: u32, ids: &[u64]) -> Column {
        let mut builder = VertexColumnBuilder::new();
        for id in ids {
            builder.push(LabelId(label), VertexId(*id));
        }
        Column::Vertex(builder.finish())
    }

    #[test]
    fn shuffle_preserves_indexed_elements() {
        let col = vertex_col(1, &[10, 20, 30]);
        let shuffled = col.shuffle(&[2, 0, 0, 1]);
        assert_eq!(shuffled.len(), 4);
        assert_eq!(
            shuffled.get(0),
            Value::Vertex {
                label: LabelId(1),
                vid: VertexId(30)
            }
        );
        assert_eq!(shuffled.get(1), col.get(0));
        assert_eq!(shuffled.get(2), col.get(0));
        assert_eq!(shuffled.get(3), col.get(1));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_shuffle_fails_fast() {
        let col = vertex_col(1, &[10]);
        let _ = col.shuffle(&[1]);
    }

    #[test]
    fn optional_shuffle_materializes_nulls() {
        let col = vertex_col(1, &[10, 20]);
        let shuffled = col.shuffle_optional(&[Some(1), None, Some(0)]);
        assert_eq!(shuffled.len(), 3);
        assert!(shuffled.has_nulls());
        assert_eq!(shuffled.get(1), Value::Null);
        assert_eq!(shuffled.get(2), col.get(0));
    }

    #[test]
    fn union_rejects_family_mismatch() {
        let vertices = vertex_col(1, &[1]);
        let mut values = ValueColumnBuilder::new();
        values.push(Value::Int(1));
        let values = Column::Value(values.finish());
        assert!(vertices.union_col(&values).is_err());
        assert_eq!(vertices.union_col(&vertices).unwrap().len(), 2);
    }
}
