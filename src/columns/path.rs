#![forbid(unsafe_code)]

//! Path columns backed by shared, immutable path backbones.
//!
//! A path record is a chain of [`PathNode`]s; extending a path allocates one
//! node pointing at the existing chain, so every partial path produced during
//! a traversal shares its prefix. Backbone segments are freed automatically
//! once no path column references them.

use std::sync::Arc;

use crate::columns::{check_offsets, check_optional_offsets};
use crate::types::{LabelId, VertexId};
use crate::value::Value;

/// One step in a shared path backbone.
#[derive(Debug)]
pub struct PathNode {
    label: LabelId,
    vid: VertexId,
    /// Steps in the chain ending here, including this one.
    depth: u32,
    prev: Option<Arc<PathNode>>,
}

impl PathNode {
    /// Starts a new backbone at a single vertex.
    pub fn root(label: LabelId, vid: VertexId) -> Arc<PathNode> {
        Arc::new(PathNode {
            label,
            vid,
            depth: 1,
            prev: None,
        })
    }

    /// Extends the chain by one step, sharing everything before it.
    pub fn extend(self: &Arc<Self>, label: LabelId, vid: VertexId) -> Arc<PathNode> {
        Arc::new(PathNode {
            label,
            vid,
            depth: self.depth + 1,
            prev: Some(Arc::clone(self)),
        })
    }

    /// Number of steps in the chain ending here.
    pub fn len(&self) -> usize {
        self.depth as usize
    }

    /// Paths always hold at least their origin step.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The step this node holds (the path's current endpoint).
    pub fn last(&self) -> (LabelId, VertexId) {
        (self.label, self.vid)
    }

    /// Returns true when the vertex already occurs anywhere on the chain.
    pub fn contains(&self, label: LabelId, vid: VertexId) -> bool {
        let mut node = Some(self);
        while let Some(n) = node {
            if n.label == label && n.vid == vid {
                return true;
            }
            node = n.prev.as_deref();
        }
        false
    }

    /// Copies the chain out as an ordered step sequence, origin first.
    pub fn materialize(&self) -> Vec<(LabelId, VertexId)> {
        let mut steps = Vec::with_capacity(self.depth as usize);
        let mut node = Some(self);
        while let Some(n) = node {
            steps.push((n.label, n.vid));
            node = n.prev.as_deref();
        }
        steps.reverse();
        steps
    }
}

/// A column of path records.
#[derive(Clone, Debug)]
pub struct PathColumn {
    rows: Arc<Vec<Option<Arc<PathNode>>>>,
}

impl PathColumn {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when the column holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Backbone handle at a row; `None` for null rows.
    pub fn node(&self, row: usize) -> Option<&Arc<PathNode>> {
        self.rows.get(row)?.as_ref()
    }

    /// Terminal step of the path at a row.
    pub fn end(&self, row: usize) -> Option<(LabelId, VertexId)> {
        self.node(row).map(|node| node.last())
    }

    /// Materialized path value at a row; null rows yield [`Value::Null`].
    pub fn value(&self, row: usize) -> Value {
        match self.node(row) {
            Some(node) => Value::Path(Arc::new(node.materialize())),
            None => Value::Null,
        }
    }

    /// Returns true when any row is null.
    pub fn has_nulls(&self) -> bool {
        self.rows.iter().any(Option::is_none)
    }

    /// Index-preserving copy to a new row set; backbones are shared, not
    /// copied.
    pub fn shuffle(&self, offsets: &[usize]) -> PathColumn {
        check_offsets(offsets, self.len());
        let rows = offsets.iter().map(|&o| self.rows[o].clone()).collect();
        PathColumn {
            rows: Arc::new(rows),
        }
    }

    /// As [`PathColumn::shuffle`]; `None` offsets become null rows.
    pub fn shuffle_optional(&self, offsets: &[Option<usize>]) -> PathColumn {
        check_optional_offsets(offsets, self.len());
        let rows = offsets
            .iter()
            .map(|offset| offset.and_then(|o| self.rows[o].clone()))
            .collect();
        PathColumn {
            rows: Arc::new(rows),
        }
    }

    /// Concatenates two path columns (Union branch merge).
    pub fn union(&self, other: &PathColumn) -> PathColumn {
        let mut rows = Vec::with_capacity(self.len() + other.len());
        rows.extend(self.rows.iter().cloned());
        rows.extend(other.rows.iter().cloned());
        PathColumn {
            rows: Arc::new(rows),
        }
    }
}

/// Accumulates path backbone handles into a column.
#[derive(Debug, Default)]
pub struct PathColumnBuilder {
    rows: Vec<Option<Arc<PathNode>>>,
}

impl PathColumnBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty builder with row capacity reserved.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
        }
    }

    /// Appends one path record.
    pub fn push(&mut self, node: Arc<PathNode>) {
        self.rows.push(Some(node));
    }

    /// Appends a null row.
    pub fn push_null(&mut self) {
        self.rows.push(None);
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
    pub fn finish(self) -> PathColumn {
        PathColumn {
            rows: Arc::new(self.rows),
        }
    }
}
