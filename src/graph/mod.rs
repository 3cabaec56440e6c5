#![forbid(unsafe_code)]

//! The graph interface consumed by the runtime.
//!
//! Adjacency storage is an external collaborator: operators see only the
//! [`ReadGraph`] surface (schema lookup, directed edge iteration per label
//! triplet, columnar vertex properties, original-id resolution) and write
//! pipelines see [`MutGraph`]. The crate ships one reference implementation,
//! [`memory::MemoryGraph`], so the engine is testable without a store.

pub mod loader;
pub mod memory;

use std::sync::Arc;

use crate::schema::GraphSchema;
use crate::types::{LabelId, LabelTriplet, Result, StrId, VertexId};
use crate::value::{StrTable, Value, ValueKind};

pub use memory::MemoryGraph;

/// One edge yielded by adjacency iteration.
///
/// `src`/`dst` are the canonical endpoints of the relation; the traversal
/// direction is known to the caller, not stored here.
#[derive(Clone, Debug)]
pub struct EdgeRef {
    /// Source endpoint, internal id under the triplet's source label.
    pub src: VertexId,
    /// Destination endpoint, internal id under the triplet's destination label.
    pub dst: VertexId,
    /// Payload property value; [`Value::Null`] when the relation carries none.
    pub data: Value,
}

/// Boxed adjacency iterator returned by the read interface.
pub type EdgeIter<'a> = Box<dyn Iterator<Item = EdgeRef> + 'a>;

/// One frozen, shareable vertex property column.
///
/// Indexed by internal vertex id within the owning label. Cloning is O(1);
/// the payload vectors are shared.
#[derive(Clone, Debug)]
pub enum PropertyColumn {
    /// 64-bit integers.
    Int(Arc<Vec<i64>>),
    /// 64-bit floats.
    Float(Arc<Vec<f64>>),
    /// Booleans.
    Bool(Arc<Vec<bool>>),
    /// Opaque millisecond timestamps.
    Timestamp(Arc<Vec<i64>>),
    /// Dictionary-encoded strings plus the table resolving them.
    Str {
        /// Dictionary slot per vertex.
        ids: Arc<Vec<StrId>>,
        /// Table the slots resolve against.
        table: Arc<StrTable>,
    },
}

impl PropertyColumn {
    /// Number of rows (vertices of the owning label at freeze time).
    pub fn len(&self) -> usize {
        match self {
            PropertyColumn::Int(v) => v.len(),
            PropertyColumn::Float(v) => v.len(),
            PropertyColumn::Bool(v) => v.len(),
            PropertyColumn::Timestamp(v) => v.len(),
            PropertyColumn::Str { ids, .. } => ids.len(),
        }
    }

    /// Returns true when the column holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Declared kind of the column.
    pub fn kind(&self) -> ValueKind {
        match self {
            PropertyColumn::Int(_) => ValueKind::Int,
            PropertyColumn::Float(_) => ValueKind::Float,
            PropertyColumn::Bool(_) => ValueKind::Bool,
            PropertyColumn::Timestamp(_) => ValueKind::Timestamp,
            PropertyColumn::Str { .. } => ValueKind::Str,
        }
    }

    /// Value at an internal vertex id; [`Value::Null`] when out of range.
    pub fn get(&self, vid: VertexId) -> Value {
        let idx = vid.0 as usize;
        match self {
            PropertyColumn::Int(v) => v.get(idx).map(|x| Value::Int(*x)).unwrap_or(Value::Null),
            PropertyColumn::Float(v) => v.get(idx).map(|x| Value::Float(*x)).unwrap_or(Value::Null),
            PropertyColumn::Bool(v) => v.get(idx).map(|x| Value::Bool(*x)).unwrap_or(Value::Null),
            PropertyColumn::Timestamp(v) => v
                .get(idx)
                .map(|x| Value::Timestamp(*x))
                .unwrap_or(Value::Null),
            PropertyColumn::Str { ids, table } => ids
                .get(idx)
                .and_then(|id| table.get(*id))
                .map(|s| Value::Str(Arc::clone(s)))
                .unwrap_or(Value::Null),
        }
    }
}

/// Read surface of the graph collaborator.
///
/// A pipeline holds one `&dyn ReadGraph` for its whole execution and expects
/// it to behave as a single consistent snapshot; versioning and writer
/// serialization live behind this trait, not in the runtime.
pub trait ReadGraph: Send + Sync {
    /// The graph's schema.
    fn schema(&self) -> &GraphSchema;

    /// Number of vertices stored under a label; internal ids are dense in
    /// `0..vertex_count(label)`.
    fn vertex_count(&self, label: LabelId) -> usize;

    /// Outgoing edges of `src` under one declared triplet.
    ///
    /// An undeclared triplet or out-of-range vertex yields an empty iterator.
    fn out_edges<'a>(&'a self, triplet: LabelTriplet, src: VertexId) -> EdgeIter<'a>;

    /// Incoming edges of `dst` under one declared triplet.
    fn in_edges<'a>(&'a self, triplet: LabelTriplet, dst: VertexId) -> EdgeIter<'a>;

    /// Frozen property column of a vertex label, by property name.
    fn property_column(&self, label: LabelId, name: &str) -> Option<PropertyColumn>;

    /// Original (external) id of a vertex, for result encoding.
    fn original_id(&self, label: LabelId, vid: VertexId) -> Option<i64>;

    /// Point lookup of an internal id by original id, for index scans.
    fn resolve_original(&self, label: LabelId, original: i64) -> Option<VertexId>;

    /// Snapshot of the string dictionary backing string-typed properties.
    fn str_table(&self) -> Arc<StrTable>;
}

/// Insert/update surface used by write pipelines and loaders.
///
/// Methods take `&mut self`: Rust's aliasing rules serialize writers, and
/// readers holding `&self` observe a quiescent graph, matching the
/// one-writer/many-readers contract of the external store.
pub trait MutGraph: ReadGraph {
    /// Inserts a vertex under `label` with its original id and one value per
    /// declared property, in schema order.
    fn insert_vertex(
        &mut self,
        label: LabelId,
        original: i64,
        properties: Vec<Value>,
    ) -> Result<VertexId>;

    /// Inserts an edge under a declared triplet, with its payload value
    /// ([`Value::Null`] when the relation carries none).
    fn insert_edge(
        &mut self,
        triplet: LabelTriplet,
        src: VertexId,
        dst: VertexId,
        data: Value,
    ) -> Result<()>;

    /// Overwrites one property of an existing vertex.
    fn update_vertex_property(
        &mut self,
        label: LabelId,
        vid: VertexId,
        property: &str,
        value: Value,
    ) -> Result<()>;
}
