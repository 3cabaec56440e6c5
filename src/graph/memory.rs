#![forbid(unsafe_code)]

//! Reference in-memory graph store.
//!
//! Label-partitioned vertex sets with dense internal ids, per-triplet
//! forward/reverse adjacency, and typed columnar property storage. This is a
//! test and demo collaborator, not a persistence layer: it implements the
//! same read/insert surface the runtime expects from the external store.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::graph::{EdgeIter, EdgeRef, MutGraph, PropertyColumn, ReadGraph};
use crate::schema::GraphSchema;
use crate::types::{LabelId, LabelTriplet, Result, SendaError, StrId, VertexId};
use crate::value::{StrTable, StrTableBuilder, Value, ValueKind};

enum PropData {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Bool(Vec<bool>),
    Timestamp(Vec<i64>),
    Str(Vec<StrId>),
}

impl PropData {
    fn new(kind: ValueKind) -> Result<Self> {
        match kind {
            ValueKind::Int => Ok(PropData::Int(Vec::new())),
            ValueKind::Float => Ok(PropData::Float(Vec::new())),
            ValueKind::Bool => Ok(PropData::Bool(Vec::new())),
            ValueKind::Timestamp => Ok(PropData::Timestamp(Vec::new())),
            ValueKind::Str => Ok(PropData::Str(Vec::new())),
            ValueKind::List | ValueKind::Tuple => Err(SendaError::unsupported(
                "list/tuple vertex properties are not storable",
            )),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (PropData::Int(_), Value::Int(_))
                | (PropData::Float(_), Value::Float(_))
                | (PropData::Bool(_), Value::Bool(_))
                | (PropData::Timestamp(_), Value::Timestamp(_))
                | (PropData::Str(_), Value::Str(_))
        )
    }

    fn push(&mut self, value: Value, strings: &mut StrTableBuilder) -> Result<()> {
        match (self, value) {
            (PropData::Int(col), Value::Int(v)) => col.push(v),
            (PropData::Float(col), Value::Float(v)) => col.push(v),
            (PropData::Bool(col), Value::Bool(v)) => col.push(v),
            (PropData::Timestamp(col), Value::Timestamp(v)) => col.push(v),
            (PropData::Str(col), Value::Str(v)) => col.push(strings.intern(&v)),
            (_, other) => {
                return Err(SendaError::bad_request(format!(
                    "property value {other} does not match the declared kind"
                )))
            }
        }
        Ok(())
    }

    fn set(&mut self, idx: usize, value: Value, strings: &mut StrTableBuilder) -> Result<()> {
        match (self, value) {
            (PropData::Int(col), Value::Int(v)) => col[idx] = v,
            (PropData::Float(col), Value::Float(v)) => col[idx] = v,
            (PropData::Bool(col), Value::Bool(v)) => col[idx] = v,
            (PropData::Timestamp(col), Value::Timestamp(v)) => col[idx] = v,
            (PropData::Str(col), Value::Str(v)) => col[idx] = strings.intern(&v),
            (_, other) => {
                return Err(SendaError::bad_request(format!(
                    "property value {other} does not match the declared kind"
                )))
            }
        }
        Ok(())
    }
}

struct VertexStore {
    originals: Vec<i64>,
    original_index: FxHashMap<i64, VertexId>,
    props: Vec<PropData>,
}

struct TripletStore {
    /// Out-adjacency, indexed by source internal id: (dst, payload slot).
    fwd: Vec<Vec<(VertexId, u32)>>,
    /// In-adjacency, indexed by destination internal id: (src, payload slot).
    rev: Vec<Vec<(VertexId, u32)>>,
    payloads: Vec<Value>,
}

impl TripletStore {
    fn new() -> Self {
        Self {
            fwd: Vec::new(),
            rev: Vec::new(),
            payloads: Vec::new(),
        }
    }
}

/// In-memory property graph implementing [`ReadGraph`] and [`MutGraph`].
pub struct MemoryGraph {
    schema: GraphSchema,
    vertices: Vec<VertexStore>,
    relations: FxHashMap<LabelTriplet, TripletStore>,
    strings: StrTableBuilder,
    // Rebuilt lazily on read; cleared whenever a write interns a string.
    table_cache: RwLock<Option<Arc<StrTable>>>,
}

impl MemoryGraph {
    /// Creates an empty graph over a compiled schema.
    pub fn new(schema: GraphSchema) -> Result<Self> {
        let mut vertices = Vec::with_capacity(schema.vertex_label_count());
        for pos in 0..schema.vertex_label_count() {
            let label = LabelId(pos as u32);
            let mut props = Vec::new();
            for def in schema.vertex_properties(label) {
                props.push(PropData::new(def.kind)?);
            }
            vertices.push(VertexStore {
                originals: Vec::new(),
                original_index: FxHashMap::default(),
                props,
            });
        }
        let relations = schema
            .triplets()
            .map(|triplet| (triplet, TripletStore::new()))
            .collect();
        Ok(Self {
            schema,
            vertices,
            relations,
            strings: StrTableBuilder::new(),
            table_cache: RwLock::new(None),
        })
    }

    fn store(&self, label: LabelId) -> Option<&VertexStore> {
        self.vertices.get(label.0 as usize)
    }

    fn edge_iter<'a>(
        &'a self,
        store: Option<&'a TripletStore>,
        vertex: VertexId,
        forward: bool,
    ) -> EdgeIter<'a> {
        let Some(store) = store else {
            return Box::new(std::iter::empty());
        };
        let adjacency = if forward { &store.fwd } else { &store.rev };
        let Some(slots) = adjacency.get(vertex.0 as usize) else {
            return Box::new(std::iter::empty());
        };
        Box::new(slots.iter().map(move |(other, payload)| {
            let (src, dst) = if forward {
                (vertex, *other)
            } else {
                (*other, vertex)
            };
            EdgeRef {
                src,
                dst,
                data: store.payloads[*payload as usize].clone(),
            }
        }))
    }
}

impl ReadGraph for MemoryGraph {
    fn schema(&self) -> &GraphSchema {
        &self.schema
    }

    fn vertex_count(&self, label: LabelId) -> usize {
        self.store(label).map(|s| s.originals.len()).unwrap_or(0)
    }

    fn out_edges<'a>(&'a self, triplet: LabelTriplet, src: VertexId) -> EdgeIter<'a> {
        self.edge_iter(self.relations.get(&triplet), src, true)
    }

    fn in_edges<'a>(&'a self, triplet: LabelTriplet, dst: VertexId) -> EdgeIter<'a> {
        self.edge_iter(self.relations.get(&triplet), dst, false)
    }

    fn property_column(&self, label: LabelId, name: &str) -> Option<PropertyColumn> {
        let (slot, _) = self.schema.vertex_property(label, name)?;
        let store = self.store(label)?;
        Some(match &store.props[slot] {
            PropData::Int(col) => PropertyColumn::Int(Arc::new(col.clone())),
            PropData::Float(col) => PropertyColumn::Float(Arc::new(col.clone())),
            PropData::Bool(col) => PropertyColumn::Bool(Arc::new(col.clone())),
            PropData::Timestamp(col) => PropertyColumn::Timestamp(Arc::new(col.clone())),
            PropData::Str(col) => PropertyColumn::Str {
                ids: Arc::new(col.clone()),
                table: self.str_table(),
            },
        })
    }

    fn original_id(&self, label: LabelId, vid: VertexId) -> Option<i64> {
        self.store(label)?.originals.get(vid.0 as usize).copied()
    }

    fn resolve_original(&self, label: LabelId, original: i64) -> Option<VertexId> {
        self.store(label)?.original_index.get(&original).copied()
    }

    fn str_table(&self) -> Arc<StrTable> {
        if let Some(table) = self.table_cache.read().as_ref() {
            return Arc::clone(table);
        }
        let mut cache = self.table_cache.write();
        // Double-checked: another reader may have filled it meanwhile.
        if let Some(table) = cache.as_ref() {
            return Arc::clone(table);
        }
        let table = self.strings.snapshot();
        *cache = Some(Arc::clone(&table));
        table
    }
}

impl MutGraph for MemoryGraph {
    fn insert_vertex(
        &mut self,
        label: LabelId,
        original: i64,
        properties: Vec<Value>,
    ) -> Result<VertexId> {
        let declared = self.schema.vertex_properties(label).len();
        if properties.len() != declared {
            return Err(SendaError::bad_request(format!(
                "vertex under label {label} expects {declared} properties, got {}",
                properties.len()
            )));
        }
        let store = self
            .vertices
            .get_mut(label.0 as usize)
            .ok_or_else(|| SendaError::bad_request(format!("unknown vertex label id {label}")))?;
        if store.original_index.contains_key(&original) {
            return Err(SendaError::bad_request(format!(
                "duplicate original id {original} under label {label}"
            )));
        }
        // Every property kind is checked before anything is committed so a
        // rejected insert leaves no partial vertex behind.
        for (slot, value) in properties.iter().enumerate() {
            if !store.props[slot].accepts(value) {
                return Err(SendaError::bad_request(format!(
                    "property value {value} does not match the declared kind"
                )));
            }
        }
        let vid = VertexId(store.originals.len() as u64);
        store.originals.push(original);
        store.original_index.insert(original, vid);
        for (slot, value) in properties.into_iter().enumerate() {
            store.props[slot].push(value, &mut self.strings)?;
        }
        *self.table_cache.write() = None;
        Ok(vid)
    }

    fn insert_edge(
        &mut self,
        triplet: LabelTriplet,
        src: VertexId,
        dst: VertexId,
        data: Value,
    ) -> Result<()> {
        let src_count = self.vertex_count(triplet.src_label);
        let dst_count = self.vertex_count(triplet.dst_label);
        if src.0 as usize >= src_count || dst.0 as usize >= dst_count {
            return Err(SendaError::bad_request(format!(
                "edge endpoint out of range: {src} -> {dst}"
            )));
        }
        let store = self.relations.get_mut(&triplet).ok_or_else(|| {
            SendaError::bad_request("edge triplet is not declared by the schema")
        })?;
        if store.fwd.len() < src_count {
            store.fwd.resize_with(src_count, Vec::new);
        }
        if store.rev.len() < dst_count {
            store.rev.resize_with(dst_count, Vec::new);
        }
        let payload = store.payloads.len() as u32;
        store.payloads.push(data);
        store.fwd[src.0 as usize].push((dst, payload));
        store.rev[dst.0 as usize].push((src, payload));
        Ok(())
    }

    fn update_vertex_property(
        &mut self,
        label: LabelId,
        vid: VertexId,
        property: &str,
        value: Value,
    ) -> Result<()> {
        let (slot, _) = self.schema.vertex_property(label, property).ok_or_else(|| {
            SendaError::bad_request(format!("unknown property '{property}' on label {label}"))
        })?;
        let store = self
            .vertices
            .get_mut(label.0 as usize)
            .ok_or_else(|| SendaError::bad_request(format!("unknown vertex label id {label}")))?;
        if vid.0 as usize >= store.originals.len() {
            return Err(SendaError::bad_request(format!(
                "vertex {vid} out of range under label {label}"
            )));
        }
        store.props[slot].set(vid.0 as usize, value, &mut self.strings)?;
        *self.table_cache.write() = None;
        Ok(())
    }
}
