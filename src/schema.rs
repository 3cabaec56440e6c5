#![forbid(unsafe_code)]

//! Graph schema: vertex labels, edge relations, and name↔id resolution.
//!
//! The schema is owned by the graph collaborator and consumed read-only by
//! the runtime: operator builders resolve label and property names to ids
//! once, at build time, so evaluation never touches strings.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::types::{LabelId, LabelTriplet, Result, SendaError, TypeId};
use crate::value::ValueKind;

/// One named, typed property slot on a vertex label or edge relation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    /// Property name, unique within its label.
    pub name: String,
    /// Declared value kind.
    pub kind: ValueKind,
}

/// Vertex label declaration in a schema document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VertexLabelDoc {
    /// Label name, unique within the schema.
    pub label: String,
    /// Ordered property declarations.
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
}

/// Edge relation declaration in a schema document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeRelationDoc {
    /// Source vertex label name.
    pub src: String,
    /// Destination vertex label name.
    pub dst: String,
    /// Edge type name; several relations may share one name.
    pub label: String,
    /// Optional single payload property carried by each edge.
    #[serde(default)]
    pub payload: Option<PropertyDef>,
}

/// Serde-facing schema document, as read from fixtures and loaders.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchemaDoc {
    /// Vertex label declarations; position assigns the [`LabelId`].
    pub vertices: Vec<VertexLabelDoc>,
    /// Edge relation declarations.
    #[serde(default)]
    pub edges: Vec<EdgeRelationDoc>,
}

#[derive(Debug)]
struct VertexLabelMeta {
    name: String,
    properties: Vec<PropertyDef>,
    property_index: FxHashMap<String, usize>,
}

#[derive(Debug)]
struct EdgeRelationMeta {
    triplet: LabelTriplet,
    payload: Option<PropertyDef>,
}

/// Compiled schema with id-based lookup both ways.
#[derive(Debug)]
pub struct GraphSchema {
    vertex_labels: Vec<VertexLabelMeta>,
    vertex_index: FxHashMap<String, LabelId>,
    edge_types: Vec<String>,
    edge_type_index: FxHashMap<String, TypeId>,
    relations: Vec<EdgeRelationMeta>,
    triplet_index: FxHashMap<LabelTriplet, usize>,
}

impl GraphSchema {
    /// Compiles a schema document, assigning dense label and type ids.
    pub fn from_doc(doc: SchemaDoc) -> Result<Self> {
        let mut vertex_labels = Vec::with_capacity(doc.vertices.len());
        let mut vertex_index = FxHashMap::default();
        for (pos, vertex) in doc.vertices.into_iter().enumerate() {
            let label = LabelId(pos as u32);
            if vertex_index.insert(vertex.label.clone(), label).is_some() {
                return Err(SendaError::bad_request(format!(
                    "duplicate vertex label '{}'",
                    vertex.label
                )));
            }
            let mut property_index = FxHashMap::default();
            for (slot, prop) in vertex.properties.iter().enumerate() {
                if property_index.insert(prop.name.clone(), slot).is_some() {
                    return Err(SendaError::bad_request(format!(
                        "duplicate property '{}' on vertex label '{}'",
                        prop.name, vertex.label
                    )));
                }
            }
            vertex_labels.push(VertexLabelMeta {
                name: vertex.label,
                properties: vertex.properties,
                property_index,
            });
        }

        let mut edge_types = Vec::new();
        let mut edge_type_index: FxHashMap<String, TypeId> = FxHashMap::default();
        let mut relations = Vec::with_capacity(doc.edges.len());
        let mut triplet_index = FxHashMap::default();
        for edge in doc.edges {
            let src = *vertex_index.get(&edge.src).ok_or_else(|| {
                SendaError::bad_request(format!("edge relation names unknown label '{}'", edge.src))
            })?;
            let dst = *vertex_index.get(&edge.dst).ok_or_else(|| {
                SendaError::bad_request(format!("edge relation names unknown label '{}'", edge.dst))
            })?;
            let edge_type = match edge_type_index.get(&edge.label) {
                Some(ty) => *ty,
                None => {
                    let ty = TypeId(edge_types.len() as u32);
                    edge_types.push(edge.label.clone());
                    edge_type_index.insert(edge.label.clone(), ty);
                    ty
                }
            };
            let triplet = LabelTriplet::new(src, dst, edge_type);
            if triplet_index.insert(triplet, relations.len()).is_some() {
                return Err(SendaError::bad_request(format!(
                    "duplicate edge relation {}-[{}]->{}",
                    edge.src, edge.label, edge.dst
                )));
            }
            relations.push(EdgeRelationMeta {
                triplet,
                payload: edge.payload,
            });
        }

        Ok(Self {
            vertex_labels,
            vertex_index,
            edge_types,
            edge_type_index,
            relations,
            triplet_index,
        })
    }

    /// Parses a JSON schema document.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let doc: SchemaDoc = serde_json::from_slice(bytes)
            .map_err(|err| SendaError::bad_request(format!("malformed schema document: {err}")))?;
        Self::from_doc(doc)
    }

    /// Number of declared vertex labels.
    pub fn vertex_label_count(&self) -> usize {
        self.vertex_labels.len()
    }

    /// Resolves a vertex label name.
    pub fn vertex_label(&self, name: &str) -> Option<LabelId> {
        self.vertex_index.get(name).copied()
    }

    /// Name of a vertex label id.
    pub fn vertex_label_name(&self, label: LabelId) -> Option<&str> {
        self.vertex_labels
            .get(label.0 as usize)
            .map(|meta| meta.name.as_str())
    }

    /// Ordered property declarations of a vertex label.
    pub fn vertex_properties(&self, label: LabelId) -> &[PropertyDef] {
        self.vertex_labels
            .get(label.0 as usize)
            .map(|meta| meta.properties.as_slice())
            .unwrap_or(&[])
    }

    /// Resolves a property name on a vertex label to (slot, kind).
    pub fn vertex_property(&self, label: LabelId, name: &str) -> Option<(usize, ValueKind)> {
        let meta = self.vertex_labels.get(label.0 as usize)?;
        let slot = *meta.property_index.get(name)?;
        Some((slot, meta.properties[slot].kind))
    }

    /// Resolves an edge type name.
    pub fn edge_type(&self, name: &str) -> Option<TypeId> {
        self.edge_type_index.get(name).copied()
    }

    /// Name of an edge type id.
    pub fn edge_type_name(&self, edge_type: TypeId) -> Option<&str> {
        self.edge_types.get(edge_type.0 as usize).map(String::as_str)
    }

    /// Resolves a (src, dst, edge) name triple to a declared triplet.
    pub fn resolve_triplet(&self, src: &str, dst: &str, edge: &str) -> Result<LabelTriplet> {
        let src_label = self
            .vertex_label(src)
            .ok_or_else(|| SendaError::bad_request(format!("unknown vertex label '{src}'")))?;
        let dst_label = self
            .vertex_label(dst)
            .ok_or_else(|| SendaError::bad_request(format!("unknown vertex label '{dst}'")))?;
        let edge_type = self
            .edge_type(edge)
            .ok_or_else(|| SendaError::bad_request(format!("unknown edge type '{edge}'")))?;
        let triplet = LabelTriplet::new(src_label, dst_label, edge_type);
        if !self.triplet_exists(triplet) {
            return Err(SendaError::bad_request(format!(
                "no edge relation {src}-[{edge}]->{dst}"
            )));
        }
        Ok(triplet)
    }

    /// Returns true when the triplet is declared by the schema.
    pub fn triplet_exists(&self, triplet: LabelTriplet) -> bool {
        self.triplet_index.contains_key(&triplet)
    }

    /// Payload property of a declared triplet, if it carries one.
    pub fn triplet_payload(&self, triplet: LabelTriplet) -> Option<&PropertyDef> {
        let pos = *self.triplet_index.get(&triplet)?;
        self.relations[pos].payload.as_ref()
    }

    /// All declared triplets, in declaration order.
    pub fn triplets(&self) -> impl Iterator<Item = LabelTriplet> + '_ {
        self.relations.iter().map(|relation| relation.triplet)
    }
}
