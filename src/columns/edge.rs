#![forbid(unsafe_code)]

//! Edge columns: single-direction, both-direction, and multi-relation
//! variants, mirroring the vertex column family.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::columns::{check_offsets, check_optional_offsets};
use crate::types::{Dir, LabelTriplet, VertexId};
use crate::value::{EdgeValue, Value};

/// Variant discriminator exposed for diagnostics and tests.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum EdgeColumnType {
    /// One relation, one traversal direction.
    Single,
    /// One symmetric relation traversed both ways; direction varies per row.
    Both,
    /// Heterogeneous relations (or null rows).
    Multi,
}

/// One edge record as stored in an edge column.
///
/// `src`/`dst` are the relation's canonical endpoints; `dir` records which
/// way the edge was traversed to reach it.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeElem {
    /// The edge relation.
    pub triplet: LabelTriplet,
    /// Canonical source endpoint.
    pub src: VertexId,
    /// Canonical destination endpoint.
    pub dst: VertexId,
    /// Traversal direction (`Out` or `In`, never `Both`).
    pub dir: Dir,
    /// Payload property value.
    pub data: Value,
}

impl EdgeElem {
    /// Endpoint the traversal started from.
    pub fn origin(&self) -> VertexId {
        match self.dir {
            Dir::In => self.dst,
            _ => self.src,
        }
    }

    /// Endpoint opposite the traversal origin.
    pub fn other(&self) -> VertexId {
        match self.dir {
            Dir::In => self.src,
            _ => self.dst,
        }
    }

    /// Converts into a runtime edge value.
    pub fn into_value(self) -> Value {
        Value::Edge(Box::new(EdgeValue {
            triplet: self.triplet,
            src: self.src,
            dst: self.dst,
            dir: self.dir,
            data: self.data,
        }))
    }
}

#[derive(Clone, Debug)]
struct SingleEdgeColumn {
    triplet: LabelTriplet,
    dir: Dir,
    rows: Arc<Vec<(VertexId, VertexId, Value)>>,
    /// `None` means all rows are valid.
    validity: Option<Arc<Vec<bool>>>,
}

#[derive(Clone, Debug)]
struct BothEdgeColumn {
    triplet: LabelTriplet,
    rows: Arc<Vec<(VertexId, VertexId, Value, Dir)>>,
}

#[derive(Clone, Debug)]
struct MultiEdgeColumn {
    rows: Arc<Vec<Option<EdgeElem>>>,
}

/// A column of edge records.
#[derive(Clone, Debug)]
pub struct EdgeColumn {
    repr: EdgeRepr,
}

#[derive(Clone, Debug)]
enum EdgeRepr {
    Single(SingleEdgeColumn),
    Both(BothEdgeColumn),
    Multi(MultiEdgeColumn),
}

impl EdgeColumn {
    /// Number of rows.
    pub fn len(&self) -> usize {
        match &self.repr {
            EdgeRepr::Single(col) => col.rows.len(),
            EdgeRepr::Both(col) => col.rows.len(),
            EdgeRepr::Multi(col) => col.rows.len(),
        }
    }

    /// Returns true when the column holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Variant discriminator.
    pub fn column_type(&self) -> EdgeColumnType {
        match &self.repr {
            EdgeRepr::Single(_) => EdgeColumnType::Single,
            EdgeRepr::Both(_) => EdgeColumnType::Both,
            EdgeRepr::Multi(_) => EdgeColumnType::Multi,
        }
    }

    /// Record at a row; `None` for null rows.
    pub fn get(&self, row: usize) -> Option<EdgeElem> {
        match &self.repr {
            EdgeRepr::Single(col) => {
                let (src, dst, data) = col.rows.get(row)?;
                match &col.validity {
                    Some(validity) if !validity[row] => None,
                    _ => Some(EdgeElem {
                        triplet: col.triplet,
                        src: *src,
                        dst: *dst,
                        dir: col.dir,
                        data: data.clone(),
                    }),
                }
            }
            EdgeRepr::Both(col) => {
                let (src, dst, data, dir) = col.rows.get(row)?;
                Some(EdgeElem {
                    triplet: col.triplet,
                    src: *src,
                    dst: *dst,
                    dir: *dir,
                    data: data.clone(),
                })
            }
            EdgeRepr::Multi(col) => col.rows.get(row)?.clone(),
        }
    }

    /// Distinct relations present among non-null rows.
    pub fn triplets(&self) -> SmallVec<[LabelTriplet; 2]> {
        match &self.repr {
            EdgeRepr::Single(col) => {
                if col.rows.is_empty() {
                    SmallVec::new()
                } else {
                    SmallVec::from_slice(&[col.triplet])
                }
            }
            EdgeRepr::Both(col) => {
                if col.rows.is_empty() {
                    SmallVec::new()
                } else {
                    SmallVec::from_slice(&[col.triplet])
                }
            }
            EdgeRepr::Multi(col) => {
                let mut triplets = SmallVec::new();
                for elem in col.rows.iter().flatten() {
                    if !triplets.contains(&elem.triplet) {
                        triplets.push(elem.triplet);
                    }
                }
                triplets
            }
        }
    }

    /// Returns true when any row is null.
    pub fn has_nulls(&self) -> bool {
        match &self.repr {
            EdgeRepr::Single(col) => col
                .validity
                .as_ref()
                .map(|validity| validity.iter().any(|v| !*v))
                .unwrap_or(false),
            EdgeRepr::Both(_) => false,
            EdgeRepr::Multi(col) => col.rows.iter().any(Option::is_none),
        }
    }

    /// Index-preserving copy to a new row set.
    pub fn shuffle(&self, offsets: &[usize]) -> EdgeColumn {
        check_offsets(offsets, self.len());
        let mut builder = EdgeColumnBuilder::with_capacity(offsets.len());
        for &offset in offsets {
            match self.get(offset) {
                Some(elem) => builder.push(elem),
                None => builder.push_null(),
            }
        }
        builder.finish()
    }

    /// As [`EdgeColumn::shuffle`]; `None` offsets become null rows.
    pub fn shuffle_optional(&self, offsets: &[Option<usize>]) -> EdgeColumn {
        check_optional_offsets(offsets, self.len());
        let mut builder = EdgeColumnBuilder::with_capacity(offsets.len());
        for offset in offsets {
            match offset.and_then(|o| self.get(o)) {
                Some(elem) => builder.push(elem),
                None => builder.push_null(),
            }
        }
        builder.finish()
    }

    /// Concatenates two edge columns (Union branch merge).
    pub fn union(&self, other: &EdgeColumn) -> EdgeColumn {
        let mut builder = EdgeColumnBuilder::with_capacity(self.len() + other.len());
        for col in [self, other] {
            for row in 0..col.len() {
                match col.get(row) {
                    Some(elem) => builder.push(elem),
                    None => builder.push_null(),
                }
            }
        }
        builder.finish()
    }
}

/// Accumulates edge records and freezes them into the densest variant.
#[derive(Debug, Default)]
pub struct EdgeColumnBuilder {
    rows: Vec<Option<EdgeElem>>,
    triplet: Option<LabelTriplet>,
    uniform_triplet: bool,
    dir: Option<Dir>,
    uniform_dir: bool,
    nulls: bool,
}

impl EdgeColumnBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            triplet: None,
            uniform_triplet: true,
            dir: None,
            uniform_dir: true,
            nulls: false,
        }
    }

    /// Creates an empty builder with row capacity reserved.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut builder = Self::new();
        builder.rows.reserve(capacity);
        builder
    }

    /// Appends one edge record.
    pub fn push(&mut self, elem: EdgeElem) {
        match self.triplet {
            None => self.triplet = Some(elem.triplet),
            Some(t) if t != elem.triplet => self.uniform_triplet = false,
            _ => {}
        }
        match self.dir {
            None => self.dir = Some(elem.dir),
            Some(d) if d != elem.dir => self.uniform_dir = false,
            _ => {}
        }
        self.rows.push(Some(elem));
    }

    /// Appends a null row.
    pub fn push_null(&mut self) {
        self.nulls = true;
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
    ///
    /// One relation and one direction yield the single variant (validity
    /// mask when nulls were pushed); one symmetric relation with mixed
    /// directions and no nulls yields the both variant; anything else is
    /// the multi variant.
    pub fn finish(self) -> EdgeColumn {
        let single_triplet = self.uniform_triplet.then_some(self.triplet).flatten();
        if let Some(triplet) = single_triplet {
            if self.uniform_dir {
                let dir = self.dir.unwrap_or(Dir::Out);
                let mut rows = Vec::with_capacity(self.rows.len());
                let mut validity = self.nulls.then(|| Vec::with_capacity(self.rows.len()));
                for row in self.rows {
                    match row {
                        Some(elem) => {
                            rows.push((elem.src, elem.dst, elem.data));
                            if let Some(validity) = validity.as_mut() {
                                validity.push(true);
                            }
                        }
                        None => {
                            rows.push((VertexId(0), VertexId(0), Value::Null));
                            if let Some(validity) = validity.as_mut() {
                                validity.push(false);
                            }
                        }
                    }
                }
                return EdgeColumn {
                    repr: EdgeRepr::Single(SingleEdgeColumn {
                        triplet,
                        dir,
                        rows: Arc::new(rows),
                        validity: validity.map(Arc::new),
                    }),
                };
            }
            if !self.nulls && triplet.is_symmetric() {
                let rows = self
                    .rows
                    .into_iter()
                    .flatten()
                    .map(|elem| (elem.src, elem.dst, elem.data, elem.dir))
                    .collect();
                return EdgeColumn {
                    repr: EdgeRepr::Both(BothEdgeColumn {
                        triplet,
                        rows: Arc::new(rows),
                    }),
                };
            }
        }
        EdgeColumn {
            repr: EdgeRepr::Multi(MultiEdgeColumn {
                rows: Arc::new(self.rows),
            }),
        }
    }
}
