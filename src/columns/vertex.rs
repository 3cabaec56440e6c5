#![forbid(unsafe_code)]

//! Vertex columns: single-label, multi-label, and label-segmented variants.
//!
//! The variant is chosen by whichever operator produced the column (a scan
//! over several labels builds segments, an expansion landing on one label
//! builds the dense single-label form), but consumers only see the shared
//! capability surface of [`VertexColumn`].

use std::sync::Arc;

use smallvec::SmallVec;

use crate::columns::{check_offsets, check_optional_offsets};
use crate::types::{LabelId, VertexId};

/// Small inline set of distinct labels, used for expansion pruning.
pub type LabelSet = SmallVec<[LabelId; 4]>;

/// Variant discriminator exposed for diagnostics and tests.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum VertexColumnType {
    /// All rows share one label; ids stored densely.
    Single,
    /// Heterogeneous labels (or null rows), one record per row.
    Multi,
    /// Label-partitioned runs, one per scanned label.
    Segmented,
}

#[derive(Clone, Debug)]
struct SingleVertexColumn {
    label: LabelId,
    ids: Arc<Vec<VertexId>>,
    /// `None` means all rows are valid.
    validity: Option<Arc<Vec<bool>>>,
}

#[derive(Clone, Debug)]
struct MultiVertexColumn {
    rows: Arc<Vec<Option<(LabelId, VertexId)>>>,
}

/// Label-partitioned vertex runs, as produced by a multi-label scan.
#[derive(Clone, Debug)]
pub struct SegmentedVertexColumn {
    segments: Arc<Vec<(LabelId, Vec<VertexId>)>>,
    /// Cumulative row offset at which each segment starts.
    starts: Arc<Vec<usize>>,
    len: usize,
}

impl SegmentedVertexColumn {
    /// Builds a segmented column from per-label runs.
    pub fn new(segments: Vec<(LabelId, Vec<VertexId>)>) -> Self {
        let mut starts = Vec::with_capacity(segments.len());
        let mut len = 0usize;
        for (_, ids) in &segments {
            starts.push(len);
            len += ids.len();
        }
        Self {
            segments: Arc::new(segments),
            starts: Arc::new(starts),
            len,
        }
    }

    fn get(&self, row: usize) -> Option<(LabelId, VertexId)> {
        if row >= self.len {
            return None;
        }
        let seg = self.starts.partition_point(|start| *start <= row) - 1;
        let (label, ids) = &self.segments[seg];
        Some((*label, ids[row - self.starts[seg]]))
    }
}

/// A column of vertex records.
#[derive(Clone, Debug)]
pub struct VertexColumn {
    repr: VertexRepr,
}

#[derive(Clone, Debug)]
enum VertexRepr {
    Single(SingleVertexColumn),
    Multi(MultiVertexColumn),
    Segmented(SegmentedVertexColumn),
}

impl VertexColumn {
    /// Wraps a segmented column.
    pub fn from_segments(segments: SegmentedVertexColumn) -> Self {
        Self {
            repr: VertexRepr::Segmented(segments),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        match &self.repr {
            VertexRepr::Single(col) => col.ids.len(),
            VertexRepr::Multi(col) => col.rows.len(),
            VertexRepr::Segmented(col) => col.len,
        }
    }

    /// Returns true when the column holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Variant discriminator.
    pub fn column_type(&self) -> VertexColumnType {
        match &self.repr {
            VertexRepr::Single(_) => VertexColumnType::Single,
            VertexRepr::Multi(_) => VertexColumnType::Multi,
            VertexRepr::Segmented(_) => VertexColumnType::Segmented,
        }
    }

    /// Record at a row; `None` for null rows.
    pub fn get(&self, row: usize) -> Option<(LabelId, VertexId)> {
        match &self.repr {
            VertexRepr::Single(col) => {
                let vid = *col.ids.get(row)?;
                match &col.validity {
                    Some(validity) if !validity[row] => None,
                    _ => Some((col.label, vid)),
                }
            }
            VertexRepr::Multi(col) => *col.rows.get(row)?,
            VertexRepr::Segmented(col) => col.get(row),
        }
    }

    /// Distinct labels present among non-null rows.
    pub fn labels(&self) -> LabelSet {
        match &self.repr {
            VertexRepr::Single(col) => {
                let any_valid = match &col.validity {
                    Some(validity) => validity.iter().any(|v| *v),
                    None => !col.ids.is_empty(),
                };
                if any_valid {
                    SmallVec::from_slice(&[col.label])
                } else {
                    SmallVec::new()
                }
            }
            VertexRepr::Multi(col) => {
                let mut labels = LabelSet::new();
                for row in col.rows.iter().flatten() {
                    if !labels.contains(&row.0) {
                        labels.push(row.0);
                    }
                }
                labels
            }
            VertexRepr::Segmented(col) => {
                let mut labels = LabelSet::new();
                for (label, ids) in col.segments.iter() {
                    if !ids.is_empty() && !labels.contains(label) {
                        labels.push(*label);
                    }
                }
                labels
            }
        }
    }

    /// Calls `f(row, label, id)` for every non-null row, in row order.
    pub fn foreach(&self, mut f: impl FnMut(usize, LabelId, VertexId)) {
        for row in 0..self.len() {
            if let Some((label, vid)) = self.get(row) {
                f(row, label, vid);
            }
        }
    }

    /// Returns true when any row is null.
    pub fn has_nulls(&self) -> bool {
        match &self.repr {
            VertexRepr::Single(col) => col
                .validity
                .as_ref()
                .map(|validity| validity.iter().any(|v| !*v))
                .unwrap_or(false),
            VertexRepr::Multi(col) => col.rows.iter().any(Option::is_none),
            VertexRepr::Segmented(_) => false,
        }
    }

    /// Index-preserving copy to a new row set; may densify the variant
    /// (a segmented column shuffled onto one label becomes single-label).
    pub fn shuffle(&self, offsets: &[usize]) -> VertexColumn {
        check_offsets(offsets, self.len());
        let mut builder = VertexColumnBuilder::with_capacity(offsets.len());
        for &offset in offsets {
            match self.get(offset) {
                Some((label, vid)) => builder.push(label, vid),
                None => builder.push_null(),
            }
        }
        builder.finish()
    }

    /// As [`VertexColumn::shuffle`]; `None` offsets become null rows.
    pub fn shuffle_optional(&self, offsets: &[Option<usize>]) -> VertexColumn {
        check_optional_offsets(offsets, self.len());
        let mut builder = VertexColumnBuilder::with_capacity(offsets.len());
        for offset in offsets {
            match offset.and_then(|o| self.get(o)) {
                Some((label, vid)) => builder.push(label, vid),
                None => builder.push_null(),
            }
        }
        builder.finish()
    }

    /// Concatenates two vertex columns (Union branch merge).
    pub fn union(&self, other: &VertexColumn) -> VertexColumn {
        let mut builder = VertexColumnBuilder::with_capacity(self.len() + other.len());
        for col in [self, other] {
            for row in 0..col.len() {
                match col.get(row) {
                    Some((label, vid)) => builder.push(label, vid),
                    None => builder.push_null(),
                }
            }
        }
        builder.finish()
    }
}

/// Accumulates vertex records and freezes them into the densest variant
/// that can represent them.
#[derive(Debug, Default)]
pub struct VertexColumnBuilder {
    rows: Vec<Option<(LabelId, VertexId)>>,
    labels: LabelSet,
    nulls: bool,
}

impl VertexColumnBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty builder with row capacity reserved.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            labels: LabelSet::new(),
            nulls: false,
        }
    }

    /// Appends one vertex record.
    pub fn push(&mut self, label: LabelId, vid: VertexId) {
        if !self.labels.contains(&label) {
            self.labels.push(label);
        }
        self.rows.push(Some((label, vid)));
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
    /// One distinct label yields the single-label variant (with a validity
    /// mask when null rows were pushed); anything else yields multi-label.
    pub fn finish(self) -> VertexColumn {
        if self.labels.len() == 1 {
            let label = self.labels[0];
            let mut ids = Vec::with_capacity(self.rows.len());
            if self.nulls {
                let mut validity = Vec::with_capacity(self.rows.len());
                for row in &self.rows {
                    match row {
                        Some((_, vid)) => {
                            ids.push(*vid);
                            validity.push(true);
                        }
                        None => {
                            ids.push(VertexId(0));
                            validity.push(false);
                        }
                    }
                }
                VertexColumn {
                    repr: VertexRepr::Single(SingleVertexColumn {
                        label,
                        ids: Arc::new(ids),
                        validity: Some(Arc::new(validity)),
                    }),
                }
            } else {
                for row in &self.rows {
                    if let Some((_, vid)) = row {
                        ids.push(*vid);
                    }
                }
                VertexColumn {
                    repr: VertexRepr::Single(SingleVertexColumn {
                        label,
                        ids: Arc::new(ids),
                        validity: None,
                    }),
                }
            }
        } else {
            VertexColumn {
                repr: VertexRepr::Multi(MultiVertexColumn {
                    rows: Arc::new(self.rows),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_picks_single_label_variant() {
        let mut builder = VertexColumnBuilder::new();
        builder.push(LabelId(3), VertexId(1));
        builder.push(LabelId(3), VertexId(2));
        let col = builder.finish();
        assert_eq!(col.column_type(), VertexColumnType::Single);
        assert_eq!(col.labels().as_slice(), &[LabelId(3)]);
        assert_eq!(col.get(1), Some((LabelId(3), VertexId(2))));
        assert!(!col.has_nulls());
    }

    #[test]
    fn builder_picks_multi_label_variant() {
        let mut builder = VertexColumnBuilder::new();
        builder.push(LabelId(1), VertexId(1));
        builder.push(LabelId(2), VertexId(2));
        let col = builder.finish();
        assert_eq!(col.column_type(), VertexColumnType::Multi);
        assert_eq!(col.labels().len(), 2);
    }

    #[test]
    fn nulls_keep_single_label_with_validity() {
        let mut builder = VertexColumnBuilder::new();
        builder.push(LabelId(1), VertexId(7));
        builder.push_null();
        let col = builder.finish();
        assert_eq!(col.column_type(), VertexColumnType::Single);
        assert!(col.has_nulls());
        assert_eq!(col.get(0), Some((LabelId(1), VertexId(7))));
        assert_eq!(col.get(1), None);
    }

    #[test]
    fn segmented_lookup_crosses_runs() {
        let col = SegmentedVertexColumn::new(vec![
            (LabelId(1), vec![VertexId(0), VertexId(1)]),
            (LabelId(2), vec![VertexId(0)]),
        ]);
        let col = VertexColumn::from_segments(col);
        assert_eq!(col.len(), 3);
        assert_eq!(col.column_type(), VertexColumnType::Segmented);
        assert_eq!(col.get(0), Some((LabelId(1), VertexId(0))));
        assert_eq!(col.get(2), Some((LabelId(2), VertexId(0))));
        assert_eq!(col.get(3), None);
        assert_eq!(col.labels().len(), 2);
    }

    #[test]
    fn shuffle_densifies_segmented_to_single() {
        let col = SegmentedVertexColumn::new(vec![
            (LabelId(1), vec![VertexId(0), VertexId(1)]),
            (LabelId(2), vec![VertexId(5)]),
        ]);
        let col = VertexColumn::from_segments(col);
        let shuffled = col.shuffle(&[0, 1, 1]);
        assert_eq!(shuffled.column_type(), VertexColumnType::Single);
        assert_eq!(shuffled.get(2), Some((LabelId(1), VertexId(1))));
    }

    #[test]
    fn foreach_skips_null_rows() {
        let mut builder = VertexColumnBuilder::new();
        builder.push(LabelId(1), VertexId(4));
        builder.push_null();
        builder.push(LabelId(1), VertexId(6));
        let col = builder.finish();
        let mut seen = Vec::new();
        col.foreach(|row, _, vid| seen.push((row, vid)));
        assert_eq!(seen, vec![(0, VertexId(4)), (2, VertexId(6))]);
    }
}
