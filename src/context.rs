#![forbid(unsafe_code)]

//! The columnar execution context threaded through a pipeline.
//!
//! A context maps tags to columns sharing one row count, plus the ordered
//! tag list the sink will emit. It is moved operator to operator; duplication
//! for sub-plans is cheap because columns share their payload. The row-count
//! contract is enforced fail-fast: binding a column of the wrong length is a
//! programming error, not a runtime condition.

use crate::columns::Column;
use crate::types::Tag;

/// Tag-addressed column set with a uniform row count.
#[derive(Clone, Debug, Default)]
pub struct Context {
    /// Indexed by tag; `None` slots are unbound.
    columns: Vec<Option<Column>>,
    visible: Vec<Tag>,
    row_num: usize,
    populated: bool,
}

impl Context {
    /// Creates the empty context a pipeline starts from.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current row count. Zero either means an empty result set or a context
    /// no source operator has populated yet (see [`Context::is_populated`]).
    pub fn row_num(&self) -> usize {
        self.row_num
    }

    /// Returns true once any column has been bound.
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// Column bound at a tag.
    pub fn column(&self, tag: Tag) -> Option<&Column> {
        self.columns.get(tag.0 as usize)?.as_ref()
    }

    /// Tags with a bound column, in tag order.
    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(pos, _)| Tag(pos as u8))
    }

    /// Binds (or replaces) the column at a tag.
    ///
    /// The first bind fixes the context's row count; every later bind must
    /// match it exactly.
    pub fn set(&mut self, tag: Tag, column: Column) {
        if self.populated {
            assert_eq!(
                column.len(),
                self.row_num,
                "column bound at tag {tag} has {} rows, context has {}",
                column.len(),
                self.row_num
            );
        } else {
            self.row_num = column.len();
            self.populated = true;
        }
        let slot = tag.0 as usize;
        if self.columns.len() <= slot {
            self.columns.resize_with(slot + 1, || None);
        }
        self.columns[slot] = Some(column);
    }

    /// Unbinds a tag, dropping its column. The visible list is left alone.
    pub fn remove(&mut self, tag: Tag) -> Option<Column> {
        self.columns.get_mut(tag.0 as usize)?.take()
    }

    /// Reshuffles every bound column to a new row set.
    ///
    /// `offsets[i]` names the current row output row `i` derives from; the
    /// row count becomes `offsets.len()`. Used by every cardinality-changing
    /// operator before it binds its own output column.
    pub fn apply_shuffle(&mut self, offsets: &[usize]) {
        for slot in self.columns.iter_mut() {
            if let Some(column) = slot {
                *column = column.shuffle(offsets);
            }
        }
        self.row_num = offsets.len();
        self.populated = true;
    }

    /// Ordered tags the sink will emit.
    pub fn visible(&self) -> &[Tag] {
        &self.visible
    }

    /// Replaces the visible tag list.
    pub fn set_visible(&mut self, tags: Vec<Tag>) {
        self.visible = tags;
    }

    /// Appends a tag to the visible list unless already present.
    pub fn push_visible(&mut self, tag: Tag) {
        if !self.visible.contains(&tag) {
            self.visible.push(tag);
        }
    }

    /// Independent copy for a sub-plan branch; O(bound columns).
    pub fn dup(&self) -> Context {
        self.clone()
    }
}
