#![forbid(unsafe_code)]

//! Wire-facing result model.
//!
//! Sink encoding turns runtime values into these serde-friendly records;
//! internal vertex ids are resolved back to the original ids the graph was
//! loaded with, so results are stable across reloads.

use serde::{Deserialize, Serialize};

use crate::types::SendaError;

/// One encoded cell of a result row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultEntry {
    /// Absent value.
    Null,
    /// Boolean.
    Bool {
        /// The value.
        value: bool,
    },
    /// 64-bit signed integer.
    Int {
        /// The value.
        value: i64,
    },
    /// 64-bit float.
    Float {
        /// The value.
        value: f64,
    },
    /// String.
    Str {
        /// The value.
        value: String,
    },
    /// Millisecond timestamp.
    Timestamp {
        /// Milliseconds since the Unix epoch.
        value: i64,
    },
    /// Homogeneous list.
    List {
        /// Encoded items.
        items: Vec<ResultEntry>,
    },
    /// Heterogeneous tuple.
    Tuple {
        /// Encoded items.
        items: Vec<ResultEntry>,
    },
    /// Vertex, addressed by label name and original id.
    Vertex {
        /// Label name.
        label: String,
        /// Original id.
        id: i64,
    },
    /// Edge, with both endpoints resolved.
    Edge {
        /// Edge type name.
        label: String,
        /// Source label name.
        src_label: String,
        /// Destination label name.
        dst_label: String,
        /// Source original id.
        src: i64,
        /// Destination original id.
        dst: i64,
        /// Encoded payload; [`ResultEntry::Null`] when the relation carries
        /// none.
        data: Box<ResultEntry>,
    },
    /// Path, as its vertex step sequence.
    Path {
        /// Encoded vertex steps, origin first.
        steps: Vec<ResultEntry>,
    },
}

/// One encoded result row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// One entry per sunk tag, in tag order.
    pub entries: Vec<ResultEntry>,
}

/// The full encoded result of a pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Tags the rows were encoded from, in column order.
    pub tags: Vec<u8>,
    /// Encoded rows.
    pub rows: Vec<ResultRow>,
}

impl ResultSet {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when no rows were produced.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Error half of the response envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable error kind string.
    pub kind: String,
    /// Human-readable message.
    pub message: String,
}

/// Response envelope a caller sees: either results or a classified error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryResponse {
    /// Successful execution.
    Results(ResultSet),
    /// Failed execution.
    Error(ErrorBody),
}

impl QueryResponse {
    /// Wraps an execution outcome into the envelope.
    pub fn from_outcome(outcome: Result<ResultSet, SendaError>) -> Self {
        match outcome {
            Ok(results) => QueryResponse::Results(results),
            Err(err) => QueryResponse::Error(ErrorBody {
                kind: err.kind().to_string(),
                message: err.to_string(),
            }),
        }
    }
}
