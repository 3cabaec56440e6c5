#![forbid(unsafe_code)]

//! Identifier newtypes, traversal direction, and the crate-wide error type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Vertex label identifier, assigned by the graph schema.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct LabelId(pub u32);

/// Edge type identifier, assigned by the graph schema.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct TypeId(pub u32);

/// Internal vertex identifier, dense within a label.
///
/// Internal ids are storage-private; clients address vertices by their
/// original (external) id, which the graph interface resolves both ways.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct VertexId(pub u64);

/// Slot in a shared string dictionary.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct StrId(pub u32);

/// Column register within an execution context.
///
/// Tags are the "logical registers" of a physical plan: every operator
/// reads its inputs from tags and binds its output at a tag.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct Tag(pub u8);

/// (source label, destination label, edge type) naming one edge relation.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct LabelTriplet {
    /// Label of the source endpoint.
    pub src_label: LabelId,
    /// Label of the destination endpoint.
    pub dst_label: LabelId,
    /// Edge type connecting the two.
    pub edge_type: TypeId,
}

impl LabelTriplet {
    /// Creates a triplet from its three parts.
    pub fn new(src_label: LabelId, dst_label: LabelId, edge_type: TypeId) -> Self {
        Self {
            src_label,
            dst_label,
            edge_type,
        }
    }

    /// Returns true when both endpoints carry the same label.
    pub fn is_symmetric(&self) -> bool {
        self.src_label == self.dst_label
    }
}

/// Edge traversal direction.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dir {
    /// Follow edges from source to destination.
    Out,
    /// Follow edges from destination to source.
    In,
    /// Follow edges both ways.
    Both,
}

impl Dir {
    /// Flips `Out` and `In`; `Both` is its own reverse.
    pub fn reverse(self) -> Dir {
        match self {
            Dir::Out => Dir::In,
            Dir::In => Dir::Out,
            Dir::Both => Dir::Both,
        }
    }
}

impl fmt::Display for Dir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dir::Out => write!(f, "out"),
            Dir::In => write!(f, "in"),
            Dir::Both => write!(f, "both"),
        }
    }
}

/// Error taxonomy shared by every stage of the runtime.
///
/// The pipeline never retries: the first operator that fails terminates the
/// run and its error reaches the caller with the operator name prepended to
/// the message, kind untouched.
#[derive(thiserror::Error, Debug)]
pub enum SendaError {
    /// The operator was asked to do something it deliberately does not do.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    /// The plan or a bound parameter is structurally invalid.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// A reachable but unfinished code path.
    #[error("not implemented: {0}")]
    NotImplemented(String),
    /// An invariant the runtime relies on was violated.
    #[error("internal error: {0}")]
    Internal(String),
    /// Anything that fits none of the kinds above.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl SendaError {
    /// Builds an [`SendaError::Unsupported`].
    pub fn unsupported(msg: impl Into<String>) -> Self {
        SendaError::Unsupported(msg.into())
    }

    /// Builds an [`SendaError::BadRequest`].
    pub fn bad_request(msg: impl Into<String>) -> Self {
        SendaError::BadRequest(msg.into())
    }

    /// Builds an [`SendaError::Internal`].
    pub fn internal(msg: impl Into<String>) -> Self {
        SendaError::Internal(msg.into())
    }

    /// Prepends an operator name to the message, preserving the kind.
    pub fn annotate(self, op: &str) -> Self {
        match self {
            SendaError::Unsupported(msg) => SendaError::Unsupported(format!("{op}: {msg}")),
            SendaError::BadRequest(msg) => SendaError::BadRequest(format!("{op}: {msg}")),
            SendaError::NotImplemented(msg) => SendaError::NotImplemented(format!("{op}: {msg}")),
            SendaError::Internal(msg) => SendaError::Internal(format!("{op}: {msg}")),
            SendaError::Unknown(msg) => SendaError::Unknown(format!("{op}: {msg}")),
        }
    }

    /// Machine-readable kind for the wire error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            SendaError::Unsupported(_) => "unsupported_operation",
            SendaError::BadRequest(_) => "bad_request",
            SendaError::NotImplemented(_) => "not_implemented",
            SendaError::Internal(_) => "internal_error",
            SendaError::Unknown(_) => "unknown",
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SendaError>;

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for LabelId {
    fn from(value: u32) -> Self {
        LabelId(value)
    }
}

impl From<LabelId> for u32 {
    fn from(value: LabelId) -> Self {
        value.0
    }
}

impl From<u32> for TypeId {
    fn from(value: u32) -> Self {
        TypeId(value)
    }
}

impl From<TypeId> for u32 {
    fn from(value: TypeId) -> Self {
        value.0
    }
}

impl From<u8> for Tag {
    fn from(value: u8) -> Self {
        Tag(value)
    }
}

impl From<Tag> for usize {
    fn from(value: Tag) -> Self {
        value.0 as usize
    }
}
