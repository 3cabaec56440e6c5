#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Senda: a columnar interpreter for property-graph physical plans.
//!
//! A query compiler hands the runtime a serialized physical plan (a linear
//! operator list with nested sub-plans); the runtime builds it into a
//! [`pipeline::Pipeline`] against a graph snapshot and executes it over a
//! columnar [`context::Context`], one whole operator at a time. Results come
//! back as a serde-friendly [`result::ResultSet`] addressed by the graph's
//! original ids.
//!
//! Adjacency storage is a collaborator behind [`graph::ReadGraph`]; the crate
//! ships [`graph::MemoryGraph`] plus CSV loading for tests and tooling.

pub mod columns;
pub mod context;
pub mod expr;
pub mod graph;
pub mod ops;
pub mod pipeline;
pub mod plan;
pub mod profile;
pub mod result;
pub mod schema;
pub mod types;
pub mod value;

pub use context::Context;
pub use graph::{MemoryGraph, MutGraph, ReadGraph};
pub use ops::{ChainProcedure, Procedure, ProcedureRegistry};
pub use pipeline::{Pipeline, PipelineOptions};
pub use plan::{Params, Plan};
pub use profile::PipelineProfile;
pub use result::{QueryResponse, ResultEntry, ResultRow, ResultSet};
pub use schema::GraphSchema;
pub use types::{Result, SendaError, Tag};
pub use value::Value;
