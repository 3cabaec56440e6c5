#![forbid(unsafe_code)]

//! Serialized physical-plan model.
//!
//! The compiler hands the runtime an operator tree as bytes (self-describing
//! JSON). Parsing is two-stage: the raw tree is first walked to reject any
//! operator kind outside the supported set — including inside nested
//! sub-plans — and only then deserialized into typed operator payloads.
//! Everything here is plan *shape*; name resolution and semantic validation
//! happen when the pipeline is built.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::types::{Dir, Result, SendaError, Tag};

/// String-keyed parameter map bound at execution time.
pub type Params = FxHashMap<String, String>;

/// An edge relation named by its three labels.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TripletRef {
    /// Source vertex label name.
    pub src: String,
    /// Destination vertex label name.
    pub dst: String,
    /// Edge type name.
    pub edge: String,
}

/// What an edge expansion emits.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpandKind {
    /// The neighbor vertex.
    Vertex,
    /// The full edge record.
    Edge,
}

/// Index lookup replacing a full label scan.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexLookup {
    /// Point/batch lookup by original (external) ids.
    OriginalIds(Vec<i64>),
    /// Batch of internal ids, assumed valid for the scanned label.
    InternalIds(Vec<u64>),
}

/// Scan operator payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanParams {
    /// Vertex labels to scan; one label builds the dense single-label
    /// column, several build one segment per label.
    pub labels: Vec<String>,
    /// Output tag.
    pub alias: Tag,
    /// Residual predicate over vertex properties.
    #[serde(default)]
    pub predicate: Option<Expr>,
    /// Optional index lookup; restricted to single-label scans.
    #[serde(default)]
    pub index: Option<IndexLookup>,
}

/// EdgeExpand operator payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeExpandParams {
    /// Input vertex tag.
    pub tag: Tag,
    /// Output tag.
    pub alias: Tag,
    /// Traversal direction.
    pub dir: Dir,
    /// Candidate relations, intersected with the input column's labels.
    pub triplets: Vec<TripletRef>,
    /// Vertex-result or edge-result mode.
    pub expand: ExpandKind,
    /// Left-outer semantics: one output row per input row, null on no match.
    #[serde(default)]
    pub is_optional: bool,
    /// Per-candidate filter evaluated before a match is appended.
    #[serde(default)]
    pub predicate: Option<Expr>,
}

/// Which endpoint GetV extracts.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GetVOpt {
    /// Canonical source endpoint.
    Start,
    /// Canonical destination endpoint.
    End,
    /// Endpoint opposite the traversal origin.
    Other,
    /// Input is already a vertex column; apply only the filters.
    Itself,
}

/// GetV operator payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetVParams {
    /// Input edge/path/vertex tag.
    pub tag: Tag,
    /// Output tag.
    pub alias: Tag,
    /// Endpoint selector.
    pub opt: GetVOpt,
    /// Label filter; empty keeps every label.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Row filter evaluated on the extracted vertex.
    #[serde(default)]
    pub predicate: Option<Expr>,
}

/// What a path expansion emits.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathResult {
    /// Only the terminal vertex of each valid hop count.
    Vertex,
    /// The full path object with every intermediate step.
    Path,
}

/// PathExpand operator payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathExpandParams {
    /// Input vertex tag (traversal origins).
    pub tag: Tag,
    /// Output tag.
    pub alias: Tag,
    /// Traversal direction, applied at every hop.
    pub dir: Dir,
    /// Relations followed at each hop.
    pub triplets: Vec<TripletRef>,
    /// Minimum hop count emitted (inclusive).
    pub hop_lower: usize,
    /// Hop cap (exclusive).
    pub hop_upper: usize,
    /// Terminal-vertex or path-object mode.
    pub result: PathResult,
    /// Simple-path semantics: skip vertices already on the path.
    #[serde(default)]
    pub exclude_visited: bool,
    /// Per-candidate filter on the vertex reached by each hop.
    #[serde(default)]
    pub predicate: Option<Expr>,
}

/// One projected expression and its output tag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectionItem {
    /// Projected expression.
    pub expr: Expr,
    /// Output tag.
    pub alias: Tag,
}

/// Project operator payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectParams {
    /// Projections, evaluated left to right.
    pub exprs: Vec<ProjectionItem>,
    /// Extend the visible tag list instead of replacing it.
    #[serde(default)]
    pub is_append: bool,
}

/// Select operator payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelectParams {
    /// Row predicate; surviving rows keep their order.
    pub predicate: Expr,
}

/// Sort direction for one ordering key.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Ascending (the default).
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// One ordering key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderKey {
    /// Key expression.
    pub expr: Expr,
    /// Sort direction.
    #[serde(default)]
    pub order: SortOrder,
}

/// Half-open `[lower, upper)` row window.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct Window {
    /// First row kept (inclusive).
    #[serde(default)]
    pub lower: usize,
    /// First row dropped (exclusive).
    pub upper: usize,
}

/// OrderBy operator payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderByParams {
    /// Ordering keys, most significant first; row index breaks ties.
    pub keys: Vec<OrderKey>,
    /// Optional top-k window over the sorted rows.
    #[serde(default)]
    pub window: Option<Window>,
}

/// One grouping key and its output tag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupKey {
    /// Key expression; a plain tag variable keeps its column kind.
    pub expr: Expr,
    /// Output tag.
    pub alias: Tag,
}

/// Aggregate function applied per bucket.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFn {
    /// Numeric sum; exactly one input.
    Sum,
    /// Row count; at most one input (counting its non-null rows).
    Count,
    /// Distinct count over the input tuple.
    CountDistinct,
    /// Minimum; exactly one input.
    Min,
    /// Maximum; exactly one input.
    Max,
    /// First value in bucket order; exactly one input.
    First,
    /// Distinct values as a list; exactly one input.
    ToSet,
    /// All values as a list; exactly one input.
    ToList,
    /// Average with integer truncation for integer inputs; exactly one input.
    Avg,
}

/// One aggregate and its output tag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregateSpec {
    /// The function.
    pub func: AggregateFn,
    /// Input expressions; arity is checked at build time.
    #[serde(default)]
    pub inputs: Vec<Expr>,
    /// Output tag.
    pub alias: Tag,
}

/// GroupBy operator payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupByParams {
    /// Grouping keys; empty means one implicit bucket over all rows.
    #[serde(default)]
    pub keys: Vec<GroupKey>,
    /// Aggregates computed per bucket.
    pub aggregates: Vec<AggregateSpec>,
}

/// Dedup operator payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DedupParams {
    /// Uniqueness keys; first-seen rows survive.
    pub keys: Vec<Expr>,
}

/// Hash-join kind.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    /// One output row per matching pair.
    Inner,
    /// Left rows with at least one match.
    Semi,
    /// Left rows with no match.
    Anti,
    /// Every left row; unmatched right columns become null.
    LeftOuter,
}

/// Join operator payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JoinParams {
    /// Join kind.
    pub kind: JoinKind,
    /// Key expressions over the left branch result.
    pub left_keys: Vec<Expr>,
    /// Key expressions over the right branch result, paired positionally.
    pub right_keys: Vec<Expr>,
    /// Left sub-plan, run over a duplicate of the incoming context.
    pub left_plan: Vec<PlanOp>,
    /// Right sub-plan, run over a duplicate of the incoming context.
    pub right_plan: Vec<PlanOp>,
}

/// Intersect operator payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntersectParams {
    /// Tag whose values are intersected across branches.
    pub key: Tag,
    /// Sibling sub-plans; the last one runs over the live context.
    pub sub_plans: Vec<Vec<PlanOp>>,
}

/// Union operator payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnionParams {
    /// Sibling sub-plans; branch schemas must agree per tag.
    pub sub_plans: Vec<Vec<PlanOp>>,
}

/// Limit operator payload: keeps rows in `[lower, upper)`.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct LimitParams {
    /// First row kept (inclusive).
    #[serde(default)]
    pub lower: usize,
    /// First row dropped (exclusive).
    pub upper: usize,
}

/// ProcedureCall operator payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcedureCallParams {
    /// Registered procedure name.
    pub name: String,
}

/// Sink operator payload.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SinkParams {
    /// Tags to emit, in order; empty uses the context's visible list.
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// One operator of the serialized plan.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlanOp {
    /// Leading no-op accepted and skipped.
    Root,
    /// Vertex scan.
    Scan(ScanParams),
    /// Single-hop expansion.
    EdgeExpand(EdgeExpandParams),
    /// Endpoint extraction.
    GetV(GetVParams),
    /// Bounded-length repeated expansion.
    PathExpand(PathExpandParams),
    /// Expression projection.
    Project(ProjectParams),
    /// Row sort.
    OrderBy(OrderByParams),
    /// Bucketed aggregation.
    GroupBy(GroupByParams),
    /// Duplicate-row removal.
    Dedup(DedupParams),
    /// Row filter.
    Select(SelectParams),
    /// Hash join of two sub-plans.
    Join(JoinParams),
    /// Key intersection of sibling sub-plans.
    Intersect(IntersectParams),
    /// Concatenation of sibling sub-plans.
    Union(UnionParams),
    /// Row-window slice.
    Limit(LimitParams),
    /// Registered procedure invocation.
    ProcedureCall(ProcedureCallParams),
    /// Result encoding; ends the visible pipeline.
    Sink(SinkParams),
}

impl PlanOp {
    /// Operator name used in error annotation and logging.
    pub fn name(&self) -> &'static str {
        match self {
            PlanOp::Root => "Root",
            PlanOp::Scan(_) => "Scan",
            PlanOp::EdgeExpand(_) => "EdgeExpand",
            PlanOp::GetV(_) => "GetV",
            PlanOp::PathExpand(_) => "PathExpand",
            PlanOp::Project(_) => "Project",
            PlanOp::OrderBy(_) => "OrderBy",
            PlanOp::GroupBy(_) => "GroupBy",
            PlanOp::Dedup(_) => "Dedup",
            PlanOp::Select(_) => "Select",
            PlanOp::Join(_) => "Join",
            PlanOp::Intersect(_) => "Intersect",
            PlanOp::Union(_) => "Union",
            PlanOp::Limit(_) => "Limit",
            PlanOp::ProcedureCall(_) => "ProcedureCall",
            PlanOp::Sink(_) => "Sink",
        }
    }
}

const KNOWN_OPS: &[&str] = &[
    "root",
    "scan",
    "edge_expand",
    "get_v",
    "path_expand",
    "project",
    "order_by",
    "group_by",
    "dedup",
    "select",
    "join",
    "intersect",
    "union",
    "limit",
    "procedure_call",
    "sink",
];

/// A parsed physical plan: a linear operator list, possibly with nested
/// sub-plans inside join/intersect/union operators.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Plan {
    /// Operators in execution order.
    pub ops: Vec<PlanOp>,
}

impl Plan {
    /// Parses a serialized plan (a JSON array of operator objects).
    pub fn from_slice(bytes: &[u8]) -> Result<Plan> {
        let raw: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|err| SendaError::bad_request(format!("malformed plan: {err}")))?;
        Self::from_value(raw)
    }

    /// Parses an already-decoded JSON plan.
    pub fn from_value(raw: serde_json::Value) -> Result<Plan> {
        validate_op_kinds(&raw)?;
        let ops: Vec<PlanOp> = serde_json::from_value(raw)
            .map_err(|err| SendaError::bad_request(format!("malformed plan: {err}")))?;
        Ok(Plan { ops })
    }
}

/// First parse stage: every operator object, nested sub-plans included, must
/// carry an `op` kind from the supported set.
fn validate_op_kinds(raw: &serde_json::Value) -> Result<()> {
    let ops = raw
        .as_array()
        .ok_or_else(|| SendaError::bad_request("plan must be an array of operators"))?;
    for op in ops {
        let object = op
            .as_object()
            .ok_or_else(|| SendaError::bad_request("plan operator must be an object"))?;
        let kind = object
            .get("op")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| SendaError::bad_request("plan operator is missing its 'op' kind"))?;
        if !KNOWN_OPS.contains(&kind) {
            return Err(SendaError::bad_request(format!("unknown operator '{kind}'")));
        }
        for nested in ["left_plan", "right_plan"] {
            if let Some(sub) = object.get(nested) {
                validate_op_kinds(sub)?;
            }
        }
        if let Some(sub_plans) = object.get("sub_plans").and_then(serde_json::Value::as_array) {
            for sub in sub_plans {
                validate_op_kinds(sub)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn linear_plan_parses() {
        let plan = Plan::from_value(json!([
            {"op": "scan", "labels": ["person"], "alias": 0},
            {"op": "edge_expand", "tag": 0, "alias": 1, "dir": "out", "expand": "vertex",
             "triplets": [{"src": "person", "dst": "person", "edge": "knows"}]},
            {"op": "sink", "tags": [1]}
        ]))
        .unwrap();
        assert_eq!(plan.ops.len(), 3);
        assert_eq!(plan.ops[1].name(), "EdgeExpand");
    }

    #[test]
    fn unknown_operator_is_rejected_by_name() {
        let err = Plan::from_value(json!([{"op": "shuffle_exchange"}])).unwrap_err();
        match err {
            SendaError::BadRequest(msg) => {
                assert!(msg.contains("unknown operator 'shuffle_exchange'"), "{msg}")
            }
            other => panic!("expected bad request, got {other}"),
        }
    }

    #[test]
    fn unknown_operator_inside_sub_plan_is_rejected() {
        let err = Plan::from_value(json!([
            {"op": "union", "sub_plans": [
                [{"op": "scan", "labels": ["person"], "alias": 0}],
                [{"op": "teleport"}]
            ]}
        ]))
        .unwrap_err();
        match err {
            SendaError::BadRequest(msg) => assert!(msg.contains("teleport"), "{msg}"),
            other => panic!("expected bad request, got {other}"),
        }
    }

    #[test]
    fn malformed_payload_is_bad_request() {
        let err = Plan::from_value(json!([{"op": "scan", "labels": "person"}])).unwrap_err();
        assert!(matches!(err, SendaError::BadRequest(_)));
    }
}
