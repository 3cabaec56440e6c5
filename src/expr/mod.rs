#![forbid(unsafe_code)]

//! Expression trees carried by the physical plan.
//!
//! Plans carry predicates, projection expressions, and grouping keys as a
//! small serde tree over tag variables, vertex/edge properties, parameters,
//! and literals. Expressions are compiled once per operator instance against
//! the graph and bound parameters ([`eval::Evaluator`]), so per-row
//! evaluation never resolves names.

pub mod eval;
pub mod sig;

pub use eval::Evaluator;

use serde::{Deserialize, Serialize};

use crate::types::Tag;
use crate::value::{Value, ValueKind};

/// Literal as it appears in a serialized plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String literal.
    Str(String),
}

impl Literal {
    /// Converts to a runtime value.
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Bool(v) => Value::Bool(*v),
            Literal::Int(v) => Value::Int(*v),
            Literal::Float(v) => Value::Float(*v),
            Literal::Str(v) => Value::Str(v.as_str().into()),
        }
    }
}

/// Unary operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    /// Boolean negation.
    Not,
    /// Arithmetic negation.
    Neg,
}

/// Binary operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
    /// Remainder.
    Mod,
    /// Equality.
    Eq,
    /// Inequality.
    Ne,
    /// Less-than.
    Lt,
    /// Less-than-or-equal.
    Le,
    /// Greater-than.
    Gt,
    /// Greater-than-or-equal.
    Ge,
    /// Boolean conjunction.
    And,
    /// Boolean disjunction.
    Or,
}

/// Plan-facing expression tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    /// A literal constant.
    Const {
        /// The literal.
        value: Literal,
    },
    /// A named parameter bound at execution time.
    Param {
        /// Parameter name in the bound parameter map.
        name: String,
        /// Kind the raw string parses to.
        #[serde(rename = "as")]
        as_kind: ValueKind,
    },
    /// The element bound at a tag.
    Var {
        /// The tag.
        tag: Tag,
    },
    /// A property of the vertex or edge bound at a tag.
    Property {
        /// The tag.
        tag: Tag,
        /// Property name, resolved through the schema at compile time.
        name: String,
    },
    /// The label id of the vertex bound at a tag.
    Label {
        /// The tag.
        tag: Tag,
    },
    /// Unary application.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// Operand.
        expr: Box<Expr>,
    },
    /// Binary application.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Membership in a literal list.
    Within {
        /// Tested expression.
        expr: Box<Expr>,
        /// Literal candidates.
        values: Vec<Literal>,
    },
    /// Null test; never yields null itself.
    IsNull {
        /// Tested expression.
        expr: Box<Expr>,
    },
}

impl Expr {
    /// Shorthand for a tag variable.
    pub fn var(tag: Tag) -> Expr {
        Expr::Var { tag }
    }

    /// Shorthand for a property access.
    pub fn property(tag: Tag, name: impl Into<String>) -> Expr {
        Expr::Property {
            tag,
            name: name.into(),
        }
    }

    /// Shorthand for a binary comparison against an integer literal.
    pub fn cmp_int(op: BinaryOp, left: Expr, value: i64) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(Expr::Const {
                value: Literal::Int(value),
            }),
        }
    }
}
