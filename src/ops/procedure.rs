#![forbid(unsafe_code)]

//! ProcedureCall: source-position invocation of registered procedures.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::context::Context;
use crate::ops::{ExecEnv, OpChain, Operator};
use crate::types::{Result, SendaError};

/// A callable registered under a name.
pub trait Procedure: Send + Sync {
    /// Produces the procedure's result context; the input context is empty.
    fn call(&self, ctx: Context, env: &ExecEnv<'_>) -> Result<Context>;
}

/// Caller-supplied name-to-procedure registry shared across pipelines.
#[derive(Default)]
pub struct ProcedureRegistry {
    procedures: RwLock<FxHashMap<String, Arc<dyn Procedure>>>,
}

impl ProcedureRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a procedure under a name.
    pub fn register(&self, name: impl Into<String>, procedure: Arc<dyn Procedure>) {
        self.procedures.write().insert(name.into(), procedure);
    }

    /// Looks up a procedure by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Procedure>> {
        self.procedures.read().get(name).cloned()
    }
}

/// The stock procedure kind: a pre-built sub-plan run through the shared
/// recursion path.
pub struct ChainProcedure {
    chain: OpChain,
}

impl ChainProcedure {
    /// Wraps a built operator chain.
    pub fn new(chain: OpChain) -> Self {
        Self { chain }
    }
}

impl Procedure for ChainProcedure {
    fn call(&self, ctx: Context, env: &ExecEnv<'_>) -> Result<Context> {
        self.chain.run(ctx, env)
    }
}

/// Invokes a named procedure. Must run where the context holds no columns
/// yet (a source position).
pub struct ProcedureCallOp {
    name: String,
}

impl ProcedureCallOp {
    /// Remembers the procedure name; resolution happens at execution time
    /// against the caller's registry.
    pub fn build(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Operator for ProcedureCallOp {
    fn name(&self) -> &'static str {
        "ProcedureCall"
    }

    fn execute(&self, ctx: Context, env: &ExecEnv<'_>) -> Result<Context> {
        if ctx.is_populated() {
            return Err(SendaError::bad_request(
                "procedure call is a source operator and cannot run over a populated context",
            ));
        }
        let procedure = env.procedures.get(&self.name).ok_or_else(|| {
            SendaError::bad_request(format!("unknown procedure '{}'", self.name))
        })?;
        procedure.call(ctx, env)
    }
}
