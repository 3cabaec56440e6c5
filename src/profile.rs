#![forbid(unsafe_code)]

//! Per-operator execution profiling.
//!
//! A profile is filled in by [`crate::pipeline::Pipeline::execute_with_profile`]
//! and rendered as a plain text table, one line per executed operator.

use std::fmt;
use std::time::Duration;

/// Timing and cardinality of one executed operator.
#[derive(Clone, Copy, Debug)]
pub struct OpStats {
    /// Operator name.
    pub name: &'static str,
    /// Wall time spent inside the operator.
    pub elapsed_ns: u64,
    /// Rows in the context the operator produced.
    pub rows_out: usize,
}

/// Accumulated stats of one pipeline run.
#[derive(Clone, Debug, Default)]
pub struct PipelineProfile {
    ops: Vec<OpStats>,
}

impl PipelineProfile {
    /// Creates an empty profile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one executed operator.
    pub fn record(&mut self, name: &'static str, elapsed: Duration, rows_out: usize) {
        self.ops.push(OpStats {
            name,
            elapsed_ns: elapsed.as_nanos() as u64,
            rows_out,
        });
    }

    /// Stats in execution order.
    pub fn ops(&self) -> &[OpStats] {
        &self.ops
    }

    /// Total wall time across all recorded operators.
    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.ops.iter().map(|op| op.elapsed_ns).sum())
    }
}

impl fmt::Display for PipelineProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<14} {:>12} {:>10}", "operator", "elapsed_us", "rows_out")?;
        for op in &self.ops {
            writeln!(
                f,
                "{:<14} {:>12} {:>10}",
                op.name,
                op.elapsed_ns / 1_000,
                op.rows_out
            )?;
        }
        write!(
            f,
            "{:<14} {:>12}",
            "total",
            self.total().as_micros()
        )
    }
}
