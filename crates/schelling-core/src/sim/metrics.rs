use serde::{Deserialize, Serialize};

/// Outcome of one sweep over an iteration's agent snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationReport {
    /// 1-based iteration index.
    pub index: usize,
    /// Number of agents relocated during this iteration.
    pub changes: usize,
}

/// Where a run currently stands. Summaries returned by the driver are
/// never `Running`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Running,
    Converged,
    Exhausted,
}

fn default_schema_version() -> u32 {
    1
}

/// Full trace of a finished run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub max_iterations: usize,
    pub state: RunState,
    /// Per-iteration reports in execution order. The last entry has
    /// `changes == 0` exactly when `state` is `Converged`.
    pub iterations: Vec<IterationReport>,
    #[serde(default)]
    pub total_relocations: usize,
    pub final_satisfied: usize,
    pub final_similarity: f64,
}

impl RunSummary {
    /// Number of iterations actually executed.
    pub fn iterations_run(&self) -> usize {
        self.iterations.len()
    }
}
