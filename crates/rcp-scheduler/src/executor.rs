//! The seam between the scheduler and the tool registry (component E,
//! §4.6 "Resolve the tool via (E)"). The scheduler depends only on this
//! trait, not on any concrete tool, so `rcp-tools` can depend on
//! `rcp-scheduler` (for the Recipe tool's sub-scheduler) without a cycle.

use rcp_core::{FileChanges, Problem, Step, StepContext};

/// What a successful step attempt produced.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    pub files: FileChanges,
    pub warnings: Vec<String>,
}

impl StepOutput {
    pub fn new(files: FileChanges) -> Self {
        Self { files, warnings: Vec::new() }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Dispatches one step attempt to the tool named by `step.tool` (§4.6
/// "Per-step execution").
#[async_trait::async_trait]
pub trait StepExecutor: Send + Sync {
    /// Validate-time check (§4.6 step 2): any returned problem aborts the
    /// attempt with `status = failed` before `execute` is ever called.
    async fn validate(&self, step: &Step, ctx: &StepContext) -> Vec<Problem>;

    /// Run the step once. Retries, timeouts, and backoff are the
    /// scheduler's responsibility, not the tool's.
    async fn execute(&self, step: &Step, ctx: &StepContext) -> Result<StepOutput, Problem>;
}
