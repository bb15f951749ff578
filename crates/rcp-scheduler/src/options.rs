//! Scheduler execution options (§4.6 "Inputs", §6.3's `options` record
//! restricted to the scheduling-relevant fields).

use std::sync::Arc;

use rcp_core::ProgressEvent;

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

#[derive(Clone, Default)]
pub struct ExecutionOptions {
    pub dry_run: bool,
    pub force: bool,
    /// Overrides `recipe.settings.max_parallel_steps` when set.
    pub max_parallel_steps: Option<usize>,
    /// Overrides `recipe.settings.timeout_ms` when set.
    pub global_timeout_ms: Option<u64>,
    pub progress: Option<ProgressCallback>,
    /// Normalized sources of every Recipe-tool composition on the current
    /// call stack (§4.5 "the engine records the source of S's sub-recipe
    /// in a stack"), threaded into every `StepContext` this run builds so
    /// the Recipe tool's re-entrancy check actually sees it.
    pub recipe_ancestry: Vec<String>,
}

impl ExecutionOptions {
    pub fn emit(&self, event: ProgressEvent) {
        if let Some(cb) = &self.progress {
            cb(event);
        }
    }
}

impl std::fmt::Debug for ExecutionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionOptions")
            .field("dry_run", &self.dry_run)
            .field("force", &self.force)
            .field("max_parallel_steps", &self.max_parallel_steps)
            .field("global_timeout_ms", &self.global_timeout_ms)
            .field("progress", &self.progress.is_some())
            .field("recipe_ancestry", &self.recipe_ancestry)
            .finish()
    }
}
