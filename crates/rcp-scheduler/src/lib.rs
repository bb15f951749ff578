//! Layered step scheduling (spec §4.6 + §5): builds the Ready set for each
//! round from the steps whose dependencies are already `Completed`, splits
//! Ready into a serial batch (document order, one at a time) and a
//! parallel batch (semaphore-bounded concurrency), and repeats until every
//! step is either executed or skipped.
//!
//! Cycle detection and a flat topological order already live in
//! `rcp_core::dag` and are used by `rcp-parser` at validation time — by
//! the time a `Recipe` reaches this crate it is known acyclic. What this
//! crate adds is the per-round Ready/Completed wavefront that `when`
//! evaluation, retries, and bounded parallelism all hang off of.

pub mod executor;
pub mod options;
pub mod registry;

pub use executor::{StepExecutor, StepOutput};
pub use options::{ExecutionOptions, ProgressCallback};
pub use registry::ToolRegistry;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rcp_core::{
    CancellationToken, ErrorCode, FileChanges, Problem, ProgressEvent, Recipe, RecipeResult,
    RecipeStatus, Step, StepContext, StepResult, StepStatus, VariableMap,
};

const RETRY_BACKOFF_UNIT_MS: u64 = 250;
const RETRY_BACKOFF_CAP_MS: u64 = 2000;

/// Runs a single recipe's steps to completion against a [`ToolRegistry`].
pub struct Scheduler {
    registry: Arc<ToolRegistry>,
}

impl Scheduler {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Executes every step of `recipe` against `variables`, returning the
    /// aggregated [`RecipeResult`]. Never panics on a step failure — a
    /// failing step is recorded and, unless `continue_on_error` applies,
    /// short-circuits the remaining `Pending` steps to `Skipped`.
    pub async fn run(
        &self,
        recipe: &Recipe,
        variables: &VariableMap,
        working_dir: PathBuf,
        options: &ExecutionOptions,
    ) -> RecipeResult {
        let started = Instant::now();
        let cancellation = CancellationToken::new();
        let recipe_timeout_ms = options.global_timeout_ms.or(recipe.settings.timeout_ms);
        let recipe_deadline = recipe_timeout_ms.map(|ms| started + Duration::from_millis(ms));
        let max_parallel = options
            .max_parallel_steps
            .unwrap_or(recipe.settings.max_parallel_steps as usize)
            .max(1);

        let doc_order: HashMap<&str, usize> = recipe
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.as_str(), i))
            .collect();

        let mut pending: HashSet<String> = recipe.steps.iter().map(|s| s.name.clone()).collect();
        let mut completed: HashSet<String> = HashSet::new();
        let mut result = RecipeResult::new();
        let semaphore = Arc::new(tokio::sync::Semaphore::new(max_parallel));

        'rounds: while !pending.is_empty() {
            if let Some(deadline) = recipe_deadline {
                if Instant::now() >= deadline {
                    tracing::warn!(recipe = %recipe.name, "recipe execution timed out");
                    cancellation.cancel();
                    let mut remaining: Vec<String> = pending.drain().collect();
                    remaining.sort_by_key(|name| doc_order.get(name.as_str()).copied().unwrap_or(usize::MAX));
                    for name in remaining {
                        result.record(StepResult::skipped(name.clone()));
                        options.emit(ProgressEvent::StepSkipped { step: name });
                    }
                    result.mark_timed_out();
                    break 'rounds;
                }
            }

            let mut ready: Vec<&Step> = recipe
                .steps
                .iter()
                .filter(|s| pending.contains(&s.name) && s.depends_on.iter().all(|d| completed.contains(d)))
                .collect();
            ready.sort_by_key(|s| doc_order[s.name.as_str()]);

            if ready.is_empty() {
                // Every remaining step still waits on a dependency that
                // will never complete. A validated recipe can't reach
                // this, but bail rather than spin forever.
                tracing::error!(recipe = %recipe.name, "scheduler stalled with unreachable steps");
                break 'rounds;
            }

            let mut runnable: Vec<&Step> = Vec::new();
            for step in ready {
                if let Some(when) = &step.when {
                    let truthy = rcp_expr::evaluate(when, variables).unwrap_or(false);
                    if !truthy {
                        pending.remove(&step.name);
                        completed.insert(step.name.clone());
                        result.record(StepResult::skipped(step.name.clone()));
                        options.emit(ProgressEvent::StepSkipped { step: step.name.clone() });
                        continue;
                    }
                }
                runnable.push(step);
            }

            let (serial, parallel): (Vec<&Step>, Vec<&Step>) =
                runnable.into_iter().partition(|s| !s.parallel);

            for step in serial {
                options.emit(ProgressEvent::StepStarted { step: step.name.clone() });
                let step_result = run_step_with_retry(
                    self.registry.clone(),
                    step.clone(),
                    variables.clone(),
                    working_dir.clone(),
                    options.dry_run,
                    options.force,
                    options.recipe_ancestry.clone(),
                    recipe_deadline,
                )
                .await;
                let status = step_result.status;
                options.emit(ProgressEvent::StepCompleted {
                    step: step.name.clone(),
                    status,
                });
                pending.remove(&step.name);
                completed.insert(step.name.clone());
                let failed = matches!(status, StepStatus::Failed | StepStatus::TimedOut);
                result.record(step_result);
                if failed && !effective_continue_on_error(step, recipe) {
                    skip_remaining(&mut pending, &doc_order, &mut result, options);
                    break 'rounds;
                }
            }

            if !parallel.is_empty() {
                let mut handles = Vec::with_capacity(parallel.len());
                for step in &parallel {
                    options.emit(ProgressEvent::StepStarted { step: step.name.clone() });
                    let permit = semaphore
                        .clone()
                        .acquire_owned()
                        .await
                        .expect("scheduler semaphore is never closed");
                    let registry = self.registry.clone();
                    let step = (*step).clone();
                    let variables = variables.clone();
                    let working_dir = working_dir.clone();
                    let dry_run = options.dry_run;
                    let force = options.force;
                    let recipe_ancestry = options.recipe_ancestry.clone();
                    handles.push(tokio::spawn(async move {
                        let _permit = permit;
                        let result = run_step_with_retry(
                            registry,
                            step.clone(),
                            variables,
                            working_dir,
                            dry_run,
                            force,
                            recipe_ancestry,
                            recipe_deadline,
                        )
                        .await;
                        (step.name, result)
                    }));
                }

                let mut batch_results = Vec::with_capacity(handles.len());
                for handle in handles {
                    match handle.await {
                        Ok((name, step_result)) => batch_results.push((name, step_result)),
                        Err(join_error) => {
                            tracing::error!(error = %join_error, "parallel step task panicked");
                        }
                    }
                }
                batch_results.sort_by_key(|(name, _)| doc_order.get(name.as_str()).copied().unwrap_or(usize::MAX));

                detect_parallel_conflicts(&mut batch_results);

                let mut any_fatal_failure = false;
                for (name, step_result) in batch_results {
                    let status = step_result.status;
                    options.emit(ProgressEvent::StepCompleted { step: name.clone(), status });
                    pending.remove(&name);
                    completed.insert(name.clone());
                    let step = recipe.step(&name);
                    let failed = matches!(status, StepStatus::Failed | StepStatus::TimedOut);
                    let continue_anyway = step.map(|s| effective_continue_on_error(s, recipe)).unwrap_or(false);
                    result.record(step_result);
                    if failed && !continue_anyway {
                        any_fatal_failure = true;
                    }
                }
                if any_fatal_failure {
                    skip_remaining(&mut pending, &doc_order, &mut result, options);
                    break 'rounds;
                }
            }
        }

        result.duration = started.elapsed();
        options.emit(ProgressEvent::RecipeCompleted { status: result.status });
        result
    }
}

fn effective_continue_on_error(step: &Step, recipe: &Recipe) -> bool {
    step.continue_on_error || recipe.settings.continue_on_error
}

fn skip_remaining(
    pending: &mut HashSet<String>,
    doc_order: &HashMap<&str, usize>,
    result: &mut RecipeResult,
    options: &ExecutionOptions,
) {
    let mut remaining: Vec<String> = pending.drain().collect();
    remaining.sort_by_key(|name| doc_order.get(name.as_str()).copied().unwrap_or(usize::MAX));
    for name in remaining {
        result.record(StepResult::skipped(name.clone()));
        options.emit(ProgressEvent::StepSkipped { step: name });
    }
}

/// Two parallel steps that both touch the same path are detected only
/// lazily, after the batch finishes (§5 "Shared-resource policy"): the
/// first writer (by document order) keeps its result, later writers to
/// the same path are downgraded to a conflict failure.
fn detect_parallel_conflicts(batch: &mut [(String, StepResult)]) {
    let mut claimed: HashSet<PathBuf> = HashSet::new();
    for (_, step_result) in batch.iter_mut() {
        if step_result.status != StepStatus::Ok {
            continue;
        }
        let touched = step_result.files.all_paths();
        let collision = touched.iter().find(|path| claimed.contains(*path)).cloned();
        if let Some(path) = collision {
            let name = step_result.name.clone();
            let duration = step_result.duration;
            *step_result = StepResult::failed(
                name,
                duration,
                Problem::new(ErrorCode::Conflict(path.display().to_string())),
                0,
            );
        } else {
            claimed.extend(touched);
        }
    }
}

async fn run_step_with_retry(
    registry: Arc<ToolRegistry>,
    step: Step,
    variables: VariableMap,
    working_dir: PathBuf,
    dry_run: bool,
    force: bool,
    recipe_ancestry: Vec<String>,
    recipe_deadline: Option<Instant>,
) -> StepResult {
    let started = Instant::now();
    let tool = match registry.get(step.tool) {
        Some(tool) => tool,
        None => {
            return StepResult::failed(
                step.name.clone(),
                started.elapsed(),
                Problem::new(ErrorCode::UnknownTool(format!("{:?}", step.tool))),
                0,
            );
        }
    };

    let mut attempt = 0u32;
    loop {
        // Each attempt gets its own fresh `CancellationToken` (from
        // `StepContext::new`), never shared with sibling steps or earlier
        // attempts of this same step — only the recipe-level deadline
        // check in `run` cancels its own shared token, and that token is
        // never threaded down here.
        let ctx = StepContext::new(variables.clone(), working_dir.clone())
            .with_dry_run(dry_run)
            .with_force(force)
            .with_recipe_ancestry(recipe_ancestry.clone());

        let problems = tool.validate(&step, &ctx).await;
        if let Some(problem) = problems.into_iter().next() {
            return StepResult::failed(step.name.clone(), started.elapsed(), problem, attempt);
        }

        let remaining_recipe_time = recipe_deadline.map(|d| d.saturating_duration_since(Instant::now()));
        let effective_timeout = match (step.timeout_ms.map(Duration::from_millis), remaining_recipe_time) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };

        let outcome = match effective_timeout {
            Some(bound) => tokio::time::timeout(bound, tool.execute(&step, &ctx)).await,
            None => Ok(tool.execute(&step, &ctx).await),
        };

        match outcome {
            Ok(Ok(output)) => {
                let mut step_result =
                    StepResult::ok(step.name.clone(), started.elapsed(), output.files);
                step_result.warnings = output.warnings;
                step_result.retries_used = attempt;
                return step_result;
            }
            Ok(Err(problem)) => {
                if attempt < step.retries {
                    attempt += 1;
                    tracing::debug!(step = %step.name, attempt, "retrying step after failure");
                    tokio::time::sleep(retry_backoff(attempt)).await;
                    continue;
                }
                return StepResult::failed(step.name.clone(), started.elapsed(), problem, attempt);
            }
            Err(_elapsed) => {
                ctx.cancellation.cancel();
                tracing::warn!(step = %step.name, "step timed out");
                if attempt < step.retries {
                    attempt += 1;
                    tokio::time::sleep(retry_backoff(attempt)).await;
                    continue;
                }
                return StepResult::timed_out(step.name.clone(), started.elapsed(), attempt);
            }
        }
    }
}

fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_millis((attempt as u64 * RETRY_BACKOFF_UNIT_MS).min(RETRY_BACKOFF_CAP_MS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rcp_core::{Settings, ToolKind};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn step(name: &str, tool: ToolKind) -> Step {
        Step {
            name: name.to_string(),
            tool,
            when: None,
            depends_on: Vec::new(),
            parallel: false,
            continue_on_error: false,
            timeout_ms: None,
            retries: 0,
            fields: rcp_core::ToolFields::Action(rcp_core::ActionStep {
                action: "noop".into(),
                parameters: Default::default(),
            }),
        }
    }

    fn recipe(steps: Vec<Step>) -> Recipe {
        Recipe {
            name: "demo".into(),
            version: "1.0.0".into(),
            description: None,
            author: None,
            variables: Default::default(),
            settings: Settings::default(),
            steps,
            examples: Vec::new(),
        }
    }

    struct AlwaysOk;

    #[async_trait]
    impl StepExecutor for AlwaysOk {
        async fn validate(&self, _step: &Step, _ctx: &StepContext) -> Vec<Problem> {
            Vec::new()
        }
        async fn execute(&self, _step: &Step, _ctx: &StepContext) -> Result<StepOutput, Problem> {
            Ok(StepOutput::new(FileChanges::new()))
        }
    }

    struct AlwaysFail;

    #[async_trait]
    impl StepExecutor for AlwaysFail {
        async fn validate(&self, _step: &Step, _ctx: &StepContext) -> Vec<Problem> {
            Vec::new()
        }
        async fn execute(&self, _step: &Step, _ctx: &StepContext) -> Result<StepOutput, Problem> {
            Err(Problem::new(ErrorCode::StepFailed("boom".into())))
        }
    }

    struct FailsNTimesThenOk {
        remaining: AtomicU32,
    }

    #[async_trait]
    impl StepExecutor for FailsNTimesThenOk {
        async fn validate(&self, _step: &Step, _ctx: &StepContext) -> Vec<Problem> {
            Vec::new()
        }
        async fn execute(&self, _step: &Step, _ctx: &StepContext) -> Result<StepOutput, Problem> {
            if self.remaining.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(Problem::new(ErrorCode::StepFailed("transient".into())))
            } else {
                Ok(StepOutput::new(FileChanges::new()))
            }
        }
    }

    #[tokio::test]
    async fn empty_recipe_produces_ok_result_with_no_files() {
        let registry = Arc::new(ToolRegistry::new());
        let scheduler = Scheduler::new(registry);
        let result = scheduler
            .run(&recipe(Vec::new()), &VariableMap::new(), PathBuf::from("/tmp"), &ExecutionOptions::default())
            .await;
        assert_eq!(result.status, RecipeStatus::Ok);
        assert!(result.files.is_empty());
        assert!(result.steps.is_empty());
    }

    #[tokio::test]
    async fn when_expression_false_skips_step_without_running_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolKind::Action, Arc::new(AlwaysFail));
        let mut s = step("maybe", ToolKind::Action);
        s.when = Some("false".to_string());
        let scheduler = Scheduler::new(Arc::new(registry));
        let result = scheduler
            .run(&recipe(vec![s]), &VariableMap::new(), PathBuf::from("/tmp"), &ExecutionOptions::default())
            .await;
        assert_eq!(result.status, RecipeStatus::Ok);
        assert_eq!(result.steps[0].status, StepStatus::Skipped);
    }

    #[tokio::test]
    async fn failed_step_skips_remaining_pending_steps() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolKind::Action, Arc::new(AlwaysFail));
        let first = step("first", ToolKind::Action);
        let mut second = step("second", ToolKind::Action);
        second.depends_on = vec!["first".to_string()];
        let scheduler = Scheduler::new(Arc::new(registry));
        let result = scheduler
            .run(&recipe(vec![first, second]), &VariableMap::new(), PathBuf::from("/tmp"), &ExecutionOptions::default())
            .await;
        assert_eq!(result.status, RecipeStatus::Failed);
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.steps[0].status, StepStatus::Failed);
        assert_eq!(result.steps[1].status, StepStatus::Skipped);
    }

    #[tokio::test]
    async fn continue_on_error_runs_subsequent_steps_after_a_failure() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolKind::Action, Arc::new(AlwaysFail));
        registry.register(ToolKind::Template, Arc::new(AlwaysOk));
        let mut first = step("first", ToolKind::Action);
        first.continue_on_error = true;
        let mut second = step("second", ToolKind::Template);
        second.depends_on = vec!["first".to_string()];
        let scheduler = Scheduler::new(Arc::new(registry));
        let result = scheduler
            .run(&recipe(vec![first, second]), &VariableMap::new(), PathBuf::from("/tmp"), &ExecutionOptions::default())
            .await;
        assert_eq!(result.steps[0].status, StepStatus::Failed);
        assert_eq!(result.steps[1].status, StepStatus::Ok);
    }

    #[tokio::test]
    async fn retries_are_exhausted_before_reporting_failure() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolKind::Action, Arc::new(AlwaysFail));
        let mut s = step("flaky", ToolKind::Action);
        s.retries = 2;
        let scheduler = Scheduler::new(Arc::new(registry));
        let result = scheduler
            .run(&recipe(vec![s]), &VariableMap::new(), PathBuf::from("/tmp"), &ExecutionOptions::default())
            .await;
        assert_eq!(result.steps[0].status, StepStatus::Failed);
        assert_eq!(result.steps[0].retries_used, 2);
    }

    #[tokio::test]
    async fn a_step_that_fails_twice_then_succeeds_reports_ok() {
        let mut registry = ToolRegistry::new();
        registry.register(
            ToolKind::Action,
            Arc::new(FailsNTimesThenOk {
                remaining: AtomicU32::new(2),
            }),
        );
        let mut s = step("flaky", ToolKind::Action);
        s.retries = 5;
        let scheduler = Scheduler::new(Arc::new(registry));
        let result = scheduler
            .run(&recipe(vec![s]), &VariableMap::new(), PathBuf::from("/tmp"), &ExecutionOptions::default())
            .await;
        assert_eq!(result.steps[0].status, StepStatus::Ok);
        assert_eq!(result.steps[0].retries_used, 2);
    }

    #[tokio::test]
    async fn parallel_batch_runs_all_independent_steps() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolKind::Action, Arc::new(AlwaysOk));
        let mut a = step("a", ToolKind::Action);
        a.parallel = true;
        let mut b = step("b", ToolKind::Action);
        b.parallel = true;
        let scheduler = Scheduler::new(Arc::new(registry));
        let result = scheduler
            .run(&recipe(vec![a, b]), &VariableMap::new(), PathBuf::from("/tmp"), &ExecutionOptions::default())
            .await;
        assert_eq!(result.status, RecipeStatus::Ok);
        assert_eq!(result.steps.len(), 2);
        assert!(result.steps.iter().all(|s| s.status == StepStatus::Ok));
    }

    #[tokio::test]
    async fn serial_siblings_run_in_document_order() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolKind::Action, Arc::new(AlwaysOk));
        let a = step("a", ToolKind::Action);
        let b = step("b", ToolKind::Action);
        let scheduler = Scheduler::new(Arc::new(registry));
        let result = scheduler
            .run(&recipe(vec![a, b]), &VariableMap::new(), PathBuf::from("/tmp"), &ExecutionOptions::default())
            .await;
        let names: Vec<&str> = result.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    struct WritesPath {
        path: PathBuf,
        kind_modified: bool,
    }

    #[async_trait]
    impl StepExecutor for WritesPath {
        async fn validate(&self, _step: &Step, _ctx: &StepContext) -> Vec<Problem> {
            Vec::new()
        }
        async fn execute(&self, _step: &Step, _ctx: &StepContext) -> Result<StepOutput, Problem> {
            let mut files = FileChanges::new();
            if self.kind_modified {
                files.modified.push(self.path.clone());
            } else {
                files.created.push(self.path.clone());
            }
            Ok(StepOutput::new(files))
        }
    }

    #[tokio::test]
    async fn conflicting_parallel_writes_leave_exactly_one_winner() {
        let mut registry = ToolRegistry::new();
        registry.register(
            ToolKind::Template,
            Arc::new(WritesPath {
                path: PathBuf::from("/tmp/shared.txt"),
                kind_modified: false,
            }),
        );
        registry.register(
            ToolKind::Action,
            Arc::new(WritesPath {
                path: PathBuf::from("/tmp/shared.txt"),
                kind_modified: true,
            }),
        );
        let mut a = step("a", ToolKind::Template);
        a.parallel = true;
        let mut b = step("b", ToolKind::Action);
        b.parallel = true;
        let scheduler = Scheduler::new(Arc::new(registry));
        let result = scheduler
            .run(&recipe(vec![a, b]), &VariableMap::new(), PathBuf::from("/tmp"), &ExecutionOptions::default())
            .await;
        let ok_count = result.steps.iter().filter(|s| s.status == StepStatus::Ok).count();
        let failed_count = result.steps.iter().filter(|s| s.status == StepStatus::Failed).count();
        assert_eq!(ok_count, 1);
        assert_eq!(failed_count, 1);
    }
}
