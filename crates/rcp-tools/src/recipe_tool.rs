//! The Recipe Tool (§4.5): treats another recipe as a composite step —
//! resolves its source via `rcp-source`, parses it, builds its variable
//! map from parent inheritance plus overrides, and runs it on a fresh
//! `Scheduler`. Re-entrancy into the same source anywhere on the current
//! call stack is rejected as a circular recipe reference.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use rcp_core::{DocPath, ErrorCode, Problem, RecipeStatus, Step, StepContext, StepStatus, ToolFields};
use rcp_scheduler::{ExecutionOptions, Scheduler, StepExecutor, StepOutput, ToolRegistry};
use rcp_source::TrustPrompt;

/// Everything the Recipe tool needs to resolve a sub-recipe's source,
/// factored out of `rcp_source::SourceResolverOptions` so it can be owned
/// (that type borrows a `&dyn TrustPrompt`).
#[derive(Clone)]
pub struct RecipeSourceOptions {
    pub cache_root: PathBuf,
    pub lock_path: PathBuf,
    pub trust_store_path: PathBuf,
    pub interactive: bool,
    pub prompt: Arc<dyn TrustPrompt>,
    pub ttl: Duration,
}

/// The Recipe tool needs a handle to the very registry it is part of (to
/// recurse into a fresh `Scheduler` for the child). That registry can't
/// exist yet when this tool is constructed, so the handle is bound once,
/// after the registry is fully assembled, via [`RecipeTool::bind_registry`].
pub struct RecipeTool {
    registry: OnceLock<Arc<ToolRegistry>>,
    source_options: RecipeSourceOptions,
}

impl RecipeTool {
    pub fn new(source_options: RecipeSourceOptions) -> Self {
        Self {
            registry: OnceLock::new(),
            source_options,
        }
    }

    pub fn bind_registry(&self, registry: Arc<ToolRegistry>) {
        let _ = self.registry.set(registry);
    }

    fn registry(&self) -> &Arc<ToolRegistry> {
        self.registry
            .get()
            .expect("RecipeTool::bind_registry must be called before execute")
    }
}

#[async_trait]
impl StepExecutor for RecipeTool {
    async fn validate(&self, step: &Step, _ctx: &StepContext) -> Vec<Problem> {
        let ToolFields::Recipe(fields) = &step.fields else {
            return vec![Problem::new(ErrorCode::InvalidParameters(format!(
                "step '{}' is not a recipe step",
                step.name
            )))];
        };
        if fields.recipe.trim().is_empty() {
            return vec![Problem::new(ErrorCode::InvalidParameters("recipe source must not be empty".into()))
                .at(DocPath::root().field("recipe"))];
        }
        Vec::new()
    }

    async fn execute(&self, step: &Step, ctx: &StepContext) -> Result<StepOutput, Problem> {
        let ToolFields::Recipe(fields) = &step.fields else {
            return Err(Problem::new(ErrorCode::InvalidParameters(format!(
                "step '{}' is not a recipe step",
                step.name
            ))));
        };

        if ctx.recipe_ancestry.iter().any(|source| source == &fields.recipe) {
            return Err(Problem::new(ErrorCode::CircularRecipeReference(fields.recipe.clone())));
        }

        let resolver_opts = rcp_source::SourceResolverOptions {
            cache_root: self.source_options.cache_root.clone(),
            lock_path: self.source_options.lock_path.clone(),
            trust_store_path: self.source_options.trust_store_path.clone(),
            interactive: self.source_options.interactive,
            prompt: self.source_options.prompt.as_ref(),
            ttl: self.source_options.ttl,
        };
        let resolved = rcp_source::resolve(&fields.recipe, &resolver_opts, chrono::Utc::now())
            .map_err(|code| Problem::new(code).at(DocPath::root().field("recipe")))?;

        let document_path = if resolved.path.is_dir() {
            resolved.path.join("recipe.toml")
        } else {
            resolved.path.clone()
        };
        let bytes = std::fs::read(&document_path)
            .map_err(|e| Problem::new(ErrorCode::FetchFailed(format!("{}: {e}", document_path.display()))))?;
        let child_recipe = rcp_parser::parse(&bytes, &document_path.to_string_lossy()).map_err(|errors| {
            errors
                .problems
                .into_iter()
                .next()
                .unwrap_or_else(|| Problem::new(ErrorCode::RecipeParseError(fields.recipe.clone())))
        })?;

        let parent_inheritance = fields.inherit_variables.then(|| rcp_resolver::ParentInheritance {
            variables: &ctx.variables,
            mapping: &fields.variable_mapping,
        });
        let inputs = rcp_resolver::ResolutionInputs {
            overrides: fields.variable_overrides.clone(),
            positional: Vec::new(),
            parent: parent_inheritance,
            example_name: None,
            skip_prompts: true,
        };
        let child_variables = rcp_resolver::resolve(&child_recipe, &inputs, &rcp_resolver::NoPrompt)
            .map_err(|errors| errors.problems.into_iter().next().unwrap_or_else(|| {
                Problem::new(ErrorCode::MissingRequiredVariable(fields.recipe.clone()))
            }))?;

        let child_working_dir = if fields.isolated {
            ctx.working_dir.join(&step.name)
        } else {
            ctx.working_dir.clone()
        };
        if fields.isolated {
            std::fs::create_dir_all(&child_working_dir).map_err(|e| {
                Problem::new(ErrorCode::PermissionDenied(format!("{}: {e}", child_working_dir.display())))
            })?;
        }

        let mut ancestry = ctx.recipe_ancestry.clone();
        ancestry.push(fields.recipe.clone());

        let scheduler = Scheduler::new(self.registry().clone());
        let child_options = ExecutionOptions {
            dry_run: ctx.dry_run,
            force: ctx.force,
            max_parallel_steps: None,
            global_timeout_ms: step.timeout_ms,
            progress: None,
            recipe_ancestry: ancestry,
        };
        let child_result = scheduler
            .run(&child_recipe, &child_variables, child_working_dir, &child_options)
            .await;

        let mut warnings: Vec<String> = child_result
            .steps
            .iter()
            .filter(|s| s.status != StepStatus::Ok)
            .map(|s| format!("sub-recipe step '{}': {:?}", s.name, s.status))
            .collect();
        warnings.extend(child_result.steps.iter().flat_map(|s| s.warnings.clone()));

        match child_result.status {
            RecipeStatus::Ok => {
                let mut output = StepOutput::new(child_result.files);
                output.warnings = warnings;
                Ok(output)
            }
            RecipeStatus::Failed => {
                let failed_count = child_result
                    .steps
                    .iter()
                    .filter(|s| s.status == StepStatus::Failed)
                    .count();
                Err(Problem::new(ErrorCode::StepFailed(format!(
                    "sub-recipe '{}' failed: {failed_count} step(s) failed",
                    child_recipe.name
                ))))
            }
            RecipeStatus::TimedOut => Err(Problem::new(ErrorCode::StepTimedOut(child_result.duration.as_millis() as u64))),
        }
    }
}
