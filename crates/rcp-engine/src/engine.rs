//! The top-level callable surface (§6.3): wires the parser, resolver,
//! source resolver, scheduler, and tool registry together behind the six
//! operations a driver calls. This crate is itself a library; no CLI
//! front-end lives here (§1 places that out of scope).

use std::collections::BTreeMap;
use std::path::PathBuf;

use rcp_core::{ErrorCode, Problem, Recipe, RecipeResult, StructuredError, Value, VariableMap};
use rcp_resolver::{NoPrompt, ParentInheritance, PromptChannel, ResolutionInputs};
use rcp_scheduler::{ExecutionOptions, Scheduler, ToolRegistry};
use rcp_source::{Cache, GcReport, TrustRecord, TrustStore};
use rcp_tools::RecipeSourceOptions;
use std::sync::Arc;

use crate::info::{self, RecipeInfo, StepInfo};
use crate::options::{EngineOptions, Options};
use crate::visualize::DependencyGraph;

/// The caller-supplied sources of a variable resolution pass (spec §4.7
/// sources 1–4, 6 — source 5, the per-variable `default`, lives on the
/// recipe itself and needs nothing from the driver).
#[derive(Default)]
pub struct VariableInputs {
    pub overrides: BTreeMap<String, Value>,
    pub positional: Vec<Value>,
    pub parent_variables: Option<VariableMap>,
    pub parent_mapping: BTreeMap<String, String>,
    pub example_name: Option<String>,
}

pub struct Engine {
    registry: Arc<ToolRegistry>,
    source_options: RecipeSourceOptions,
    default_max_parallel_steps: usize,
}

impl Engine {
    pub fn new(config: EngineOptions) -> Self {
        let source_options = RecipeSourceOptions {
            cache_root: config.cache_root,
            lock_path: config.lock_path,
            trust_store_path: config.trust_store_path,
            interactive: config.interactive,
            prompt: config.trust_prompt,
            ttl: config.cache_ttl,
        };
        let registry = rcp_tools::build_registry(config.actions, config.custom_transforms, source_options.clone());
        Self {
            registry,
            source_options,
            default_max_parallel_steps: config.default_max_parallel_steps,
        }
    }

    /// `resolve_and_load(recipe_ref, options) → Recipe` (§6.3): resolves
    /// `recipe_ref` through the source resolver (component A) and parses
    /// the result (component B). The same two operations the Recipe tool
    /// performs for a sub-recipe (§4.5), here entered from the top.
    pub fn resolve_and_load(&self, recipe_ref: &str, _options: &Options) -> Result<Recipe, StructuredError> {
        let resolver_opts = rcp_source::SourceResolverOptions {
            cache_root: self.source_options.cache_root.clone(),
            lock_path: self.source_options.lock_path.clone(),
            trust_store_path: self.source_options.trust_store_path.clone(),
            interactive: self.source_options.interactive,
            prompt: self.source_options.prompt.as_ref(),
            ttl: self.source_options.ttl,
        };
        let resolved = rcp_source::resolve(recipe_ref, &resolver_opts, chrono::Utc::now())
            .map_err(|code| StructuredError::single(Problem::new(code)))?;

        let document_path = if resolved.path.is_dir() {
            resolved.path.join("recipe.toml")
        } else {
            resolved.path.clone()
        };
        let bytes = std::fs::read(&document_path).map_err(|e| {
            StructuredError::single(Problem::new(ErrorCode::FetchFailed(format!(
                "{}: {e}",
                document_path.display()
            ))))
        })?;
        rcp_parser::parse(&bytes, &document_path.to_string_lossy())
    }

    /// `resolve_variables(recipe, inputs, options) → ResolvedVariables`
    /// (§6.3, §4.7).
    pub fn resolve_variables(
        &self,
        recipe: &Recipe,
        inputs: &VariableInputs,
        options: &Options,
    ) -> Result<VariableMap, StructuredError> {
        let parent = inputs.parent_variables.as_ref().map(|variables| ParentInheritance {
            variables,
            mapping: &inputs.parent_mapping,
        });
        let resolver_inputs = ResolutionInputs {
            overrides: inputs.overrides.clone(),
            positional: inputs.positional.clone(),
            parent,
            example_name: inputs.example_name.as_deref(),
            skip_prompts: options.skip_prompts,
        };
        let no_prompt = NoPrompt;
        let prompt: &dyn PromptChannel = match &options.interactive_channel {
            Some(channel) => channel.as_ref(),
            None => &no_prompt,
        };
        rcp_resolver::resolve(recipe, &resolver_inputs, prompt)
    }

    /// `execute(recipe, resolved, options) → RecipeResult` (§6.3, §4.6).
    pub async fn execute(&self, recipe: &Recipe, resolved: &VariableMap, options: &Options) -> RecipeResult {
        let working_dir = options
            .working_dir
            .clone()
            .or_else(|| recipe.settings.working_dir.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        let exec_options = ExecutionOptions {
            dry_run: options.dry_run,
            force: options.force,
            max_parallel_steps: options.max_parallel_steps.or(Some(self.default_max_parallel_steps)),
            global_timeout_ms: options.global_timeout_ms,
            progress: options.progress_callback.clone(),
            recipe_ancestry: Vec::new(),
        };

        let scheduler = Scheduler::new(self.registry.clone());
        scheduler.run(recipe, resolved, working_dir, &exec_options).await
    }

    /// `validate(recipe) → list<Problem>` (§6.3, §4.1). Re-runs the same
    /// semantic validation `rcp-parser::parse` already applies, so a
    /// driver that already has a parsed `Recipe` (e.g. one it built via a
    /// constructor API rather than `resolve_and_load`) can validate it
    /// without re-parsing.
    pub fn validate(&self, recipe: &Recipe) -> Vec<Problem> {
        rcp_parser::validate::semantic_validate(recipe)
    }

    /// `list_steps(recipe) → list<StepInfo>` (§6.3).
    pub fn list_steps(&self, recipe: &Recipe) -> Vec<StepInfo> {
        info::list_steps(recipe)
    }

    /// `show_info(recipe) → RecipeInfo` (§6.3, §C.1).
    pub fn show_info(&self, recipe: &Recipe) -> RecipeInfo {
        info::show_info(recipe)
    }

    /// `visualize(recipe) → DependencyGraph` (§C.2, not named by
    /// the operation contract but implied by `list_steps`/`show_info` existing to feed
    /// a driver's own rendering).
    pub fn visualize(&self, recipe: &Recipe) -> DependencyGraph {
        DependencyGraph::from_recipe(recipe)
    }

    /// Evict stale floating-reference cache entries (§C.3, §6.5).
    pub fn gc_cache(&self) -> anyhow::Result<GcReport> {
        let cache = Cache::new(self.source_options.cache_root.clone());
        cache.gc(self.source_options.ttl, chrono::Utc::now())
    }

    /// List every recorded trust decision (§C.3, §6.4).
    pub fn list_trust(&self) -> anyhow::Result<Vec<TrustRecord>> {
        let store = TrustStore::load(&self.source_options.trust_store_path)?;
        Ok(store.list())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcp_tools::{ActionRegistry, CustomTransformRegistry};

    fn test_engine(dir: &std::path::Path) -> Engine {
        let mut config = EngineOptions::defaults(Arc::new(ActionRegistry::new()), Arc::new(CustomTransformRegistry::new()));
        config.cache_root = dir.join("cache");
        config.lock_path = dir.join("trust.lock");
        config.trust_store_path = dir.join("trust.toml");
        Engine::new(config)
    }

    fn recipe_source(body: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("recipe.toml"), body).unwrap();
        dir
    }

    #[test]
    fn resolve_and_load_parses_a_local_recipe() {
        let state_dir = tempfile::tempdir().unwrap();
        let engine = test_engine(state_dir.path());
        let source = recipe_source(
            r#"
name = "demo"
version = "1.0.0"
"#,
        );
        let recipe = engine
            .resolve_and_load(source.path().to_str().unwrap(), &Options::default())
            .unwrap();
        assert_eq!(recipe.name, "demo");
    }

    #[test]
    fn validate_surfaces_semantic_problems() {
        let state_dir = tempfile::tempdir().unwrap();
        let engine = test_engine(state_dir.path());
        let source = recipe_source(
            r#"
name = "demo"
version = "1.0.0"

[[steps]]
name = "a"
tool = "action"
action = "noop"
depends_on = ["missing"]
"#,
        );
        // rcp_parser::parse already validates; build a Recipe by hand to
        // exercise the engine's standalone `validate` entry point.
        let recipe = Recipe {
            name: "demo".into(),
            version: "1.0.0".into(),
            description: None,
            author: None,
            variables: Default::default(),
            settings: Default::default(),
            steps: vec![rcp_core::Step {
                name: "a".into(),
                tool: rcp_core::ToolKind::Action,
                when: None,
                depends_on: vec!["missing".into()],
                parallel: false,
                continue_on_error: false,
                timeout_ms: None,
                retries: 0,
                fields: rcp_core::ToolFields::Action(rcp_core::ActionStep {
                    action: "noop".into(),
                    parameters: Default::default(),
                }),
            }],
            examples: Vec::new(),
        };
        let problems = engine.validate(&recipe);
        assert!(!problems.is_empty());
        let _ = source;
    }

    #[tokio::test]
    async fn execute_runs_an_empty_recipe_to_ok() {
        let state_dir = tempfile::tempdir().unwrap();
        let engine = test_engine(state_dir.path());
        let recipe = Recipe {
            name: "demo".into(),
            version: "1.0.0".into(),
            description: None,
            author: None,
            variables: Default::default(),
            settings: Default::default(),
            steps: Vec::new(),
            examples: Vec::new(),
        };
        let result = engine.execute(&recipe, &VariableMap::new(), &Options::default()).await;
        assert_eq!(result.status, rcp_core::RecipeStatus::Ok);
    }
}
