//! End-to-end scenarios (§8 "End-to-end scenarios") driven through
//! the public `Engine` surface rather than any single crate's internals —
//! `resolve_and_load` → `resolve_variables` → `execute`, exactly as a
//! driver would call it, against real recipe documents on disk.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rcp_core::{RecipeStatus, StepStatus, Value};
use rcp_engine::{Engine, EngineOptions, Options, VariableInputs};
use rcp_tools::{Action, ActionInput, ActionRegistry, CustomTransformRegistry};
use tempfile::tempdir;

fn engine(state_dir: &Path, actions: ActionRegistry) -> Engine {
    let mut config = EngineOptions::defaults(Arc::new(actions), Arc::new(CustomTransformRegistry::new()));
    config.cache_root = state_dir.join("cache");
    config.lock_path = state_dir.join("trust.lock");
    config.trust_store_path = state_dir.join("trust.toml");
    Engine::new(config)
}

fn write_recipe(dir: &Path, body: &str) {
    std::fs::write(dir.join("recipe.toml"), body).unwrap();
}

/// S1. Simple template write: one Template step, `[name].tsx` source,
/// `name = "Button"` → `files_created` ends with `src/components/Button.tsx`.
#[tokio::test]
async fn s1_simple_template_write() {
    let project = tempdir().unwrap();
    let template_src = project.path().join("templates/component");
    std::fs::create_dir_all(&template_src).unwrap();
    std::fs::write(template_src.join("[name].tsx"), "export const {{ name }} = () => null;").unwrap();

    write_recipe(
        project.path(),
        &format!(
            r#"
name = "scaffold-component"
version = "1.0.0"

[variables.name]
type = "string"
required = true

[[steps]]
name = "write-component"
tool = "template"
template = "{}"
output_dir = "src/components"
"#,
            template_src.display().to_string().replace('\\', "/")
        ),
    );

    let state_dir = tempdir().unwrap();
    let engine = engine(state_dir.path(), ActionRegistry::new());
    let recipe = engine
        .resolve_and_load(project.path().to_str().unwrap(), &Options::default())
        .unwrap();

    let mut inputs = VariableInputs::default();
    inputs.overrides.insert("name".into(), Value::String("Button".into()));
    let resolved = engine.resolve_variables(&recipe, &inputs, &Options::default()).unwrap();

    let mut options = Options::default();
    options.working_dir = Some(project.path().to_path_buf());
    let result = engine.execute(&recipe, &resolved, &options).await;

    assert_eq!(result.status, RecipeStatus::Ok);
    assert_eq!(result.files.created.len(), 1);
    let created = &result.files.created[0];
    assert!(
        created.ends_with("src/components/Button.tsx"),
        "expected src/components/Button.tsx, got {}",
        created.display()
    );
    assert!(std::fs::read_to_string(created).unwrap().contains("Button"));
}

/// S2. Conditional skip: step B has `when: include_tests == true`,
/// `include_tests = false` → B skipped, A unaffected, recipe `ok`.
#[tokio::test]
async fn s2_conditional_skip() {
    let project = tempdir().unwrap();
    write_recipe(
        project.path(),
        r#"
name = "maybe-tests"
version = "1.0.0"

[variables.include_tests]
type = "boolean"
default = false

[[steps]]
name = "a"
tool = "action"
action = "noop"

[[steps]]
name = "b"
tool = "action"
action = "noop"
when = "include_tests == true"
"#,
    );

    let mut actions = ActionRegistry::new();
    actions.register("noop", Arc::new(Noop));
    let state_dir = tempdir().unwrap();
    let engine = engine(state_dir.path(), actions);

    let recipe = engine
        .resolve_and_load(project.path().to_str().unwrap(), &Options::default())
        .unwrap();
    let mut call_options = Options::default();
    call_options.skip_prompts = true;
    let resolved = engine
        .resolve_variables(&recipe, &VariableInputs::default(), &call_options)
        .unwrap();

    let mut options = Options::default();
    options.working_dir = Some(project.path().to_path_buf());
    let result = engine.execute(&recipe, &resolved, &options).await;

    assert_eq!(result.status, RecipeStatus::Ok);
    let a = result.steps.iter().find(|s| s.name == "a").unwrap();
    let b = result.steps.iter().find(|s| s.name == "b").unwrap();
    assert_eq!(a.status, StepStatus::Ok);
    assert_eq!(b.status, StepStatus::Skipped);
}

/// S3. Parallel batch with one transient failure that succeeds on retry:
/// all three end `ok`, the flaky one's `retries_used == 1`.
#[tokio::test]
async fn s3_parallel_batch_retries_to_success() {
    let project = tempdir().unwrap();
    write_recipe(
        project.path(),
        r#"
name = "fan-out"
version = "1.0.0"

[[steps]]
name = "a"
tool = "action"
action = "noop"

[[steps]]
name = "p1"
tool = "action"
action = "noop"
parallel = true
depends_on = ["a"]

[[steps]]
name = "p2"
tool = "action"
action = "flaky"
parallel = true
depends_on = ["a"]
continue_on_error = true
retries = 1

[[steps]]
name = "p3"
tool = "action"
action = "noop"
parallel = true
depends_on = ["a"]
"#,
    );

    let mut actions = ActionRegistry::new();
    actions.register("noop", Arc::new(Noop));
    actions.register(
        "flaky",
        Arc::new(FailsOnceThenOk {
            remaining: AtomicU32::new(1),
        }),
    );
    let state_dir = tempdir().unwrap();
    let engine = engine(state_dir.path(), actions);

    let recipe = engine
        .resolve_and_load(project.path().to_str().unwrap(), &Options::default())
        .unwrap();
    let resolved = engine
        .resolve_variables(&recipe, &VariableInputs::default(), &Options::default())
        .unwrap();

    let mut options = Options::default();
    options.working_dir = Some(project.path().to_path_buf());
    let result = engine.execute(&recipe, &resolved, &options).await;

    assert_eq!(result.status, RecipeStatus::Ok);
    assert!(result.steps.iter().all(|s| s.status == StepStatus::Ok));
    let p2 = result.steps.iter().find(|s| s.name == "p2").unwrap();
    assert_eq!(p2.retries_used, 1);
}

/// S4. Cycle detected: `validate` (here, `resolve_and_load`, which parses
/// and semantically validates in one step) rejects the recipe and
/// `execute` is never reached.
#[tokio::test]
async fn s4_cycle_detected_before_execution() {
    let project = tempdir().unwrap();
    write_recipe(
        project.path(),
        r#"
name = "broken"
version = "1.0.0"

[[steps]]
name = "x"
tool = "action"
action = "noop"
depends_on = ["y"]

[[steps]]
name = "y"
tool = "action"
action = "noop"
depends_on = ["z"]

[[steps]]
name = "z"
tool = "action"
action = "noop"
depends_on = ["x"]
"#,
    );

    let state_dir = tempdir().unwrap();
    let engine = engine(state_dir.path(), ActionRegistry::new());
    let err = engine
        .resolve_and_load(project.path().to_str().unwrap(), &Options::default())
        .unwrap_err();
    assert!(!err.problems.is_empty());
    assert!(err
        .problems
        .iter()
        .any(|p| matches!(p.code, rcp_core::ErrorCode::CycleInDependencies(_))));
}

/// S5. Sub-recipe composition with override: parent `name = "UserAPI"`
/// inherited into the child, `variable_overrides: { framework: "express" }`
/// wins over the child's own default.
#[tokio::test]
async fn s5_subrecipe_composition_with_override() {
    let project = tempdir().unwrap();
    let child_dir = project.path().join("child");
    std::fs::create_dir_all(&child_dir).unwrap();
    write_recipe(
        &child_dir,
        r#"
name = "api-skeleton"
version = "1.0.0"

[variables.name]
type = "string"
required = true

[variables.framework]
type = "string"
default = "fastify"

[[steps]]
name = "touch"
tool = "action"
action = "record"
"#,
    );

    write_recipe(
        project.path(),
        &format!(
            r#"
name = "parent"
version = "1.0.0"

[variables.name]
type = "string"
required = true

[[steps]]
name = "compose"
tool = "recipe"
recipe = "{}"
inherit_variables = true

[steps.variable_overrides]
framework = "express"
"#,
            child_dir.display().to_string().replace('\\', "/")
        ),
    );

    let recorded = Arc::new(std::sync::Mutex::new(Vec::new()));
    let mut actions = ActionRegistry::new();
    actions.register("record", Arc::new(RecordVariables { sink: recorded.clone() }));
    let state_dir = tempdir().unwrap();
    let engine = engine(state_dir.path(), actions);

    let recipe = engine
        .resolve_and_load(project.path().to_str().unwrap(), &Options::default())
        .unwrap();
    let mut inputs = VariableInputs::default();
    inputs.overrides.insert("name".into(), Value::String("UserAPI".into()));
    let resolved = engine.resolve_variables(&recipe, &inputs, &Options::default()).unwrap();

    let mut options = Options::default();
    options.working_dir = Some(project.path().to_path_buf());
    let result = engine.execute(&recipe, &resolved, &options).await;

    assert_eq!(result.status, RecipeStatus::Ok);
    let seen = recorded.lock().unwrap();
    let seen = seen.first().expect("record action should have run once");
    assert_eq!(seen.get("name"), Some(&Value::String("UserAPI".into())));
    assert_eq!(seen.get("framework"), Some(&Value::String("express".into())));
}

/// S6. Idempotent codemod: a file already containing the target import
/// yields `skipped` with no modification and no backup.
#[tokio::test]
async fn s6_idempotent_add_import_codemod() {
    let project = tempdir().unwrap();
    let src_dir = project.path().join("src");
    std::fs::create_dir_all(&src_dir).unwrap();
    std::fs::write(src_dir.join("App.tsx"), "import React from 'react';\n\nexport const App = () => null;\n").unwrap();

    write_recipe(
        project.path(),
        r#"
name = "add-react-import"
version = "1.0.0"

[[steps]]
name = "import-react"
tool = "codemod"
codemod = "add-import"
files = ["src/**/*.tsx"]

[steps.parameters]
import = "React"
from = "react"
import_type = "default"
"#,
    );

    let state_dir = tempdir().unwrap();
    let engine = engine(state_dir.path(), ActionRegistry::new());
    let recipe = engine
        .resolve_and_load(project.path().to_str().unwrap(), &Options::default())
        .unwrap();
    let resolved = engine
        .resolve_variables(&recipe, &VariableInputs::default(), &Options::default())
        .unwrap();

    let mut options = Options::default();
    options.working_dir = Some(project.path().to_path_buf());
    let result = engine.execute(&recipe, &resolved, &options).await;

    assert_eq!(result.status, RecipeStatus::Ok);
    assert!(result.files.modified.is_empty());
    assert!(result.files.created.is_empty());
    let bak_count = std::fs::read_dir(&src_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".bak."))
        .count();
    assert_eq!(bak_count, 0, "idempotent skip must not create a backup");
}

/// Boundary: empty `steps` list produces `ok` with zero file changes.
#[tokio::test]
async fn empty_recipe_runs_to_ok_with_no_changes() {
    let project = tempdir().unwrap();
    write_recipe(
        project.path(),
        r#"
name = "nothing"
version = "1.0.0"
steps = []
"#,
    );

    let state_dir = tempdir().unwrap();
    let engine = engine(state_dir.path(), ActionRegistry::new());
    let recipe = engine
        .resolve_and_load(project.path().to_str().unwrap(), &Options::default())
        .unwrap();
    let resolved = engine
        .resolve_variables(&recipe, &VariableInputs::default(), &Options::default())
        .unwrap();
    let mut options = Options::default();
    options.working_dir = Some(project.path().to_path_buf());
    let result = engine.execute(&recipe, &resolved, &options).await;

    assert_eq!(result.status, RecipeStatus::Ok);
    assert!(result.files.is_empty());
    assert!(result.steps.is_empty());
}

// ---------------------------------------------------------------------------
// Shared action stubs
// ---------------------------------------------------------------------------

struct Noop;

#[async_trait]
impl Action for Noop {
    async fn run(&self, _input: ActionInput<'_>) -> Result<rcp_scheduler::StepOutput, String> {
        Ok(rcp_scheduler::StepOutput::new(rcp_core::FileChanges::new()))
    }
}

struct FailsOnceThenOk {
    remaining: AtomicU32,
}

#[async_trait]
impl Action for FailsOnceThenOk {
    async fn run(&self, _input: ActionInput<'_>) -> Result<rcp_scheduler::StepOutput, String> {
        if self.remaining.fetch_sub(1, Ordering::SeqCst) > 0 {
            Err("transient failure".to_string())
        } else {
            Ok(rcp_scheduler::StepOutput::new(rcp_core::FileChanges::new()))
        }
    }
}

struct RecordVariables {
    sink: Arc<std::sync::Mutex<Vec<BTreeMap<String, Value>>>>,
}

#[async_trait]
impl Action for RecordVariables {
    async fn run(&self, input: ActionInput<'_>) -> Result<rcp_scheduler::StepOutput, String> {
        self.sink.lock().unwrap().push(input.variables.as_flat_map());
        Ok(rcp_scheduler::StepOutput::new(rcp_core::FileChanges::new()))
    }
}
