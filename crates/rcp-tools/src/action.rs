//! The Action Tool (§4.3): dispatches to a named, user-supplied procedure
//! registered out-of-band by the caller. The engine never loads code
//! itself; registration is the driver's responsibility.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rcp_core::{DocPath, ErrorCode, FileChanges, Problem, Step, StepContext, ToolFields, Value};
use rcp_scheduler::{StepExecutor, StepOutput};

/// What a registered action receives: merged parameters (step-local
/// values win over recipe variables of the same name) plus a filesystem
/// root and the step's dry-run/force flags. Actions are pure functions of
/// this plus disk state — any other side effect is untracked (§4.3).
pub struct ActionInput<'a> {
    pub parameters: &'a BTreeMap<String, Value>,
    pub variables: &'a rcp_core::VariableMap,
    pub working_dir: &'a std::path::Path,
    pub dry_run: bool,
    pub force: bool,
}

#[async_trait]
pub trait Action: Send + Sync {
    async fn run(&self, input: ActionInput<'_>) -> Result<StepOutput, String>;
}

#[derive(Default)]
pub struct ActionRegistry {
    actions: BTreeMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, action: Arc<dyn Action>) -> &mut Self {
        self.actions.insert(name.into(), action);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }
}

pub struct ActionTool {
    registry: Arc<ActionRegistry>,
}

impl ActionTool {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl StepExecutor for ActionTool {
    async fn validate(&self, step: &Step, _ctx: &StepContext) -> Vec<Problem> {
        let ToolFields::Action(fields) = &step.fields else {
            return vec![Problem::new(ErrorCode::InvalidParameters(format!(
                "step '{}' is not an action step",
                step.name
            )))];
        };
        if !self.registry.contains(&fields.action) {
            return vec![Problem::new(ErrorCode::UnknownAction(fields.action.clone()))
                .at(DocPath::root().field("action"))];
        }
        Vec::new()
    }

    async fn execute(&self, step: &Step, ctx: &StepContext) -> Result<StepOutput, Problem> {
        let ToolFields::Action(fields) = &step.fields else {
            return Err(Problem::new(ErrorCode::InvalidParameters(format!(
                "step '{}' is not an action step",
                step.name
            ))));
        };
        let action = self
            .registry
            .get(&fields.action)
            .ok_or_else(|| Problem::new(ErrorCode::UnknownAction(fields.action.clone())))?;

        let input = ActionInput {
            parameters: &fields.parameters,
            variables: &ctx.variables,
            working_dir: &ctx.working_dir,
            dry_run: ctx.dry_run,
            force: ctx.force,
        };
        action
            .run(input)
            .await
            .map_err(|message| Problem::new(ErrorCode::StepFailed(message)))
    }
}
