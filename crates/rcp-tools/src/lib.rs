//! The four built-in tools (§4.2-§4.5), the path resolver they share
//! (component F), and parameter injection (§4.6 "Parameter injection").
//! Each tool implements `rcp_scheduler::StepExecutor`; a driver assembles
//! them into a `rcp_scheduler::ToolRegistry` via [`build_registry`].

pub mod action;
pub mod codemod;
pub mod inject;
pub mod path;
pub mod recipe_tool;
pub mod render;
pub mod template;

pub use action::{Action, ActionInput, ActionRegistry, ActionTool};
pub use codemod::{CodeModTool, CustomTransform, CustomTransformRegistry};
pub use recipe_tool::{RecipeSourceOptions, RecipeTool};
pub use template::TemplateTool;

use std::sync::Arc;

use rcp_core::ToolKind;
use rcp_scheduler::ToolRegistry;

/// Wires the Template, Action, CodeMod, and Recipe tools into one
/// registry, handling the Recipe tool's late-bound self-reference
/// (§4.5 "scheduled by a fresh scheduler instance").
pub fn build_registry(
    actions: Arc<ActionRegistry>,
    custom_transforms: Arc<CustomTransformRegistry>,
    recipe_source_options: RecipeSourceOptions,
) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(ToolKind::Template, Arc::new(TemplateTool::new(recipe_source_options.clone())));
    registry.register(ToolKind::Action, Arc::new(ActionTool::new(actions)));
    registry.register(ToolKind::Codemod, Arc::new(CodeModTool::new(custom_transforms)));

    let recipe_tool = Arc::new(RecipeTool::new(recipe_source_options));
    registry.register(ToolKind::Recipe, recipe_tool.clone());

    let registry = Arc::new(registry);
    recipe_tool.bind_registry(registry.clone());
    registry
}
