//! `list_steps`/`show_info` detail (§C.1): §6.3 names these
//! operations without shaping their return types, so the shapes below
//! are this crate's own — a summary view a driver can render without
//! walking the full `Recipe`.

use serde::{Deserialize, Serialize};

use rcp_core::{Recipe, ToolKind, Value, VariableKind};

/// One step's scheduler-relevant shape, stripped of its tool-specific
/// fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepInfo {
    pub name: String,
    pub tool: ToolKind,
    pub depends_on: Vec<String>,
    pub parallel: bool,
    pub when: Option<String>,
}

/// One declared variable's documentation-relevant shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableInfo {
    pub name: String,
    pub kind: VariableKind,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

/// A recipe's full descriptive summary (§C.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeInfo {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub variables: Vec<VariableInfo>,
    pub examples: Vec<String>,
    pub steps: Vec<StepInfo>,
}

pub fn list_steps(recipe: &Recipe) -> Vec<StepInfo> {
    recipe
        .steps
        .iter()
        .map(|step| StepInfo {
            name: step.name.clone(),
            tool: step.tool,
            depends_on: step.depends_on.clone(),
            parallel: step.parallel,
            when: step.when.clone(),
        })
        .collect()
}

pub fn show_info(recipe: &Recipe) -> RecipeInfo {
    RecipeInfo {
        name: recipe.name.clone(),
        version: recipe.version.clone(),
        description: recipe.description.clone(),
        author: recipe.author.clone(),
        variables: recipe
            .variables
            .values()
            .map(|def| VariableInfo {
                name: def.name.clone(),
                kind: def.kind,
                required: def.required,
                default: def.default.clone(),
                description: def.description.clone(),
            })
            .collect(),
        examples: recipe.examples.iter().map(|e| e.name.clone()).collect(),
        steps: list_steps(recipe),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcp_core::{Settings, Step, ToolFields, ActionStep};

    fn sample_recipe() -> Recipe {
        Recipe {
            name: "demo".into(),
            version: "1.0.0".into(),
            description: Some("a demo recipe".into()),
            author: None,
            variables: Default::default(),
            settings: Settings::default(),
            steps: vec![Step {
                name: "run".into(),
                tool: ToolKind::Action,
                when: None,
                depends_on: Vec::new(),
                parallel: false,
                continue_on_error: false,
                timeout_ms: None,
                retries: 0,
                fields: ToolFields::Action(ActionStep { action: "noop".into(), parameters: Default::default() }),
            }],
            examples: Vec::new(),
        }
    }

    #[test]
    fn list_steps_reports_scheduler_relevant_fields() {
        let steps = list_steps(&sample_recipe());
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].name, "run");
        assert!(!steps[0].parallel);
    }

    #[test]
    fn show_info_surfaces_recipe_metadata() {
        let info = show_info(&sample_recipe());
        assert_eq!(info.name, "demo");
        assert_eq!(info.description.as_deref(), Some("a demo recipe"));
        assert_eq!(info.steps.len(), 1);
        assert!(info.examples.is_empty());
    }
}
