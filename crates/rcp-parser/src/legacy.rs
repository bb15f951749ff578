//! Legacy single-template descriptor synthesis (§4.1): "a document with
//! only variables and metadata is a legacy single-template descriptor and
//! is wrapped synthetically into a one-step recipe with a single Template
//! step whose source is the directory containing the descriptor."

use std::collections::BTreeMap;
use std::path::Path;

use rcp_core::{Example, Recipe, Settings, Step, TemplateStep, ToolFields, ToolKind, VariableDefinition};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct LegacyDescriptor {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, VariableDefinition>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub examples: Vec<Example>,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

pub fn synthesize(descriptor: LegacyDescriptor, source_path: &str) -> Recipe {
    let template_dir = Path::new(source_path)
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| ".".to_string());

    let synthetic_step = Step {
        name: "default".to_string(),
        tool: ToolKind::Template,
        when: None,
        depends_on: Vec::new(),
        parallel: false,
        continue_on_error: false,
        timeout_ms: None,
        retries: 0,
        fields: ToolFields::Template(TemplateStep {
            template: template_dir,
            ..Default::default()
        }),
    };

    Recipe {
        name: descriptor.name,
        version: descriptor.version,
        description: descriptor.description,
        author: descriptor.author,
        variables: descriptor.variables,
        settings: descriptor.settings,
        steps: vec![synthetic_step],
        examples: descriptor.examples,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesizes_single_template_step_from_parent_directory() {
        let descriptor = LegacyDescriptor {
            name: "button-template".into(),
            version: "1.0.0".into(),
            description: None,
            author: None,
            variables: BTreeMap::new(),
            settings: Settings::default(),
            examples: Vec::new(),
        };
        let recipe = synthesize(descriptor, "templates/button/recipe.toml");
        assert_eq!(recipe.steps.len(), 1);
        match &recipe.steps[0].fields {
            ToolFields::Template(t) => assert_eq!(t.template, "templates/button"),
            _ => panic!("expected template step"),
        }
    }
}
