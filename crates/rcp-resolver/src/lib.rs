//! Variable precedence resolution and schema validation (component C,
//! spec §4.7).

use std::collections::BTreeMap;

use rcp_core::{DocPath, ErrorCode, Problem, Provenance, Recipe, StructuredError, Value, VariableMap};

/// Caller-supplied interactive prompt channel. Not a global singleton —
/// passed explicitly per §9 "pass these through the Step Context so tests
/// can inject stubs."
pub trait PromptChannel {
    fn prompt(&self, name: &str, prompt_text: Option<&str>, suggestion: Option<&str>) -> Option<Value>;
}

/// A channel that never answers — the default for non-interactive runs.
pub struct NoPrompt;

impl PromptChannel for NoPrompt {
    fn prompt(&self, _name: &str, _prompt_text: Option<&str>, _suggestion: Option<&str>) -> Option<Value> {
        None
    }
}

/// Everything the resolver needs beyond the recipe itself (§4.7 sources
/// 1-4, 6 — source 5, per-variable `default`, comes from the recipe).
#[derive(Default)]
pub struct ResolutionInputs<'a> {
    /// Source 1: explicit overrides passed by the caller (CLI flags / API
    /// parameter).
    pub overrides: BTreeMap<String, Value>,
    /// Source 2: positional arguments, indexed by their position.
    pub positional: Vec<Value>,
    /// Source 3: the parent recipe's resolved variables, present only
    /// during composition (§4.5), together with the `parent_name ->
    /// child_name` mapping and whether inheritance is enabled at all.
    pub parent: Option<ParentInheritance<'a>>,
    /// Source 4: a named example to pull defaults from, when the driver is
    /// invoking one (§4.7).
    pub example_name: Option<&'a str>,
    /// Source 6 gate: prompts only fire when this is `false` and a
    /// channel is attached.
    pub skip_prompts: bool,
}

pub struct ParentInheritance<'a> {
    pub variables: &'a VariableMap,
    pub mapping: &'a BTreeMap<String, String>,
}

/// Resolve `recipe`'s variables against `inputs`, returning either a fully
/// valid `VariableMap` or a batch of problems (§4.7 "the resolver either
/// returns a fully valid map or a structured error listing every offending
/// variable").
pub fn resolve(
    recipe: &Recipe,
    inputs: &ResolutionInputs,
    prompts: &dyn PromptChannel,
) -> Result<VariableMap, StructuredError> {
    let mut resolved = VariableMap::new();
    let mut problems = Vec::new();
    let mut missing_required = Vec::new();

    let example_values: BTreeMap<&str, &Value> = inputs
        .example_name
        .and_then(|name| recipe.examples.iter().find(|e| e.name == name))
        .map(|example| example.variables.iter().map(|(k, v)| (k.as_str(), v)).collect())
        .unwrap_or_default();

    for (name, def) in &recipe.variables {
        let found = resolve_one(name, def, inputs, &example_values);

        let (value, provenance) = match found {
            Some(pair) => pair,
            None => {
                if !inputs.skip_prompts {
                    if let Some(value) = prompts.prompt(name, def.prompt.as_deref(), def.suggestion.as_deref()) {
                        (value, Provenance::Prompt)
                    } else if def.required {
                        missing_required.push(name.clone());
                        continue;
                    } else {
                        continue;
                    }
                } else if def.required {
                    missing_required.push(name.clone());
                    continue;
                } else {
                    continue;
                }
            }
        };

        for reason in rcp_core::validate_value(def, &value) {
            problems.push(
                Problem::new(ErrorCode::ConstraintViolation {
                    name: name.clone(),
                    reason,
                })
                .at(DocPath::root().field("variables").field(name)),
            );
        }

        resolved.insert(name.clone(), value, provenance);
    }

    if !missing_required.is_empty() {
        problems.push(Problem::new(ErrorCode::MissingRequiredVariable(
            missing_required.join(", "),
        )));
    }

    if !problems.is_empty() {
        tracing::debug!(count = problems.len(), recipe = %recipe.name, "variable resolution failed");
        return Err(StructuredError::from_problems(problems));
    }

    Ok(resolved)
}

fn resolve_one(
    name: &str,
    def: &rcp_core::VariableDefinition,
    inputs: &ResolutionInputs,
    example_values: &BTreeMap<&str, &Value>,
) -> Option<(Value, Provenance)> {
    if let Some(value) = inputs.overrides.get(name) {
        return Some((value.clone(), Provenance::Override));
    }

    if let Some(pos) = def.position {
        if let Some(value) = inputs.positional.get(pos as usize) {
            return Some((value.clone(), Provenance::Positional));
        }
    }

    if let Some(parent) = &inputs.parent {
        let parent_name = parent
            .mapping
            .iter()
            .find(|(_, child)| child.as_str() == name)
            .map(|(parent_name, _)| parent_name.as_str())
            .unwrap_or(name);
        if let Some(value) = parent.variables.get(parent_name) {
            return Some((value.clone(), Provenance::Parent));
        }
    }

    if let Some(value) = example_values.get(name) {
        return Some(((*value).clone(), Provenance::Default));
    }

    if let Some(default) = &def.default {
        return Some((default.clone(), Provenance::Default));
    }

    None
}
