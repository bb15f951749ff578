//! Semantic validation pass run after structural (de)serialization
//! succeeds (spec §4.1). Produces a flat list of `Problem`s, each pinned
//! to a `DocPath`; an empty list means the recipe is accepted as-is.

use std::collections::BTreeSet;

use rcp_core::{topological_order, DocPath, ErrorCode, Problem, Recipe};

pub fn semantic_validate(recipe: &Recipe) -> Vec<Problem> {
    let mut problems = Vec::new();

    validate_variables(recipe, &mut problems);
    validate_steps(recipe, &mut problems);
    validate_settings(recipe, &mut problems);

    problems
}

fn validate_variables(recipe: &Recipe, problems: &mut Vec<Problem>) {
    for (name, def) in &recipe.variables {
        if let Some(default) = &def.default {
            for reason in rcp_core::validate_value(def, default) {
                problems.push(
                    Problem::new(ErrorCode::SchemaValidationError(format!(
                        "default for '{name}' is invalid: {reason}"
                    )))
                    .at(DocPath::root().field("variables").field(name).field("default")),
                );
            }
        }
        if def.kind == rcp_core::VariableKind::Enum {
            let values = def.constraints.values.as_deref().unwrap_or(&[]);
            if values.is_empty() {
                problems.push(
                    Problem::new(ErrorCode::SchemaValidationError(format!(
                        "enum variable '{name}' declares no values"
                    )))
                    .at(DocPath::root().field("variables").field(name).field("values")),
                );
            }
        }
    }

    let mut seen_positions = BTreeSet::new();
    let mut positions: Vec<u32> = recipe.variables.values().filter_map(|d| d.position).collect();
    positions.sort_unstable();
    for (expected, actual) in (0u32..).zip(positions.iter().copied()) {
        if !seen_positions.insert(actual) {
            problems.push(Problem::new(ErrorCode::SchemaValidationError(format!(
                "duplicate positional index {actual}"
            ))));
        } else if actual != expected {
            problems.push(Problem::new(ErrorCode::SchemaValidationError(format!(
                "positional indices must be dense starting at 0; found gap before {actual}"
            ))));
        }
    }

    for (example_idx, example) in recipe.examples.iter().enumerate() {
        for (name, value) in &example.variables {
            if let Some(def) = recipe.variables.get(name) {
                for reason in rcp_core::validate_value(def, value) {
                    problems.push(
                        Problem::new(ErrorCode::SchemaValidationError(format!(
                            "example '{}' variable '{name}' is invalid: {reason}",
                            example.name
                        )))
                        .at(DocPath::root().field("examples").index(example_idx).field(name)),
                    );
                }
            } else {
                problems.push(
                    Problem::new(ErrorCode::UnknownVariableReference(name.clone()))
                        .at(DocPath::root().field("examples").index(example_idx).field(name)),
                );
            }
        }
    }
}

fn validate_steps(recipe: &Recipe, problems: &mut Vec<Problem>) {
    let mut seen_names = BTreeSet::new();
    for (i, step) in recipe.steps.iter().enumerate() {
        if !seen_names.insert(step.name.as_str()) {
            problems.push(
                Problem::new(ErrorCode::DuplicateName(step.name.clone()))
                    .at(DocPath::root().field("steps").index(i).field("name")),
            );
        }
    }

    let step_names: BTreeSet<&str> = recipe.steps.iter().map(|s| s.name.as_str()).collect();
    for (i, step) in recipe.steps.iter().enumerate() {
        for dep in &step.depends_on {
            if !step_names.contains(dep.as_str()) {
                problems.push(
                    Problem::new(ErrorCode::SchemaValidationError(format!(
                        "step '{}' depends on unknown step '{dep}'",
                        step.name
                    )))
                    .at(DocPath::root().field("steps").index(i).field("depends_on")),
                );
            }
        }

        if step.parallel && step.depends_on.is_empty() {
            problems.push(
                Problem::new(ErrorCode::SchemaValidationError(format!(
                    "step '{}' is marked parallel but has no dependencies",
                    step.name
                )))
                .at(DocPath::root().field("steps").index(i).field("parallel")),
            );
        }

        if let Some(when) = &step.when {
            if let Err(e) = rcp_expr::validate(when) {
                problems.push(
                    Problem::new(ErrorCode::InvalidWhenExpression(format!("{}: {e}", step.name)))
                        .at(DocPath::root().field("steps").index(i).field("when")),
                );
            }
        }
    }

    if let Err(cycle) = topological_order(&recipe.steps) {
        problems.push(Problem::new(ErrorCode::CycleInDependencies(cycle.join(" -> "))).at(DocPath::root().field("steps")));
    }
}

fn validate_settings(recipe: &Recipe, problems: &mut Vec<Problem>) {
    if recipe.settings.max_parallel_steps < 1 {
        problems.push(
            Problem::new(ErrorCode::SchemaValidationError(
                "settings.max_parallel_steps must be >= 1".to_string(),
            ))
            .at(DocPath::root().field("settings").field("max_parallel_steps")),
        );
    }
}
