//! Recipe document parsing and schema validation (component B, spec
//! §4.1). Splits into: structural parsing of the document body
//! (`toml`-based), legacy single-template descriptor synthesis, the
//! semantic validation pass, and per-file template frontmatter parsing
//! (§6.2).

pub mod frontmatter;
pub mod legacy;
pub mod validate;

use rcp_core::{DocPath, ErrorCode, Problem, Recipe, StructuredError};

pub use frontmatter::parse_frontmatter;
pub use legacy::{synthesize, LegacyDescriptor};

/// Parse a recipe document. `source_path` is only used to compute the
/// template directory for the legacy single-template synthesis rule; it
/// need not exist on disk (fetched sources may be virtual paths).
pub fn parse(bytes: &[u8], source_path: &str) -> Result<Recipe, StructuredError> {
    let text = std::str::from_utf8(bytes).map_err(|e| {
        StructuredError::single(Problem::new(ErrorCode::RecipeParseError(format!(
            "document is not valid UTF-8: {e}"
        ))))
    })?;

    let mut recipe = if is_legacy_template_descriptor(text) {
        let descriptor: LegacyDescriptor = toml::from_str(text).map_err(|e| {
            StructuredError::single(
                Problem::new(ErrorCode::RecipeParseError(e.to_string())).at(DocPath::root()),
            )
        })?;
        synthesize(descriptor, source_path)
    } else {
        toml::from_str::<Recipe>(text).map_err(|e| {
            StructuredError::single(
                Problem::new(ErrorCode::RecipeParseError(e.to_string())).at(DocPath::root()),
            )
        })?
    };

    recipe.fill_variable_names();

    let problems = validate::semantic_validate(&recipe);
    if !problems.is_empty() {
        tracing::debug!(count = problems.len(), recipe = %recipe.name, "recipe failed semantic validation");
        return Err(StructuredError::from_problems(problems));
    }

    tracing::debug!(recipe = %recipe.name, steps = recipe.steps.len(), "parsed recipe");
    Ok(recipe)
}

/// §4.1 discrimination rule: "a document with a non-empty `steps` list is
/// a recipe; a document with only variables and metadata is a legacy
/// single-template descriptor." An explicit `steps = []` is a recipe with
/// zero steps (§8 "Empty `steps` list → recipe result `ok`, zero file
/// changes"), not a legacy descriptor — only the key's total absence
/// triggers synthesis.
fn is_legacy_template_descriptor(text: &str) -> bool {
    match toml::from_str::<toml::Value>(text) {
        Ok(toml::Value::Table(table)) => !table.contains_key("steps"),
        _ => false,
    }
}
