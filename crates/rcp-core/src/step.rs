//! Step definitions: the common scheduler-facing fields (§3.1 "Step") plus
//! the tool-specific fields of §4.2-§4.5, one struct per tool.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// The four built-in tools a step may dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Template,
    Action,
    Codemod,
    Recipe,
}

/// A single scheduler unit. Common fields live directly on `Step`;
/// tool-specific fields are carried in `ToolFields`, tagged by `tool` at
/// the document boundary but kept untagged here since the discriminator
/// already lives on `tool`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub tool: ToolKind,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retries: u32,
    #[serde(flatten)]
    pub fields: ToolFields,
}

/// Tool-specific fields, one variant per tool. Flattened into `Step`'s
/// serde representation so the document reads as one flat record per step
/// (matching §6.1: "Each `Step` is a record with a `tool` discriminator and
/// the tool-specific fields").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolFields {
    Template(TemplateStep),
    Action(ActionStep),
    Codemod(CodeModStep),
    Recipe(RecipeStep),
}

/// §4.2 Template Tool step fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateStep {
    pub template: String,
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_engine() -> String {
    "auto".to_string()
}

/// §4.2/§6.2 per-file template frontmatter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateFrontmatter {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub skip_if: Option<String>,
    #[serde(default)]
    pub unless_exists: bool,
    #[serde(default)]
    pub inject: Option<InjectSpec>,
}

/// §6.2 `inject:` block. Exactly one of `before`/`after`/`at_line` is set;
/// the parser enforces that, not this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectSpec {
    pub target: String,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub at_line: Option<u32>,
    #[serde(default)]
    pub skip_if: Option<String>,
    #[serde(default)]
    pub marker: Option<String>,
}

/// §4.3 Action Tool step fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionStep {
    pub action: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

/// §4.4 CodeMod Tool step fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeModStep {
    pub codemod: CodeModKind,
    pub files: Vec<String>,
    #[serde(default = "default_parser")]
    pub parser: CodeModParser,
    #[serde(default)]
    pub parameters: CodeModParameters,
    #[serde(default = "default_true")]
    pub backup: bool,
}

fn default_parser() -> CodeModParser {
    CodeModParser::Auto
}

fn default_true() -> bool {
    true
}

/// Built-in transform kinds, plus an escape hatch for a registered custom
/// transform name (§4.4 "a registered custom name").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodeModKind {
    AddImport,
    AddExport,
    AddProperty,
    ReplaceText,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeModParser {
    Auto,
    Typescript,
    Javascript,
    Json,
    Text,
}

/// Kind-specific parameters. All fields optional; the tool validates which
/// ones are required for the chosen `CodeModKind`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeModParameters {
    // add-import
    #[serde(default)]
    pub import: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub import_type: Option<ImportType>,
    #[serde(default)]
    pub alias: Option<String>,
    // add-export
    #[serde(default)]
    pub export: Option<String>,
    #[serde(default)]
    pub export_type: Option<ExportType>,
    // add-property
    #[serde(default)]
    pub property_name: Option<String>,
    #[serde(default)]
    pub property_value: Option<Value>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub object_name: Option<String>,
    // replace-text
    #[serde(default)]
    pub find: Option<String>,
    #[serde(default)]
    pub replace: Option<String>,
    #[serde(default)]
    pub global: bool,
    // custom
    #[serde(default)]
    pub transform_ref: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportType {
    Default,
    Named,
    Namespace,
    SideEffect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportType {
    Default,
    Named,
}

/// §4.5 Recipe Tool (composition) step fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeStep {
    pub recipe: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default = "default_true")]
    pub inherit_variables: bool,
    #[serde(default)]
    pub variable_overrides: BTreeMap<String, Value>,
    #[serde(default)]
    pub variable_mapping: BTreeMap<String, String>,
    #[serde(default)]
    pub isolated: bool,
}
