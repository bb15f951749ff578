//! The CodeMod Tool (§4.4): applies a built-in or registered-custom
//! transform to a set of existing files matched by glob, with batch-error
//! isolation (one file's parse failure doesn't abort the rest) and
//! idempotence detection per kind.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use rcp_core::{
    CodeModKind, CodeModParser, DocPath, ErrorCode, FileChanges, Problem, Step, StepContext, ToolFields,
};
use rcp_scheduler::{StepExecutor, StepOutput};

/// A registered `custom` transform (§4.4 "a registered custom name").
/// Receives the file's current content and must return the new content,
/// or `None` if it determined the file is already in the target state
/// (the idempotence contract every built-in kind also honors).
pub trait CustomTransform: Send + Sync {
    fn apply(&self, content: &str) -> Result<Option<String>, String>;
}

#[derive(Default)]
pub struct CustomTransformRegistry {
    transforms: BTreeMap<String, Arc<dyn CustomTransform>>,
}

impl CustomTransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, transform: Arc<dyn CustomTransform>) -> &mut Self {
        self.transforms.insert(name.into(), transform);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CustomTransform>> {
        self.transforms.get(name).cloned()
    }
}

pub struct CodeModTool {
    custom_transforms: Arc<CustomTransformRegistry>,
}

impl CodeModTool {
    pub fn new(custom_transforms: Arc<CustomTransformRegistry>) -> Self {
        Self { custom_transforms }
    }
}

#[async_trait]
impl StepExecutor for CodeModTool {
    async fn validate(&self, step: &Step, _ctx: &StepContext) -> Vec<Problem> {
        let ToolFields::Codemod(fields) = &step.fields else {
            return vec![Problem::new(ErrorCode::InvalidParameters(format!(
                "step '{}' is not a codemod step",
                step.name
            )))];
        };
        let mut problems = Vec::new();
        let ast_kind = matches!(
            fields.codemod,
            CodeModKind::AddImport | CodeModKind::AddExport | CodeModKind::AddProperty
        );
        if ast_kind && !matches!(fields.parser, CodeModParser::Auto | CodeModParser::Typescript | CodeModParser::Javascript) {
            problems.push(
                Problem::new(ErrorCode::InvalidParameters(
                    "add-import/add-export/add-property require parser typescript, javascript, or auto".into(),
                ))
                .at(DocPath::root().field("parser")),
            );
        }
        if fields.codemod == CodeModKind::Custom {
            match &fields.parameters.transform_ref {
                Some(name) if self.custom_transforms.get(name).is_some() => {}
                Some(name) => {
                    problems.push(Problem::new(ErrorCode::UnknownCodemodKind(name.clone())));
                }
                None => {
                    problems.push(Problem::new(ErrorCode::InvalidParameters(
                        "custom codemod requires transform_ref".into(),
                    )));
                }
            }
        }
        problems
    }

    async fn execute(&self, step: &Step, ctx: &StepContext) -> Result<StepOutput, Problem> {
        let ToolFields::Codemod(fields) = &step.fields else {
            return Err(Problem::new(ErrorCode::InvalidParameters(format!(
                "step '{}' is not a codemod step",
                step.name
            ))));
        };

        let mut files = FileChanges::new();
        let mut warnings = Vec::new();
        let mut already_modified: HashSet<PathBuf> = HashSet::new();

        for pattern in &fields.files {
            let absolute_pattern = ctx.working_dir.join(pattern);
            let matches = glob::glob(&absolute_pattern.to_string_lossy()).map_err(|e| {
                Problem::new(ErrorCode::InvalidParameters(format!("bad glob '{pattern}': {e}")))
            })?;

            for entry in matches {
                if ctx.cancellation.is_cancelled() {
                    return Err(Problem::new(ErrorCode::StepTimedOut(0)));
                }
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        warnings.push(format!("glob entry error: {e}"));
                        continue;
                    }
                };
                if already_modified.contains(&path) {
                    // §4.4 "records each modified file exactly once even
                    // under multiple parameter applications".
                    continue;
                }

                match apply_one_file(&path, fields, &self.custom_transforms) {
                    Ok(Some(new_content)) => {
                        if !ctx.dry_run {
                            if fields.backup {
                                backup_file(&path)?;
                            }
                            fs::write(&path, &new_content).map_err(|e| {
                                Problem::new(ErrorCode::PermissionDenied(format!("{}: {e}", path.display())))
                            })?;
                        }
                        files.modified.push(path.clone());
                        already_modified.insert(path);
                    }
                    Ok(None) => {
                        warnings.push(format!("{}: already satisfied, skipped", path.display()));
                    }
                    Err(CodeModError::ParseFailure(reason)) => {
                        // Batch-error isolation: one file's syntax error
                        // doesn't abort the rest of the glob.
                        warnings.push(format!("{}: {reason}", path.display()));
                    }
                    Err(CodeModError::Fatal(problem)) => return Err(problem),
                }
            }
        }

        let mut output = StepOutput::new(files);
        output.warnings = warnings;
        Ok(output)
    }
}

enum CodeModError {
    /// Only this file is skipped; the rest of the glob proceeds.
    ParseFailure(String),
    /// Aborts the whole step.
    Fatal(Problem),
}

fn apply_one_file(
    path: &Path,
    fields: &rcp_core::CodeModStep,
    custom_transforms: &CustomTransformRegistry,
) -> Result<Option<String>, CodeModError> {
    let content = fs::read_to_string(path).map_err(|e| {
        CodeModError::Fatal(Problem::new(ErrorCode::FileNotFound(format!("{}: {e}", path.display()))))
    })?;

    match fields.codemod {
        CodeModKind::AddImport => add_import(&content, fields),
        CodeModKind::AddExport => add_export(&content, fields),
        CodeModKind::AddProperty => add_property(&content, fields),
        CodeModKind::ReplaceText => replace_text(&content, fields),
        CodeModKind::Custom => {
            let name = fields.parameters.transform_ref.as_deref().ok_or_else(|| {
                CodeModError::Fatal(Problem::new(ErrorCode::InvalidParameters(
                    "custom codemod requires transform_ref".into(),
                )))
            })?;
            let transform = custom_transforms.get(name).ok_or_else(|| {
                CodeModError::Fatal(Problem::new(ErrorCode::UnknownCodemodKind(name.to_string())))
            })?;
            transform
                .apply(&content)
                .map_err(CodeModError::ParseFailure)
        }
    }
}

/// A line-based "AST-lite" transform: good enough to demonstrate the
/// idempotence and batch-isolation contracts without embedding a real
/// TypeScript/JavaScript parser, which is explicitly out of scope for
/// this layer.
fn add_import(content: &str, fields: &rcp_core::CodeModStep) -> Result<Option<String>, CodeModError> {
    let import = fields.parameters.import.as_deref().ok_or_else(missing("import"))?;
    let from = fields.parameters.from.as_deref().ok_or_else(missing("from"))?;
    let import_type = fields
        .parameters
        .import_type
        .unwrap_or(rcp_core::ImportType::Named);

    let statement = match import_type {
        rcp_core::ImportType::Default => format!("import {import} from '{from}';"),
        rcp_core::ImportType::Named => match &fields.parameters.alias {
            Some(alias) => format!("import {{ {import} as {alias} }} from '{from}';"),
            None => format!("import {{ {import} }} from '{from}';"),
        },
        rcp_core::ImportType::Namespace => format!("import * as {import} from '{from}';"),
        rcp_core::ImportType::SideEffect => format!("import '{from}';"),
    };

    if content.contains(&statement) {
        return Ok(None);
    }
    if !matches!(fields.parser, CodeModParser::Auto | CodeModParser::Typescript | CodeModParser::Javascript) {
        return Err(CodeModError::ParseFailure("add-import requires a typescript/javascript parser".into()));
    }
    Ok(Some(format!("{statement}\n{content}")))
}

fn add_export(content: &str, fields: &rcp_core::CodeModStep) -> Result<Option<String>, CodeModError> {
    let export = fields.parameters.export.as_deref().ok_or_else(missing("export"))?;
    let export_type = fields.parameters.export_type.unwrap_or(rcp_core::ExportType::Named);
    let statement = match export_type {
        rcp_core::ExportType::Default => format!("export default {export};"),
        rcp_core::ExportType::Named => format!("export {{ {export} }};"),
    };
    if content.contains(&statement) {
        return Ok(None);
    }
    let mut new_content = content.to_string();
    if !new_content.ends_with('\n') {
        new_content.push('\n');
    }
    new_content.push_str(&statement);
    new_content.push('\n');
    Ok(Some(new_content))
}

fn add_property(content: &str, fields: &rcp_core::CodeModStep) -> Result<Option<String>, CodeModError> {
    let property_name = fields.parameters.property_name.as_deref().ok_or_else(missing("property_name"))?;
    let property_value = fields
        .parameters
        .property_value
        .as_ref()
        .map(|v| v.render())
        .unwrap_or_default();
    let container = fields
        .parameters
        .class_name
        .as_deref()
        .or(fields.parameters.object_name.as_deref())
        .ok_or_else(missing("class_name or object_name"))?;

    let Some(anchor_idx) = content.find(container) else {
        return Err(CodeModError::ParseFailure(format!("anchor '{container}' not found")));
    };
    let Some(brace_idx) = content[anchor_idx..].find('{') else {
        return Err(CodeModError::ParseFailure(format!("no opening brace after '{container}'")));
    };
    let insert_at = anchor_idx + brace_idx + 1;

    let property_decl = format!("{property_name}: {property_value},");
    if content.contains(&format!("{property_name}:")) {
        return Ok(None);
    }

    let mut new_content = content.to_string();
    new_content.insert_str(insert_at, &format!("\n  {property_decl}"));
    Ok(Some(new_content))
}

fn replace_text(content: &str, fields: &rcp_core::CodeModStep) -> Result<Option<String>, CodeModError> {
    let find = fields.parameters.find.as_deref().ok_or_else(missing("find"))?;
    let replace = fields.parameters.replace.as_deref().unwrap_or("");

    let new_content = if let Ok(re) = Regex::new(find) {
        if fields.parameters.global {
            re.replace_all(content, replace).into_owned()
        } else {
            re.replacen(content, 1, replace).into_owned()
        }
    } else if fields.parameters.global {
        content.replace(find, replace)
    } else {
        content.replacen(find, replace, 1)
    };

    if new_content == content {
        return Ok(None);
    }
    Ok(Some(new_content))
}

fn missing(field: &'static str) -> impl Fn() -> CodeModError {
    move || {
        CodeModError::Fatal(Problem::new(ErrorCode::InvalidParameters(format!(
            "codemod parameter '{field}' is required"
        ))))
    }
}

fn backup_file(path: &Path) -> Result<(), Problem> {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let backup_name = format!(
        "{}.bak.{timestamp}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file")
    );
    let backup_path = path.with_file_name(backup_name);
    fs::copy(path, &backup_path)
        .map_err(|e| Problem::new(ErrorCode::PermissionDenied(format!("{}: {e}", backup_path.display()))))?;
    Ok(())
}
