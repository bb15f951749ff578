//! The Template Tool (§4.2): renders a template source's files to their
//! resolved destinations, honoring per-file frontmatter, the inject
//! policy, and idempotent `skip_if`/`unless_exists` rules.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rcp_core::{DocPath, ErrorCode, FileChanges, Problem, Step, StepContext, ToolFields};
use rcp_scheduler::{StepExecutor, StepOutput};

use crate::inject::apply_inject;
use crate::path::resolve_destination;
use crate::recipe_tool::RecipeSourceOptions;
use crate::render::render_template_string;

/// Renders a template source (§4.2). `template` is resolved through the
/// source resolver (component A, §4.8) before its files are collected, so
/// a `github:`/`npm:`/`http(s)://` reference is fetched and trust-gated
/// exactly like the Recipe tool's `recipe` field.
pub struct TemplateTool {
    source_options: RecipeSourceOptions,
}

impl TemplateTool {
    pub fn new(source_options: RecipeSourceOptions) -> Self {
        Self { source_options }
    }
}

#[async_trait]
impl StepExecutor for TemplateTool {
    async fn validate(&self, step: &Step, _ctx: &StepContext) -> Vec<Problem> {
        let ToolFields::Template(fields) = &step.fields else {
            return vec![Problem::new(ErrorCode::InvalidParameters(format!(
                "step '{}' is not a template step",
                step.name
            )))];
        };
        let mut problems = Vec::new();
        if fields.template.trim().is_empty() {
            problems.push(
                Problem::new(ErrorCode::InvalidParameters("template source must not be empty".into()))
                    .at(DocPath::root().field("template")),
            );
        }
        problems
    }

    async fn execute(&self, step: &Step, ctx: &StepContext) -> Result<StepOutput, Problem> {
        let ToolFields::Template(fields) = &step.fields else {
            return Err(Problem::new(ErrorCode::InvalidParameters(format!(
                "step '{}' is not a template step",
                step.name
            ))));
        };

        let resolver_opts = rcp_source::SourceResolverOptions {
            cache_root: self.source_options.cache_root.clone(),
            lock_path: self.source_options.lock_path.clone(),
            trust_store_path: self.source_options.trust_store_path.clone(),
            interactive: self.source_options.interactive,
            prompt: self.source_options.prompt.as_ref(),
            ttl: self.source_options.ttl,
        };
        let resolved = rcp_source::resolve(&fields.template, &resolver_opts, chrono::Utc::now())
            .map_err(|code| Problem::new(code).at(DocPath::root().field("template")))?;
        let template_root = resolved.path.as_path();

        let output_dir = match &fields.output_dir {
            Some(dir) => ctx.working_dir.join(dir),
            None => ctx.working_dir.clone(),
        };

        let excludes: Vec<glob::Pattern> = fields
            .exclude
            .iter()
            .filter_map(|pattern| glob::Pattern::new(pattern).ok())
            .collect();

        let mut files = FileChanges::new();
        let mut warnings = Vec::new();

        let entries = collect_template_files(template_root).map_err(|e| {
            Problem::new(ErrorCode::FileNotFound(format!(
                "could not read template source '{}': {e}",
                fields.template
            )))
        })?;

        for relative in entries {
            if ctx.cancellation.is_cancelled() {
                return Err(Problem::new(ErrorCode::StepTimedOut(0)));
            }
            if excludes.iter().any(|pattern| pattern.matches_path(&relative)) {
                continue;
            }

            let source_path = template_root.join(&relative);
            let raw = fs::read_to_string(&source_path).map_err(|e| {
                Problem::new(ErrorCode::FileNotFound(format!("{}: {e}", source_path.display())))
            })?;
            let (frontmatter, body) = rcp_parser::parse_frontmatter(&raw);

            if let Some(skip_if) = &frontmatter.skip_if {
                if rcp_expr::evaluate(skip_if, &ctx.variables).unwrap_or(false) {
                    continue;
                }
            }

            let destination = resolve_destination(
                &relative,
                &fields.engine,
                &ctx.variables,
                frontmatter.to.as_deref(),
                &output_dir,
            );

            let rendered = render_template_string(body, &ctx.variables);

            if let Some(inject) = &frontmatter.inject {
                let target_path = ctx.working_dir.join(&inject.target);
                match apply_inject(inject, &ctx.working_dir, &rendered, &ctx.variables)? {
                    Some(crate::inject::InjectOutcome::Applied { new_content }) => {
                        if !ctx.dry_run {
                            write_atomically(&target_path, &new_content)?;
                        }
                        files.modified.push(target_path);
                    }
                    Some(crate::inject::InjectOutcome::AlreadyPresent) => {
                        warnings.push(format!("{}: injection marker already present, skipped", inject.target));
                    }
                    None => {
                        warnings.push(format!("{}: injection skipped by skip_if", inject.target));
                    }
                }
                continue;
            }

            if frontmatter.unless_exists && destination.exists() {
                warnings.push(format!("{}: already exists, skipped (unless_exists)", destination.display()));
                continue;
            }

            let already_exists = destination.exists();
            if already_exists && !fields.overwrite {
                return Err(Problem::new(ErrorCode::Conflict(destination.display().to_string()))
                    .with_suggestion("set overwrite: true to replace existing files"));
            }

            if ctx.dry_run {
                if already_exists {
                    files.modified.push(destination);
                } else {
                    files.created.push(destination);
                }
                continue;
            }

            write_atomically(&destination, &rendered)?;
            if already_exists {
                files.modified.push(destination);
            } else {
                files.created.push(destination);
            }
        }

        let mut output = StepOutput::new(files);
        output.warnings = warnings;
        Ok(output)
    }
}

/// Recursively lists every file under `root`, returned as paths relative
/// to `root`. A single-file template source yields one entry: the file's
/// own name.
fn collect_template_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    if root.is_file() {
        let name = root.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("output"));
        return Ok(vec![name]);
    }
    let mut out = Vec::new();
    walk(root, root, &mut out)?;
    out.sort();
    Ok(out)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk(root, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_path_buf());
        }
    }
    Ok(())
}

/// Writers guarantee atomicity by writing to a temporary sibling and
/// renaming (§5 "Shared-resource policy").
fn write_atomically(destination: &Path, content: &str) -> Result<(), Problem> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Problem::new(ErrorCode::PermissionDenied(format!("{}: {e}", parent.display())))
        })?;
    }
    let tmp_name = format!(
        "{}.tmp",
        destination.file_name().and_then(|n| n.to_str()).unwrap_or("output")
    );
    let tmp_path = destination.with_file_name(tmp_name);
    fs::write(&tmp_path, content)
        .map_err(|e| Problem::new(ErrorCode::PermissionDenied(format!("{}: {e}", tmp_path.display()))))?;
    fs::rename(&tmp_path, destination)
        .map_err(|e| Problem::new(ErrorCode::PermissionDenied(format!("{}: {e}", destination.display()))))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcp_core::{Provenance, TemplateStep, ToolKind, Value, VariableMap};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn source_options() -> RecipeSourceOptions {
        RecipeSourceOptions {
            cache_root: PathBuf::from("/tmp/rcp-template-test-cache"),
            lock_path: PathBuf::from("/tmp/rcp-template-test-cache/lock"),
            trust_store_path: PathBuf::from("/tmp/rcp-template-test-cache/trust.toml"),
            interactive: false,
            prompt: Arc::new(rcp_source::NeverPrompt),
            ttl: std::time::Duration::from_secs(60 * 60 * 24),
        }
    }

    fn template_step(source: &str, overwrite: bool) -> Step {
        Step {
            name: "render".into(),
            tool: ToolKind::Template,
            when: None,
            depends_on: Vec::new(),
            parallel: false,
            continue_on_error: false,
            timeout_ms: None,
            retries: 0,
            fields: ToolFields::Template(TemplateStep {
                template: source.to_string(),
                engine: "auto".to_string(),
                output_dir: None,
                overwrite,
                exclude: Vec::new(),
            }),
        }
    }

    #[tokio::test]
    async fn renders_file_with_variable_substitution() {
        let template_dir = tempdir().unwrap();
        std::fs::write(template_dir.path().join("[name].txt"), "hello {{ name }}").unwrap();
        let output_dir = tempdir().unwrap();

        let mut variables = VariableMap::new();
        variables.insert("name", Value::String("world".into()), Provenance::Default);
        let ctx = StepContext::new(variables, output_dir.path().to_path_buf());
        let step = template_step(template_dir.path().to_str().unwrap(), false);

        let tool = TemplateTool::new(source_options());
        let output = tool.execute(&step, &ctx).await.unwrap();
        let written = output_dir.path().join("world.txt");
        assert_eq!(std::fs::read_to_string(&written).unwrap(), "hello world");
        assert_eq!(output.files.created, vec![written]);
    }

    #[tokio::test]
    async fn refuses_to_overwrite_existing_file_by_default() {
        let template_dir = tempdir().unwrap();
        std::fs::write(template_dir.path().join("out.txt"), "content").unwrap();
        let output_dir = tempdir().unwrap();
        std::fs::write(output_dir.path().join("out.txt"), "existing").unwrap();

        let ctx = StepContext::new(VariableMap::new(), output_dir.path().to_path_buf());
        let step = template_step(template_dir.path().to_str().unwrap(), false);
        let tool = TemplateTool::new(source_options());
        let result = tool.execute(&step, &ctx).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn dry_run_reports_intended_writes_without_touching_disk() {
        let template_dir = tempdir().unwrap();
        std::fs::write(template_dir.path().join("out.txt"), "content").unwrap();
        let output_dir = tempdir().unwrap();

        let ctx = StepContext::new(VariableMap::new(), output_dir.path().to_path_buf()).with_dry_run(true);
        let step = template_step(template_dir.path().to_str().unwrap(), false);
        let tool = TemplateTool::new(source_options());
        let output = tool.execute(&step, &ctx).await.unwrap();
        assert_eq!(output.files.created.len(), 1);
        assert!(!output_dir.path().join("out.txt").exists());
    }

    #[tokio::test]
    async fn rerunning_with_overwrite_is_idempotent() {
        let template_dir = tempdir().unwrap();
        std::fs::write(template_dir.path().join("out.txt"), "fixed content").unwrap();
        let output_dir = tempdir().unwrap();

        let ctx = StepContext::new(VariableMap::new(), output_dir.path().to_path_buf());
        let step = template_step(template_dir.path().to_str().unwrap(), true);
        let tool = TemplateTool::new(source_options());
        tool.execute(&step, &ctx).await.unwrap();
        let first = std::fs::read_to_string(output_dir.path().join("out.txt")).unwrap();
        tool.execute(&step, &ctx).await.unwrap();
        let second = std::fs::read_to_string(output_dir.path().join("out.txt")).unwrap();
        assert_eq!(first, second);
    }
}
