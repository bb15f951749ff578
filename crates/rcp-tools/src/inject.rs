//! Targeted insertion into an existing file (§4.2, §6.2 `inject:` block).
//! Exactly one of `before`/`after`/`at_line` selects the insertion point;
//! `marker` (or, absent that, the inserted text itself) is the idempotence
//! signal that makes re-running the step a no-op.

use std::fs;
use std::path::Path;

use rcp_core::{ErrorCode, InjectSpec, Problem, VariableMap};

pub enum InjectOutcome {
    Applied { new_content: String },
    AlreadyPresent,
}

pub fn apply_inject(
    inject: &InjectSpec,
    working_dir: &Path,
    inserted: &str,
    variables: &VariableMap,
) -> Result<Option<InjectOutcome>, Problem> {
    if let Some(skip_if) = &inject.skip_if {
        if rcp_expr::evaluate(skip_if, variables).unwrap_or(false) {
            return Ok(None);
        }
    }

    let target_path = working_dir.join(&inject.target);
    let existing = fs::read_to_string(&target_path)
        .map_err(|e| Problem::new(ErrorCode::FileNotFound(format!("{}: {e}", target_path.display()))))?;

    let already_present = match &inject.marker {
        Some(marker) => existing.contains(marker.as_str()),
        None => existing.contains(inserted.trim_end()),
    };
    if already_present {
        return Ok(Some(InjectOutcome::AlreadyPresent));
    }

    let lines: Vec<&str> = existing.lines().collect();
    let insert_at = if let Some(pattern) = &inject.before {
        lines.iter().position(|line| line.contains(pattern.as_str()))
    } else if let Some(pattern) = &inject.after {
        lines
            .iter()
            .position(|line| line.contains(pattern.as_str()))
            .map(|i| i + 1)
    } else if let Some(at_line) = inject.at_line {
        Some((at_line as usize).min(lines.len()))
    } else {
        None
    };

    let Some(index) = insert_at else {
        return Err(Problem::new(ErrorCode::InvalidParameters(format!(
            "inject target '{}' has no matching anchor",
            inject.target
        ))));
    };

    let mut new_lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    new_lines.insert(index, inserted.trim_end().to_string());
    let mut new_content = new_lines.join("\n");
    if existing.ends_with('\n') {
        new_content.push('\n');
    }
    Ok(Some(InjectOutcome::Applied { new_content }))
}
