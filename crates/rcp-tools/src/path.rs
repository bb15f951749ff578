//! Path resolver (component F, §4.2 "Path resolution"): turns a template
//! source's relative file path into its destination, in the order the
//! spec lays out — strip engine extension, substitute `[name]`/`[[name]]`
//! segments, honor a frontmatter `to:` override, prepend `output_dir`.

use std::path::{Path, PathBuf};

use rcp_core::VariableMap;

use crate::render::render_template_string;

/// Extensions `auto` recognizes as "this file is a template, strip the
/// suffix" markers. No concrete renderer is implied by any of these names
/// — embedding a real EJS/Liquid/Handlebars grammar is out of scope; this
/// list only drives the path-resolution strip rule.
const KNOWN_TEMPLATE_EXTENSIONS: &[&str] = &["tmpl", "ejs", "liquid", "hbs", "tera"];

/// Step 1 of path resolution: strip the trailing engine-specific suffix
/// if present.
pub fn strip_engine_extension(path: &Path, engine: &str) -> PathBuf {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return path.to_path_buf();
    };
    let matches = if engine == "auto" {
        KNOWN_TEMPLATE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known))
    } else {
        ext.eq_ignore_ascii_case(engine)
    };
    if matches {
        path.with_extension("")
    } else {
        path.to_path_buf()
    }
}

/// Step 2: substitute dynamic path segments. `[name]` binds to the
/// variable's scalar rendered form; `[[name]]` binds to a list variable's
/// members joined by `/`, letting one path segment expand into several
/// real path components.
pub fn substitute_path_segments(path: &Path, variables: &VariableMap) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        let raw = component.as_os_str().to_string_lossy();
        result.push(substitute_segment(&raw, variables));
    }
    result
}

fn substitute_segment(segment: &str, variables: &VariableMap) -> String {
    if let Some(name) = segment.strip_prefix("[[").and_then(|s| s.strip_suffix("]]")) {
        return variables.get(name).map(|v| v.render_joined("/")).unwrap_or_default();
    }
    if let Some(name) = segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return variables.get(name).map(|v| v.render()).unwrap_or_default();
    }
    segment.to_string()
}

/// Runs all four steps in order and returns the final destination path.
pub fn resolve_destination(
    relative_path: &Path,
    engine: &str,
    variables: &VariableMap,
    frontmatter_to: Option<&str>,
    output_dir: &Path,
) -> PathBuf {
    let routed = match frontmatter_to {
        Some(to) => PathBuf::from(render_template_string(to, variables)),
        None => {
            let stripped = strip_engine_extension(relative_path, engine);
            substitute_path_segments(&stripped, variables)
        }
    };
    output_dir.join(routed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcp_core::{Provenance, Value};

    fn vars_with(name: &str, value: Value) -> VariableMap {
        let mut vars = VariableMap::new();
        vars.insert(name, value, Provenance::Default);
        vars
    }

    #[test]
    fn strips_known_auto_extension() {
        let path = Path::new("src/component.tsx.ejs");
        assert_eq!(strip_engine_extension(path, "auto"), PathBuf::from("src/component.tsx"));
    }

    #[test]
    fn leaves_unrecognized_extension_alone() {
        let path = Path::new("src/component.tsx");
        assert_eq!(strip_engine_extension(path, "auto"), PathBuf::from("src/component.tsx"));
    }

    #[test]
    fn substitutes_scalar_and_list_segments() {
        let mut vars = vars_with("name", Value::String("widget".into()));
        vars.insert(
            "scope",
            Value::Array(vec![Value::String("apps".into()), Value::String("web".into())]),
            Provenance::Default,
        );
        let path = Path::new("[[scope]]/[name].ts");
        let resolved = substitute_path_segments(path, &vars);
        assert_eq!(resolved, PathBuf::from("apps/web/widget.ts"));
    }

    #[test]
    fn frontmatter_to_overrides_segment_substitution() {
        let vars = vars_with("name", Value::String("widget".into()));
        let resolved = resolve_destination(
            Path::new("template/[name].tsx.ejs"),
            "auto",
            &vars,
            Some("custom/{{ name }}.tsx"),
            Path::new("/out"),
        );
        assert_eq!(resolved, PathBuf::from("/out/custom/widget.tsx"));
    }

    #[test]
    fn output_dir_is_prepended_last() {
        let vars = vars_with("name", Value::String("widget".into()));
        let resolved = resolve_destination(Path::new("[name].ts.ejs"), "auto", &vars, None, Path::new("/project/src"));
        assert_eq!(resolved, PathBuf::from("/project/src/widget.ts"));
    }
}
