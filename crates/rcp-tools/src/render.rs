//! Parameter injection (spec §4.6 "Variables referenced in step fields …
//! are substituted using the same restricted expression language before
//! the tool sees them"). No concrete template grammar (EJS, Liquid, …) is
//! embedded — that is an explicit Non-goal — so every tool shares this one
//! general-purpose `{{ name }}` substitution for both step-field
//! interpolation and template file bodies.

use rcp_core::{Value, VariableMap};

/// Replace every `{{ name }}` occurrence (whitespace around `name` is
/// trimmed) with the variable's rendered string form. Unknown names
/// render empty rather than erroring, matching the grammar's "must be
/// total" requirement (§4.6.a).
pub fn render_template_string(input: &str, variables: &VariableMap) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                let rendered = variables.get(name).map(Value::render).unwrap_or_default();
                output.push_str(&rendered);
                rest = &after[end + 2..];
            }
            None => {
                output.push_str(&rest[start..]);
                rest = "";
                break;
            }
        }
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcp_core::Provenance;

    #[test]
    fn substitutes_known_variable() {
        let mut vars = VariableMap::new();
        vars.insert("name", Value::String("widget".into()), Provenance::Default);
        assert_eq!(render_template_string("export const {{ name }} = 1;", &vars), "export const widget = 1;");
    }

    #[test]
    fn unknown_variable_renders_empty_without_erroring() {
        let vars = VariableMap::new();
        assert_eq!(render_template_string("hello {{ missing }}!", &vars), "hello !");
    }

    #[test]
    fn unterminated_placeholder_is_left_verbatim() {
        let vars = VariableMap::new();
        assert_eq!(render_template_string("broken {{ oops", &vars), "broken {{ oops");
    }
}
