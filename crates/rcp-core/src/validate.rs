//! Schema validation of a concrete `Value` against a `VariableDefinition`'s
//! declared type and constraints (§3.1 invariants, §8 "Variable validation
//! soundness"). Shared by the parser (validating `default`/`examples`
//! values) and the resolver (validating assembled values), so both use the
//! exact same rule set.

use crate::value::Value;
use crate::variable::{VariableDefinition, VariableKind};

/// Validate `value` against `def`. Returns an empty vec iff `value`
/// satisfies every declared constraint — total, never panics, matching
/// §8's "random generation over invalid values must be rejected 100%;
/// over valid values, accepted 100%".
pub fn validate_value(def: &VariableDefinition, value: &Value) -> Vec<String> {
    let mut problems = Vec::new();
    validate_into(def, value, &mut problems);
    problems
}

fn validate_into(def: &VariableDefinition, value: &Value, problems: &mut Vec<String>) {
    match def.kind {
        VariableKind::String | VariableKind::File | VariableKind::Directory => {
            let Some(s) = value.as_str() else {
                problems.push(format!("expected a string, got {}", value.type_name()));
                return;
            };
            if let Some(pattern) = &def.constraints.pattern {
                match regex::Regex::new(pattern) {
                    Ok(re) if !re.is_match(s) => {
                        problems.push(format!("value '{s}' does not match pattern '{pattern}'"))
                    }
                    Err(e) => problems.push(format!("invalid pattern '{pattern}': {e}")),
                    _ => {}
                }
            }
            if let Some(min) = def.constraints.min_length {
                if s.chars().count() < min {
                    problems.push(format!("length {} is below minimum {min}", s.chars().count()));
                }
            }
            if let Some(max) = def.constraints.max_length {
                if s.chars().count() > max {
                    problems.push(format!("length {} exceeds maximum {max}", s.chars().count()));
                }
            }
            if matches!(def.kind, VariableKind::File | VariableKind::Directory) {
                if let Some(extensions) = &def.constraints.extensions {
                    if !extensions.is_empty() && !extensions.iter().any(|ext| s.ends_with(ext.as_str())) {
                        problems.push(format!("'{s}' does not have one of the allowed extensions {extensions:?}"));
                    }
                }
            }
        }
        VariableKind::Number => {
            let Some(n) = value.as_number() else {
                problems.push(format!("expected a number, got {}", value.type_name()));
                return;
            };
            if let Some(min) = def.constraints.min {
                if n < min {
                    problems.push(format!("{n} is below minimum {min}"));
                }
            }
            if let Some(max) = def.constraints.max {
                if n > max {
                    problems.push(format!("{n} exceeds maximum {max}"));
                }
            }
        }
        VariableKind::Boolean => {
            if value.as_bool().is_none() {
                problems.push(format!("expected a boolean, got {}", value.type_name()));
            }
        }
        VariableKind::Enum => {
            let values = def.constraints.values.as_deref().unwrap_or(&[]);
            if values.is_empty() {
                problems.push("enum variable declares no values".to_string());
            } else if !values.iter().any(|v| v == value) {
                problems.push(format!("'{}' is not one of the declared enum values", value.render()));
            }
        }
        VariableKind::Array => {
            let Some(items) = value.as_array() else {
                problems.push(format!("expected an array, got {}", value.type_name()));
                return;
            };
            if let Some(min) = def.constraints.min_items {
                if items.len() < min {
                    problems.push(format!("array has {} item(s), below minimum {min}", items.len()));
                }
            }
            if let Some(max) = def.constraints.max_items {
                if items.len() > max {
                    problems.push(format!("array has {} item(s), exceeds maximum {max}", items.len()));
                }
            }
            if def.constraints.unique_items == Some(true) {
                for (i, item) in items.iter().enumerate() {
                    if items[..i].contains(item) {
                        problems.push(format!("duplicate array item at index {i}"));
                        break;
                    }
                }
            }
            if let Some(schema) = &def.constraints.item_schema {
                for (i, item) in items.iter().enumerate() {
                    for reason in validate_value(schema, item) {
                        problems.push(format!("item[{i}]: {reason}"));
                    }
                }
            } else if let Some(item_type) = def.constraints.item_type {
                let synthetic = VariableDefinition {
                    name: String::new(),
                    kind: item_type,
                    required: false,
                    default: None,
                    description: None,
                    prompt: None,
                    position: None,
                    suggestion: None,
                    constraints: Default::default(),
                };
                for (i, item) in items.iter().enumerate() {
                    for reason in validate_value(&synthetic, item) {
                        problems.push(format!("item[{i}]: {reason}"));
                    }
                }
            }
        }
        VariableKind::Object => {
            let Some(map) = value.as_object() else {
                problems.push(format!("expected an object, got {}", value.type_name()));
                return;
            };
            if let Some(required) = &def.constraints.required_properties {
                for name in required {
                    if !map.contains_key(name) {
                        problems.push(format!("missing required property '{name}'"));
                    }
                }
            }
            if let Some(properties) = &def.constraints.properties {
                for (name, value) in map {
                    match properties.get(name) {
                        Some(prop_def) => {
                            for reason in validate_value(prop_def, value) {
                                problems.push(format!("property '{name}': {reason}"));
                            }
                        }
                        None if def.constraints.additional_properties == Some(false) => {
                            problems.push(format!("unexpected property '{name}'"));
                        }
                        None => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn base_def(kind: VariableKind) -> VariableDefinition {
        VariableDefinition {
            name: "x".into(),
            kind,
            required: true,
            default: None,
            description: None,
            prompt: None,
            position: None,
            suggestion: None,
            constraints: Default::default(),
        }
    }

    #[test]
    fn string_pattern_rejects_non_matching_values() {
        let mut def = base_def(VariableKind::String);
        def.constraints.pattern = Some("^[A-Z][a-zA-Z]*$".into());
        assert!(validate_value(&def, &Value::from("Button")).is_empty());
        assert!(!validate_value(&def, &Value::from("button")).is_empty());
    }

    #[test]
    fn number_bounds_are_enforced() {
        let mut def = base_def(VariableKind::Number);
        def.constraints.min = Some(1.0);
        def.constraints.max = Some(10.0);
        assert!(validate_value(&def, &Value::Number(5.0)).is_empty());
        assert!(!validate_value(&def, &Value::Number(0.0)).is_empty());
        assert!(!validate_value(&def, &Value::Number(11.0)).is_empty());
    }

    #[test]
    fn enum_requires_membership_in_declared_values() {
        let mut def = base_def(VariableKind::Enum);
        def.constraints.values = Some(vec![Value::from("express"), Value::from("fastify")]);
        assert!(validate_value(&def, &Value::from("express")).is_empty());
        assert!(!validate_value(&def, &Value::from("koa")).is_empty());
    }

    #[test]
    fn array_item_schema_is_applied_recursively() {
        let mut def = base_def(VariableKind::Array);
        def.constraints.item_type = Some(VariableKind::Number);
        def.constraints.min_items = Some(1);
        assert!(validate_value(&def, &Value::Array(vec![Value::Number(1.0)])).is_empty());
        assert!(!validate_value(&def, &Value::Array(vec![])).is_empty());
        assert!(!validate_value(&def, &Value::Array(vec![Value::from("nope")])).is_empty());
    }

    #[test]
    fn object_required_properties_are_checked() {
        let mut def = base_def(VariableKind::Object);
        def.constraints.required_properties = Some(vec!["name".into()]);
        let mut obj = BTreeMap::new();
        obj.insert("name".to_string(), Value::from("svc"));
        assert!(validate_value(&def, &Value::Object(obj)).is_empty());
        assert!(!validate_value(&def, &Value::Object(BTreeMap::new())).is_empty());
    }
}
