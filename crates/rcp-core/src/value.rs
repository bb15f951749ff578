//! The dynamic value type flowing through variable resolution, the `when`
//! expression evaluator, and step parameter substitution.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A value bound to a variable, a literal in a `when` expression, or a
/// parameter passed to a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// String form used for path substitution (`[name]` segments) and
    /// `{{ name }}` parameter injection. Arrays render as their joined form
    /// is the caller's job (§4.6 `[[name]]`); this is the scalar rendering.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(Value::render)
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object]".to_string(),
        }
    }

    /// Joined form for `[[name]]` list path segments (§4.2 path resolution).
    pub fn render_joined(&self, sep: &str) -> String {
        match self {
            Value::Array(items) => items
                .iter()
                .map(Value::render)
                .collect::<Vec<_>>()
                .join(sep),
            other => other.render(),
        }
    }

    /// Truthiness used by the `when` grammar and by `Block::If`-style
    /// conditions: everything except `false`, `null`, `0`, and empty
    /// strings/arrays/objects is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_handles_falsy_edge_cases() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(!Value::Array(vec![]).is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(Value::String("false".into()).is_truthy());
    }

    #[test]
    fn render_joined_uses_separator_for_arrays_only() {
        let arr = Value::Array(vec![Value::from("a"), Value::from("b")]);
        assert_eq!(arr.render_joined("/"), "a/b");
        assert_eq!(Value::from("solo").render_joined("/"), "solo");
    }

    #[test]
    fn integral_numbers_render_without_decimal() {
        assert_eq!(Value::Number(3.0).render(), "3");
        assert_eq!(Value::Number(3.5).render(), "3.5");
    }
}
