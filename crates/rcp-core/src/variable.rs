//! Variable definitions and resolved variable values (spec §3.1).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A declared variable in a recipe's `variables` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    #[serde(skip)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: VariableKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub suggestion: Option<String>,
    #[serde(flatten)]
    pub constraints: Constraints,
}

/// The eight variable types from spec §3.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    String,
    Number,
    Boolean,
    Enum,
    Array,
    Object,
    File,
    Directory,
}

/// Type-specific constraints. All fields are optional; only the ones
/// matching the variable's `kind` are meaningful, but we deserialize the
/// union so a single `#[serde(flatten)]` covers every kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    // string
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    // number
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    // enum
    #[serde(default)]
    pub values: Option<Vec<Value>>,
    // array
    #[serde(default)]
    pub item_type: Option<VariableKind>,
    #[serde(default)]
    pub item_schema: Option<Box<VariableDefinition>>,
    #[serde(default)]
    pub min_items: Option<usize>,
    #[serde(default)]
    pub max_items: Option<usize>,
    #[serde(default)]
    pub unique_items: Option<bool>,
    // object
    #[serde(default)]
    pub properties: Option<BTreeMap<String, VariableDefinition>>,
    #[serde(default)]
    pub required_properties: Option<Vec<String>>,
    #[serde(default)]
    pub additional_properties: Option<bool>,
    // file / directory
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
    #[serde(default)]
    pub must_exist: Option<bool>,
}

/// Where a resolved value came from, for diagnostics and precedence (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Default,
    Parent,
    Flag,
    Positional,
    Prompt,
    Override,
}

/// A single resolved `(name, value, provenance)` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableValue {
    pub name: String,
    pub value: Value,
    pub provenance: Provenance,
}

/// An ordered, immutable map of resolved variables (spec §3.1 "Resolved
/// Variable Map"). Ordering follows insertion (declaration order in the
/// recipe) so diagnostics and serialized reports are deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableMap {
    entries: Vec<VariableValue>,
}

impl VariableMap {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value, provenance: Provenance) {
        let name = name.into();
        if let Some(existing) = self.entries.iter_mut().find(|e| e.name == name) {
            existing.value = value;
            existing.provenance = provenance;
        } else {
            self.entries.push(VariableValue {
                name,
                value,
                provenance,
            });
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|e| e.name == name).map(|e| &e.value)
    }

    pub fn provenance_of(&self, name: &str) -> Option<Provenance> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.provenance)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableValue> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A plain `name -> Value` view, handy for the expression evaluator and
    /// for tool parameter merging.
    pub fn as_flat_map(&self) -> BTreeMap<String, Value> {
        self.entries
            .iter()
            .map(|e| (e.name.clone(), e.value.clone()))
            .collect()
    }
}
