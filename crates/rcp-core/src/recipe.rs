//! The parsed, immutable `Recipe` (§3.1) plus its `settings` and `examples`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::step::Step;
use crate::value::Value;
use crate::variable::VariableDefinition;

/// A fully parsed recipe document (§6.1). Immutable once constructed by
/// the parser — nothing downstream mutates a `Recipe` in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, VariableDefinition>,
    #[serde(default)]
    pub settings: Settings,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub examples: Vec<Example>,
}

impl Recipe {
    /// `variables` as parsed from a map loses the key as the definition's
    /// own `name` field (which is `#[serde(skip)]`); the parser calls this
    /// once after deserializing to stitch names back in.
    pub fn fill_variable_names(&mut self) {
        for (name, def) in self.variables.iter_mut() {
            def.name = name.clone();
        }
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }
}

/// Recipe-level execution defaults (§3.1 "Recipe" / §6.1 `settings`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_max_parallel_steps")]
    pub max_parallel_steps: u32,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default)]
    pub working_dir: Option<String>,
}

fn default_max_parallel_steps() -> u32 {
    4
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            max_parallel_steps: default_max_parallel_steps(),
            continue_on_error: false,
            working_dir: None,
        }
    }
}

/// A named variable set for docs/demos (§6.1 `examples`), also usable as a
/// precedence source (§4.7 step 4, "recipe-level example defaults when the
/// driver is invoking a named example").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Example {
    pub name: String,
    pub variables: BTreeMap<String, Value>,
}
