//! The top-level callable surface (§6.3): wires the recipe parser,
//! variable resolver, source resolver, scheduler, and tool registry
//! together behind the six operations a driver calls. No CLI front-end
//! lives here (§1 places that out of scope) — this crate is
//! itself a library.

pub mod engine;
pub mod info;
pub mod options;
pub mod visualize;

pub use engine::{Engine, VariableInputs};
pub use info::{RecipeInfo, StepInfo};
pub use options::{EngineOptions, Options};
pub use visualize::DependencyGraph;
