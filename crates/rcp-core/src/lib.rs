//! Data model shared by every other `rcp-*` crate: variables, steps,
//! recipes, runtime context, results, trust records, and the structured
//! error taxonomy.

pub mod context;
pub mod dag;
pub mod error;
pub mod recipe;
pub mod result;
pub mod step;
pub mod trust;
pub mod validate;
pub mod value;
pub mod variable;

pub use context::{CancellationToken, StepContext};
pub use dag::topological_order;
pub use error::{DocPath, ErrorCode, PathSegment, Problem, StructuredError};
pub use recipe::{Example, Recipe, Settings};
pub use result::{FileChanges, ProgressEvent, RecipeResult, RecipeStatus, StepResult, StepStatus};
pub use step::{
    ActionStep, CodeModKind, CodeModParameters, CodeModParser, CodeModStep, ExportType, ImportType, InjectSpec,
    RecipeStep, Step, TemplateFrontmatter, TemplateStep, ToolFields, ToolKind,
};
pub use trust::{TrustLevel, TrustRecord};
pub use validate::validate_value;
pub use value::Value;
pub use variable::{Constraints, Provenance, VariableDefinition, VariableKind, VariableMap, VariableValue};
