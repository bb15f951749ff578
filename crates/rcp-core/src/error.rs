//! Structured error taxonomy (spec §7). Each error carries a code, a
//! human message, an optional document path, and an optional suggestion,
//! kept machine-readable via `ErrorCode` so a driver can match on it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One segment of a path into the recipe document, for pinning a problem
/// to its source location (§4.1 "each pinned to a path inside the
/// document").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => write!(f, "{name}"),
            PathSegment::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// A dotted path into the document, e.g. `steps[2].depends_on`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocPath(pub Vec<PathSegment>);

impl DocPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.0.push(PathSegment::Field(name.into()));
        self
    }

    pub fn index(mut self, i: usize) -> Self {
        self.0.push(PathSegment::Index(i));
        self
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, seg) in self.0.iter().enumerate() {
            match seg {
                PathSegment::Field(_) if i > 0 => write!(f, ".{seg}")?,
                _ => write!(f, "{seg}")?,
            }
        }
        Ok(())
    }
}

/// The error taxonomy of spec §7, one variant per named code. Carries the
/// same four pieces of information every error in the taxonomy table
/// requires: a machine code (the variant itself), a human message (via
/// `Display`), an optional document path, and an optional suggestion.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum ErrorCode {
    // Recipe
    #[error("failed to parse recipe document: {0}")]
    RecipeParseError(String),
    #[error("schema validation failed: {0}")]
    SchemaValidationError(String),
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("dependency cycle detected: {0}")]
    CycleInDependencies(String),
    #[error("invalid `when` expression: {0}")]
    InvalidWhenExpression(String),

    // Variables
    #[error("missing required variable(s): {0}")]
    MissingRequiredVariable(String),
    #[error("type mismatch for '{name}': expected {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("constraint violation for '{name}': {reason}")]
    ConstraintViolation { name: String, reason: String },
    #[error("unknown variable reference: {0}")]
    UnknownVariableReference(String),

    // Source
    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),
    #[error("fetch failed: {0}")]
    FetchFailed(String),
    #[error("blocked creator: {0}")]
    BlockedCreator(String),
    #[error("untrusted source: {0}")]
    UntrustedSource(String),
    #[error("security rejected reference: {0}")]
    SecurityRejectedReference(String),
    #[error("circular recipe reference: {0}")]
    CircularRecipeReference(String),

    // Execution
    #[error("step failed: {0}")]
    StepFailed(String),
    #[error("step timed out after {0}ms")]
    StepTimedOut(u64),
    #[error("recipe timed out after {0}ms")]
    RecipeTimedOut(u64),
    #[error("write conflict at {0}")]
    Conflict(String),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("syntax error in source file {path}: {reason}")]
    SyntaxErrorInSourceFile { path: String, reason: String },

    // Tool contract
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("unknown codemod kind: {0}")]
    UnknownCodemodKind(String),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

/// One diagnostic entry: a code, the path it applies to, and an optional
/// suggestion for fixing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub code: ErrorCode,
    pub path: DocPath,
    pub suggestion: Option<String>,
}

impl Problem {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            path: DocPath::root(),
            suggestion: None,
        }
    }

    pub fn at(mut self, path: DocPath) -> Self {
        self.path = path;
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {})", self.code, self.path)?;
        if let Some(s) = &self.suggestion {
            write!(f, " — suggestion: {s}")?;
        }
        Ok(())
    }
}

/// A batch of problems returned by validation (§4.1 "The parser never
/// partially returns a recipe"; §7 "Validation errors ... are returned as
/// a batch").
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{} problem(s): {}", problems.len(), render_problems(problems))]
pub struct StructuredError {
    pub problems: Vec<Problem>,
}

fn render_problems(problems: &[Problem]) -> String {
    problems
        .iter()
        .map(Problem::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl StructuredError {
    pub fn single(problem: Problem) -> Self {
        Self {
            problems: vec![problem],
        }
    }

    pub fn from_problems(problems: Vec<Problem>) -> Self {
        Self { problems }
    }
}
