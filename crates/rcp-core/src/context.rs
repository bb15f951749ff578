//! The runtime object passed to a tool on each step attempt (§3.1 "Step
//! Context").

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::variable::VariableMap;

/// Cooperative cancellation signal shared by every step attempt in a
/// (sub-)recipe run (§5 "the scheduler sets a cancellation flag in the
/// Step Context; tools are required to check the flag").
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// The immutable per-step-attempt input (§3.1, GLOSSARY "Step context").
/// A retry creates a fresh `StepContext` sharing the same resolved
/// variables and cancellation token.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub variables: VariableMap,
    pub working_dir: PathBuf,
    pub dry_run: bool,
    pub force: bool,
    /// `(parent_recipe_name, parent_step_name)`, set only inside a Recipe
    /// composition step's child scheduler (§4.5 diagnostics).
    pub parent: Option<(String, String)>,
    pub cancellation: CancellationToken,
    /// Normalized sources of every Recipe-tool composition currently on
    /// the call stack (§4.5 "the engine records the source of S's
    /// sub-recipe in a stack"). A child inherits its parent's ancestry by
    /// default; the Recipe tool pushes its own resolved source before
    /// handing this to the child's scheduler.
    pub recipe_ancestry: Vec<String>,
}

impl StepContext {
    pub fn new(variables: VariableMap, working_dir: PathBuf) -> Self {
        Self {
            variables,
            working_dir,
            dry_run: false,
            force: false,
            parent: None,
            cancellation: CancellationToken::new(),
            recipe_ancestry: Vec::new(),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_recipe_ancestry(mut self, ancestry: Vec<String>) -> Self {
        self.recipe_ancestry = ancestry;
        self
    }

    pub fn child_for(&self, recipe_name: &str, step_name: &str, variables: VariableMap, working_dir: PathBuf) -> Self {
        Self {
            variables,
            working_dir,
            dry_run: self.dry_run,
            force: self.force,
            parent: Some((recipe_name.to_string(), step_name.to_string())),
            cancellation: self.cancellation.clone(),
            recipe_ancestry: self.recipe_ancestry.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_token_is_shared_across_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn child_context_inherits_dry_run_and_cancellation() {
        let parent = StepContext::new(VariableMap::new(), PathBuf::from("/proj")).with_dry_run(true);
        let child = parent.child_for("sub", "install", VariableMap::new(), PathBuf::from("/proj/sub"));
        assert!(child.dry_run);
        assert_eq!(child.parent, Some(("sub".to_string(), "install".to_string())));
        parent.cancellation.cancel();
        assert!(child.cancellation.is_cancelled());
    }

    #[test]
    fn recipe_ancestry_propagates_to_children_and_can_be_extended() {
        let parent = StepContext::new(VariableMap::new(), PathBuf::from("/proj"))
            .with_recipe_ancestry(vec!["github:acme/base".to_string()]);
        let child = parent
            .child_for("sub", "install", VariableMap::new(), PathBuf::from("/proj/sub"))
            .with_recipe_ancestry({
                let mut ancestry = parent.recipe_ancestry.clone();
                ancestry.push("github:acme/sub".to_string());
                ancestry
            });
        assert_eq!(
            child.recipe_ancestry,
            vec!["github:acme/base".to_string(), "github:acme/sub".to_string()]
        );
    }
}
