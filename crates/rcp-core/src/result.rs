//! Canonical result and progress types (component K, §3.1 "Step Result" /
//! "Recipe Result").

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Problem;

/// Outcome of a single step attempt (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    Skipped,
    Failed,
    TimedOut,
}

/// Outcome of an entire (sub-)recipe run (§3.2, §6.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeStatus {
    Ok,
    Failed,
    TimedOut,
}

/// The set of absolute paths a step touched, classified by how (§3.1).
/// Kept as three separate sets rather than one tagged list so "last-writer
/// wins for classification" (§3.2) merges with plain set operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileChanges {
    pub created: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

impl FileChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Merge `other` into `self` per §3.2's "last-writer wins for
    /// classification: a file created then modified in a later step is
    /// reported created" rule — created status sticks even if a later step
    /// reports the same path as modified.
    pub fn merge(&mut self, other: FileChanges) {
        for path in other.created {
            self.remove_path(&path);
            self.created.push(path);
        }
        for path in other.modified {
            if !self.created.contains(&path) {
                self.remove_path(&path);
                self.modified.push(path);
            }
        }
        for path in other.deleted {
            self.remove_path(&path);
            self.deleted.push(path);
        }
    }

    fn remove_path(&mut self, path: &PathBuf) {
        self.created.retain(|p| p != path);
        self.modified.retain(|p| p != path);
        self.deleted.retain(|p| p != path);
    }

    /// All touched paths, for conflict detection (§5 "Shared-resource
    /// policy").
    pub fn all_paths(&self) -> BTreeSet<PathBuf> {
        self.created
            .iter()
            .chain(self.modified.iter())
            .chain(self.deleted.iter())
            .cloned()
            .collect()
    }
}

/// Result of one step (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub status: StepStatus,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub files: FileChanges,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub error: Option<Problem>,
    #[serde(default)]
    pub retries_used: u32,
}

impl StepResult {
    pub fn ok(name: impl Into<String>, duration: Duration, files: FileChanges) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Ok,
            duration,
            files,
            warnings: Vec::new(),
            error: None,
            retries_used: 0,
        }
    }

    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Skipped,
            duration: Duration::ZERO,
            files: FileChanges::new(),
            warnings: Vec::new(),
            error: None,
            retries_used: 0,
        }
    }

    pub fn failed(name: impl Into<String>, duration: Duration, error: Problem, retries_used: u32) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Failed,
            duration,
            files: FileChanges::new(),
            warnings: Vec::new(),
            error: Some(error),
            retries_used,
        }
    }

    pub fn timed_out(name: impl Into<String>, duration: Duration, retries_used: u32) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::TimedOut,
            duration,
            files: FileChanges::new(),
            warnings: Vec::new(),
            error: None,
            retries_used,
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(duration.as_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Aggregated result of an entire recipe run (§3.1, §6.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeResult {
    pub status: RecipeStatus,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub steps: Vec<StepResult>,
    pub files: FileChanges,
}

impl RecipeResult {
    pub fn new() -> Self {
        Self {
            status: RecipeStatus::Ok,
            duration: Duration::ZERO,
            steps: Vec::new(),
            files: FileChanges::new(),
        }
    }

    pub fn record(&mut self, result: StepResult) {
        self.files.merge(result.files.clone());
        if result.status == StepStatus::Failed && self.status == RecipeStatus::Ok {
            self.status = RecipeStatus::Failed;
        }
        self.steps.push(result);
    }

    pub fn mark_timed_out(&mut self) {
        if self.status == RecipeStatus::Ok {
            self.status = RecipeStatus::TimedOut;
        }
    }
}

impl Default for RecipeResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Tagged progress events (§9 "Model progress as a callback with a tagged
/// variant of events"). Pure data — safe to hand to any concurrency
/// runtime, unlike a generator or an emitter with callbacks of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    StepStarted { step: String },
    StepCompleted { step: String, status: StepStatus },
    StepSkipped { step: String },
    RecipeCompleted { status: RecipeStatus },
}
