//! Content-addressed on-disk cache for fetched remote sources (spec
//! §6.5), keyed by a normalized reference plus version/commit. The cache
//! root defaults via `directories::BaseDirs`, with a sha256-derived
//! subdirectory per source.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Floating references (branches, tags that move) expire after this long;
/// pinned references (exact commits) never do (§6.5).
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub fn default_cache_root() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.cache_dir().join("recipe-engine").join("sources"))
        .unwrap_or_else(|| PathBuf::from(".recipe-engine-cache"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub normalized_reference: String,
    pub fetched_at: chrono::DateTime<chrono::Utc>,
    pub content_hash: String,
    pub pinned: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheIndex {
    #[serde(default)]
    entries: BTreeMap<String, CacheEntry>,
}

pub struct Cache {
    root: PathBuf,
}

impl Cache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The content-addressed key for `normalized_reference` (a reference
    /// string already folded to its canonical form plus any version/commit
    /// suffix).
    pub fn key_for(normalized_reference: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(normalized_reference.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn dir_for(&self, normalized_reference: &str) -> PathBuf {
        self.root.join(Self::key_for(normalized_reference))
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index.toml")
    }

    fn load_index(&self) -> Result<CacheIndex> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(CacheIndex::default());
        }
        let text = std::fs::read_to_string(&path).with_context(|| format!("failed to read cache index: {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse cache index: {}", path.display()))
    }

    fn save_index(&self, index: &CacheIndex) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let text = toml::to_string_pretty(index).context("failed to serialize cache index")?;
        std::fs::write(self.index_path(), text).context("failed to write cache index")
    }

    pub fn lookup(&self, normalized_reference: &str) -> Result<Option<CacheEntry>> {
        Ok(self.load_index()?.entries.get(normalized_reference).cloned())
    }

    pub fn record(&self, entry: CacheEntry) -> Result<()> {
        let mut index = self.load_index()?;
        index.entries.insert(entry.normalized_reference.clone(), entry);
        self.save_index(&index)
    }

    /// Whether `entry` is stale under `ttl`. Pinned entries never go stale
    /// (§6.5 "pinned references never expire").
    pub fn is_stale(entry: &CacheEntry, ttl: Duration, now: chrono::DateTime<chrono::Utc>) -> bool {
        if entry.pinned {
            return false;
        }
        let age = now.signed_duration_since(entry.fetched_at);
        age.to_std().map(|age| age > ttl).unwrap_or(false)
    }

    /// Evict stale floating-ref entries past `ttl`, removing their cache
    /// directories from disk too.
    pub fn gc(&self, ttl: Duration, now: chrono::DateTime<chrono::Utc>) -> Result<GcReport> {
        let mut index = self.load_index()?;
        let mut evicted = Vec::new();
        let stale: Vec<String> = index
            .entries
            .iter()
            .filter(|(_, entry)| Self::is_stale(entry, ttl, now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            if let Some(entry) = index.entries.remove(key) {
                let dir = self.dir_for(&entry.normalized_reference);
                if dir.exists() {
                    let _ = std::fs::remove_dir_all(&dir);
                }
                evicted.push(entry.normalized_reference);
            }
        }

        self.save_index(&index)?;
        Ok(GcReport {
            evicted,
            kept: index.entries.len(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GcReport {
    pub evicted: Vec<String>,
    pub kept: usize,
}

pub fn hash_contents(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
