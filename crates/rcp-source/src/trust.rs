//! The trust store (spec §4.8 "Trust gate", §6.4). A persistent,
//! process-external TOML file keyed by creator identity, guarded by a
//! whole-process advisory lock (`rcp-lock`) so concurrent invocations in
//! the same working directory cannot corrupt it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rcp_core::{ErrorCode, TrustLevel, TrustRecord};
use serde::{Deserialize, Serialize};

use crate::reference::{GitHost, Reference};

/// Caller-supplied interactive decision channel for prompted creators.
/// Not a global singleton — passed in explicitly (§9).
pub trait TrustPrompt {
    /// Returns `Some(true)` to trust, `Some(false)` to block, `None` if
    /// the caller declined to answer (treated as non-interactive refusal).
    fn ask(&self, creator_id: &str) -> Option<bool>;
}

pub struct NeverPrompt;

impl TrustPrompt for NeverPrompt {
    fn ask(&self, _creator_id: &str) -> Option<bool> {
        None
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedStore {
    #[serde(default)]
    records: BTreeMap<String, PersistedRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedRecord {
    level: TrustLevel,
    first_seen: chrono::DateTime<chrono::Utc>,
    last_updated: chrono::DateTime<chrono::Utc>,
}

/// Outcome of consulting the trust gate for one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDecision {
    /// Local reference, or already `trusted`.
    Proceed,
    /// Newly prompted and the caller trusted it.
    ProceedAfterPrompt,
}

pub struct TrustStore {
    path: PathBuf,
    records: BTreeMap<String, PersistedRecord>,
}

impl TrustStore {
    pub fn load(path: &Path) -> Result<Self> {
        let records = if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read trust store: {}", path.display()))?;
            toml::from_str::<PersistedStore>(&text)
                .with_context(|| format!("failed to parse trust store: {}", path.display()))?
                .records
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let persisted = PersistedStore {
            records: self.records.clone(),
        };
        let text = toml::to_string_pretty(&persisted).context("failed to serialize trust store")?;
        std::fs::write(&self.path, text).with_context(|| format!("failed to write trust store: {}", self.path.display()))
    }

    pub fn level_of(&self, creator_id: &str) -> Option<TrustLevel> {
        self.records.get(creator_id).map(|r| r.level)
    }

    pub fn list(&self) -> Vec<TrustRecord> {
        self.records
            .iter()
            .map(|(creator_id, r)| TrustRecord {
                creator_id: creator_id.clone(),
                level: r.level,
                first_seen: r.first_seen,
                last_updated: r.last_updated,
            })
            .collect()
    }

    fn set(&mut self, creator_id: &str, level: TrustLevel, now: chrono::DateTime<chrono::Utc>) {
        self.records
            .entry(creator_id.to_string())
            .and_modify(|r| {
                r.level = level;
                r.last_updated = now;
            })
            .or_insert(PersistedRecord {
                level,
                first_seen: now,
                last_updated: now,
            });
    }

    /// Consult the gate for `reference`, locking the store for the
    /// duration of the read-decide-write so two concurrent resolutions of
    /// the same newly-seen creator cannot race (§5).
    pub fn gate(
        lock_path: &Path,
        store_path: &Path,
        reference: &Reference,
        interactive: bool,
        prompt: &dyn TrustPrompt,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<TrustDecision, ErrorCode> {
        if matches!(reference, Reference::Local { .. }) {
            return Ok(TrustDecision::Proceed);
        }

        let _lock = rcp_lock::acquire(lock_path, "trust-store")
            .map_err(|e| ErrorCode::FetchFailed(format!("failed to lock trust store: {e}")))?;

        let mut store =
            TrustStore::load(store_path).map_err(|e| ErrorCode::FetchFailed(format!("failed to load trust store: {e}")))?;

        let creator_id = creator_identity(reference);

        match store.level_of(&creator_id) {
            Some(TrustLevel::Trusted) => Ok(TrustDecision::Proceed),
            Some(TrustLevel::Blocked) => Err(ErrorCode::BlockedCreator(creator_id)),
            Some(TrustLevel::Prompted) | None => {
                if !interactive {
                    return Err(ErrorCode::UntrustedSource(creator_id));
                }
                match prompt.ask(&creator_id) {
                    Some(true) => {
                        store.set(&creator_id, TrustLevel::Trusted, now);
                        store
                            .save()
                            .map_err(|e| ErrorCode::FetchFailed(format!("failed to save trust store: {e}")))?;
                        Ok(TrustDecision::ProceedAfterPrompt)
                    }
                    Some(false) => {
                        store.set(&creator_id, TrustLevel::Blocked, now);
                        store
                            .save()
                            .map_err(|e| ErrorCode::FetchFailed(format!("failed to save trust store: {e}")))?;
                        Err(ErrorCode::BlockedCreator(creator_id))
                    }
                    None => Err(ErrorCode::UntrustedSource(creator_id)),
                }
            }
        }
    }
}

/// The creator identity component of a reference (§4.8 "the user/
/// organization component").
pub fn creator_identity(reference: &Reference) -> String {
    match reference {
        Reference::Local { .. } => String::new(),
        Reference::Git { host, owner, .. } => {
            let host_label = match host {
                GitHost::GitHub => "github",
                GitHost::GitLab => "gitlab",
                GitHost::Bitbucket => "bitbucket",
                GitHost::Other => "git",
            };
            format!("{host_label}:{owner}")
        }
        Reference::Tarball { url } => url
            .split("://")
            .nth(1)
            .and_then(|rest| rest.split('/').next())
            .unwrap_or(url)
            .to_string(),
        Reference::Package { registry, name, .. } => {
            let scope = name.split('/').next().unwrap_or(name);
            format!("{registry:?}:{scope}").to_lowercase()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct AlwaysTrust;
    impl TrustPrompt for AlwaysTrust {
        fn ask(&self, _creator_id: &str) -> Option<bool> {
            Some(true)
        }
    }

    struct AlwaysBlock;
    impl TrustPrompt for AlwaysBlock {
        fn ask(&self, _creator_id: &str) -> Option<bool> {
            Some(false)
        }
    }

    fn github_ref(owner: &str) -> Reference {
        Reference::Git {
            host: GitHost::GitHub,
            owner: owner.to_string(),
            repo: "widgets".to_string(),
            git_ref: None,
        }
    }

    #[test]
    fn local_references_bypass_the_gate() {
        let dir = tempdir().unwrap();
        let decision = TrustStore::gate(
            &dir.path().join("lock"),
            &dir.path().join("trust.toml"),
            &Reference::Local { path: "./t".into() },
            false,
            &NeverPrompt,
            chrono::Utc::now(),
        )
        .unwrap();
        assert_eq!(decision, TrustDecision::Proceed);
    }

    #[test]
    fn unknown_creator_fails_non_interactively() {
        let dir = tempdir().unwrap();
        let err = TrustStore::gate(
            &dir.path().join("lock"),
            &dir.path().join("trust.toml"),
            &github_ref("acme"),
            false,
            &NeverPrompt,
            chrono::Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, ErrorCode::UntrustedSource(_)));
    }

    #[test]
    fn prompted_and_trusted_persists_across_calls() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("lock");
        let store_path = dir.path().join("trust.toml");
        let now = chrono::Utc::now();

        let decision = TrustStore::gate(&lock_path, &store_path, &github_ref("acme"), true, &AlwaysTrust, now).unwrap();
        assert_eq!(decision, TrustDecision::ProceedAfterPrompt);

        let second = TrustStore::gate(&lock_path, &store_path, &github_ref("acme"), false, &NeverPrompt, now).unwrap();
        assert_eq!(second, TrustDecision::Proceed);
    }

    #[test]
    fn blocked_creator_fails_even_when_interactive() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("lock");
        let store_path = dir.path().join("trust.toml");
        let now = chrono::Utc::now();

        TrustStore::gate(&lock_path, &store_path, &github_ref("bad-actor"), true, &AlwaysBlock, now).unwrap_err();

        let err = TrustStore::gate(&lock_path, &store_path, &github_ref("bad-actor"), true, &AlwaysTrust, now).unwrap_err();
        assert!(matches!(err, ErrorCode::BlockedCreator(_)));
    }
}
