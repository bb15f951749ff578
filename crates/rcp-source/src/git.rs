//! Git-backed fetch for `Reference::Git` sources (spec §4.8 "fetching uses
//! library calls only; references are never passed to a shell"). Keeps a
//! bare clone per upstream URL, fetched on repeat use, with `git archive |
//! tar` checkout of the resolved commit into the destination directory.
//! All arguments are passed to `Command` as separate args, never
//! interpolated into a shell string.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};

use crate::reference::{GitHost, Reference};

pub fn clone_url_for(host: GitHost, owner: &str, repo: &str) -> String {
    let host_domain = match host {
        GitHost::GitHub => "github.com",
        GitHost::GitLab => "gitlab.com",
        GitHost::Bitbucket => "bitbucket.org",
        GitHost::Other => "github.com",
    };
    format!("https://{host_domain}/{owner}/{repo}.git")
}

/// A content-addressed key suitable for `rcp-source::cache::Cache`.
pub fn normalized_reference(reference: &Reference) -> Option<String> {
    match reference {
        Reference::Git { host, owner, repo, git_ref } => {
            let ref_label = git_ref.as_deref().unwrap_or("HEAD");
            Some(format!("{}@{ref_label}", clone_url_for(*host, owner, repo)))
        }
        _ => None,
    }
}

/// Filesystem-safe key derived from a clone URL, used to name the bare
/// CAS directory.
fn cas_key(url: &str) -> String {
    url.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

pub struct GitFetcher {
    cache_root: PathBuf,
}

impl GitFetcher {
    pub fn new(cache_root: PathBuf) -> Self {
        Self { cache_root }
    }

    fn cas_dir(&self, url: &str) -> PathBuf {
        self.cache_root.join("git").join(cas_key(url))
    }

    /// Clone (or fetch, if already cached) a bare mirror of `url` and
    /// return its CAS path.
    fn ensure_cached(&self, url: &str) -> Result<PathBuf> {
        let cas = self.cas_dir(url);

        if cas.join("HEAD").is_file() {
            let status = Command::new("git")
                .args(["fetch", "--quiet", "origin", "+refs/heads/*:refs/heads/*"])
                .current_dir(&cas)
                .status()
                .context("failed to run git fetch")?;
            if !status.success() {
                bail!("git fetch failed in {}", cas.display());
            }
        } else {
            std::fs::create_dir_all(&cas).with_context(|| format!("failed to create {}", cas.display()))?;
            let status = Command::new("git")
                .args(["clone", "--bare", "--quiet", url])
                .arg(&cas)
                .status()
                .context("failed to run git clone")?;
            if !status.success() {
                let _ = std::fs::remove_dir_all(&cas);
                bail!("git clone failed for {url}");
            }
        }

        Ok(cas)
    }

    /// Resolve a git ref (branch, tag, or commit; `None` means the
    /// default branch) to a full commit hash.
    fn resolve_commit(cas_dir: &Path, git_ref: Option<&str>) -> Result<String> {
        let ref_spec = git_ref.unwrap_or("HEAD");
        let output = Command::new("git")
            .args(["rev-parse", ref_spec])
            .current_dir(cas_dir)
            .output()
            .context("failed to run git rev-parse")?;
        if !output.status.success() {
            bail!("git rev-parse {ref_spec} failed: {}", String::from_utf8_lossy(&output.stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Extract `commit`'s tree into `dest` via `git archive | tar`, never
    /// through a shell — the archive bytes are piped directly to `tar`'s
    /// stdin.
    fn checkout_to(cas_dir: &Path, commit: &str, dest: &Path) -> Result<()> {
        if dest.exists() {
            std::fs::remove_dir_all(dest).with_context(|| format!("failed to remove existing {}", dest.display()))?;
        }
        std::fs::create_dir_all(dest).with_context(|| format!("failed to create {}", dest.display()))?;

        let output = Command::new("git")
            .args(["archive", "--format=tar", commit])
            .current_dir(cas_dir)
            .output()
            .context("git archive failed")?;
        if !output.status.success() {
            bail!("git archive failed: {}", String::from_utf8_lossy(&output.stderr));
        }

        let status = Command::new("tar")
            .args(["xf", "-"])
            .current_dir(dest)
            .stdin(std::process::Stdio::piped())
            .spawn()
            .and_then(|mut child| {
                use std::io::Write;
                if let Some(stdin) = child.stdin.as_mut() {
                    stdin.write_all(&output.stdout)?;
                }
                child.wait()
            })
            .context("tar extraction failed")?;

        if !status.success() {
            bail!("tar extraction failed for {commit}");
        }

        Ok(())
    }

    /// Fetch `host/owner/repo` at `git_ref` (or the default branch) into
    /// `dest`, returning the resolved commit hash actually checked out.
    pub fn fetch(&self, host: GitHost, owner: &str, repo: &str, git_ref: Option<&str>, dest: &Path) -> Result<String> {
        let url = clone_url_for(host, owner, repo);
        let cas = self.ensure_cached(&url)?;
        let commit = Self::resolve_commit(&cas, git_ref)?;
        Self::checkout_to(&cas, &commit, dest)?;
        Ok(commit)
    }
}

/// A git ref is pinned (and therefore cacheable forever, per §6.5) when it
/// looks like a full commit hash rather than a branch or tag name.
pub fn is_pinned_ref(git_ref: Option<&str>) -> bool {
    match git_ref {
        Some(r) => r.len() >= 40 && r.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}
