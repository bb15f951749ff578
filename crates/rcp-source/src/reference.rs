//! Reference classification (spec §4.8). First match wins across seven
//! rules; a classified reference is then checked for shell metacharacters
//! before anything is fetched.

/// A classified source reference, ready to be handed to the matching
/// fetcher (local filesystem, git, tarball, or the package registry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// `file:` prefix or a path recognized as local (rules 4-5).
    Local { path: String },
    /// `github:`/`gitlab:`/`bitbucket:`/`git+...`/`.git` suffix/`ssh://git@`
    /// /`git://`, or the bare `user/repo` shorthand (rule 6, which always
    /// resolves to github).
    Git {
        host: GitHost,
        owner: String,
        repo: String,
        git_ref: Option<String>,
    },
    /// Any other `http(s)://` URL (rule 3).
    Tarball { url: String },
    /// `npm:`/`jsr:` explicit prefixes, or anything matching no other rule
    /// (rule 7).
    Package { registry: Registry, name: String, version: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHost {
    GitHub,
    GitLab,
    Bitbucket,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registry {
    Npm,
    Jsr,
    Generic,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("reference contains a shell metacharacter: {0}")]
    SecurityRejected(String),
}

const SHELL_METACHARACTERS: &[char] = &[';', '|', '`', '$', '(', ')', '{', '}', '!', '>', '<'];

/// Classify `reference`, rejecting it outright if it contains a shell
/// metacharacter (§4.8 "Security validation" — checked regardless of which
/// rule matched, before any fetch is attempted, per §8 property 8).
pub fn classify(reference: &str) -> Result<Reference, ClassifyError> {
    if let Some(c) = reference.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
        return Err(ClassifyError::SecurityRejected(format!(
            "'{c}' in '{reference}'"
        )));
    }

    Ok(classify_unchecked(reference))
}

fn classify_unchecked(reference: &str) -> Reference {
    // Rule 1: explicit prefixes.
    if let Some(path) = reference.strip_prefix("file:") {
        return Reference::Local { path: path.to_string() };
    }
    if let Some(rest) = reference.strip_prefix("npm:") {
        return package_ref(Registry::Npm, rest);
    }
    if let Some(rest) = reference.strip_prefix("jsr:") {
        return package_ref(Registry::Jsr, rest);
    }
    if let Some(rest) = reference.strip_prefix("github:") {
        return git_shorthand(GitHost::GitHub, rest);
    }
    if let Some(rest) = reference.strip_prefix("gitlab:") {
        return git_shorthand(GitHost::GitLab, rest);
    }
    if let Some(rest) = reference.strip_prefix("bitbucket:") {
        return git_shorthand(GitHost::Bitbucket, rest);
    }
    if let Some(rest) = reference.strip_prefix("git+") {
        return git_url(rest);
    }

    // Rule 2: `.git` suffix or ssh/git scheme.
    if reference.ends_with(".git")
        || reference.starts_with("ssh://git@")
        || reference.starts_with("git://")
    {
        return git_url(reference);
    }

    // Rule 3: other http(s) URLs are tarballs.
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return Reference::Tarball { url: reference.to_string() };
    }

    // Rule 4: Windows path.
    if is_windows_path(reference) {
        return Reference::Local { path: reference.to_string() };
    }

    // Rule 5: Unix path.
    if reference.starts_with('/')
        || reference.starts_with("./")
        || reference.starts_with("../")
        || reference.starts_with("~/")
    {
        return Reference::Local { path: reference.to_string() };
    }

    // Rule 6: `user/repo[#branch|@tag]` shorthand.
    if let Some(shorthand) = parse_shorthand(reference) {
        return shorthand;
    }

    // Rule 7: package-registry reference fallback.
    package_ref(Registry::Generic, reference)
}

fn is_windows_path(reference: &str) -> bool {
    let bytes = reference.as_bytes();
    let has_drive_letter = bytes.len() > 1 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    has_drive_letter || reference.starts_with("\\\\") || reference.starts_with(".\\") || reference.starts_with("..\\")
}

fn git_shorthand(host: GitHost, rest: &str) -> Reference {
    let (owner_repo, git_ref) = split_ref(rest);
    let (owner, repo) = owner_repo.split_once('/').unwrap_or(("", owner_repo));
    Reference::Git {
        host,
        owner: owner.to_string(),
        repo: repo.to_string(),
        git_ref,
    }
}

fn git_url(rest: &str) -> Reference {
    let (url, git_ref) = split_ref(rest);
    let host = if url.contains("github.com") {
        GitHost::GitHub
    } else if url.contains("gitlab.com") {
        GitHost::GitLab
    } else if url.contains("bitbucket.org") {
        GitHost::Bitbucket
    } else {
        GitHost::Other
    };
    let trimmed = url.trim_end_matches(".git");
    let (owner, repo) = trimmed
        .rsplit_once('/')
        .map(|(prefix, repo)| (prefix.rsplit_once('/').map(|(_, o)| o).unwrap_or(prefix), repo))
        .unwrap_or(("", trimmed));
    Reference::Git {
        host,
        owner: owner.to_string(),
        repo: repo.to_string(),
        git_ref,
    }
}

/// Split `owner/repo@tag` or `owner/repo#branch` into the base and ref.
fn split_ref(s: &str) -> (&str, Option<String>) {
    if let Some((base, tag)) = s.split_once('@') {
        return (base, Some(tag.to_string()));
    }
    if let Some((base, branch)) = s.split_once('#') {
        return (base, Some(branch.to_string()));
    }
    (s, None)
}

fn parse_shorthand(reference: &str) -> Option<Reference> {
    let (base, git_ref) = split_ref(reference);
    let mut parts = base.split('/');
    let owner = parts.next()?;
    let repo = parts.next()?;
    if parts.next().is_some() || owner.is_empty() || repo.is_empty() {
        return None;
    }
    // A dot in the owner segment means this looks like a domain
    // (`example.com/path`), not a github `owner/repo` shorthand.
    if owner.contains('.') {
        return None;
    }
    Some(Reference::Git {
        host: GitHost::GitHub,
        owner: owner.to_string(),
        repo: repo.to_string(),
        git_ref,
    })
}

fn package_ref(registry: Registry, rest: &str) -> Reference {
    let (name, version) = match rest.rsplit_once('@') {
        Some((name, version)) if !name.is_empty() => (name.to_string(), Some(version.to_string())),
        _ => (rest.to_string(), None),
    };
    Reference::Package { registry, name, version }
}
