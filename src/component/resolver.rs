//! Version resolution
//!
//! A version specifier is classified against the refs of a freshly fetched
//! remote with a fixed precedence:
//!
//! 1. remote branch `<remote>/<version>`
//! 2. tag `<version>`
//! 3. commit, if `version` is 4 to 40 hex digits naming a unique commit
//!
//! A name matching both a branch and a tag is therefore always a branch.
//! Branch and tag names are matched exactly. A version that is not a valid
//! ref name (`master~1`, `HEAD`, `v1^{commit}`) names nothing and fails
//! before any ref is looked up.

use crate::component::RepoResultExt;
use crate::core::CommodoreError;
use crate::git::Vcs;
use anyhow::Result;
use std::fmt;

/// What a version specifier resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedVersion {
    /// A remote branch; checked out as a local tracking branch.
    Branch {
        /// Branch name
        name: String,
        /// Tip of the remote branch
        commit: String,
    },
    /// A tag; checked out as a detached `HEAD`.
    Tag {
        /// Tag name
        name: String,
        /// Commit the tag points to
        commit: String,
    },
    /// A commit id (full or abbreviated); checked out as a detached `HEAD`.
    Commit {
        /// Full commit id
        commit: String,
    },
}

impl ResolvedVersion {
    /// The commit the working tree ends up at.
    #[must_use]
    pub fn commit(&self) -> &str {
        match self {
            Self::Branch { commit, .. } | Self::Tag { commit, .. } | Self::Commit { commit } => commit,
        }
    }

    /// `"branch"`, `"tag"` or `"commit"`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Branch { .. } => "branch",
            Self::Tag { .. } => "tag",
            Self::Commit { .. } => "commit",
        }
    }
}

impl fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = &self.commit()[..self.commit().len().min(10)];
        match self {
            Self::Branch { name, .. } | Self::Tag { name, .. } => {
                write!(f, "{} {name} ({short})", self.kind())
            }
            Self::Commit { .. } => write!(f, "commit {short}"),
        }
    }
}

/// Whether `version` is a valid branch or tag name, following the rules of
/// `git check-ref-format --branch`. `HEAD` is rejected as well since
/// `<remote>/HEAD` is a symbolic ref, not a branch.
fn is_valid_ref_name(version: &str) -> bool {
    if version.is_empty() || version == "@" || version == "HEAD" || version.starts_with('-') {
        return false;
    }
    if version.starts_with('/')
        || version.ends_with('/')
        || version.ends_with('.')
        || version.contains("//")
        || version.contains("..")
        || version.contains("@{")
    {
        return false;
    }
    if version
        .chars()
        .any(|c| c.is_ascii_control() || matches!(c, ' ' | '~' | '^' | ':' | '?' | '*' | '[' | '\\'))
    {
        return false;
    }
    version.split('/').all(|part| !part.starts_with('.') && !part.ends_with(".lock"))
}

/// Whether `version` could be an abbreviated or full commit id.
fn looks_like_commit(version: &str) -> bool {
    (4..=40).contains(&version.len()) && version.chars().all(|c| c.is_ascii_hexdigit())
}

/// Resolves `version` of `component` against the refs of `remote`.
///
/// The caller must have fetched `remote` beforehand. Fails with
/// [`CommodoreError::RefError`] if nothing matches, and with
/// [`CommodoreError::RepositoryError`] if the repository cannot be queried.
pub async fn resolve<V: Vcs>(
    repo: &V,
    remote: &str,
    component: &str,
    version: &str,
) -> Result<ResolvedVersion> {
    let ref_error = || -> anyhow::Error {
        CommodoreError::RefError {
            component: component.to_string(),
            version: version.to_string(),
        }
        .into()
    };

    if !is_valid_ref_name(version) {
        tracing::debug!("Version {version:?} of {component} is not a ref name");
        return Err(ref_error());
    }

    if let Some(commit) = repo.remote_branch_commit(remote, version).await.repo_op(component, "resolve")? {
        return Ok(ResolvedVersion::Branch {
            name: version.to_string(),
            commit,
        });
    }

    if let Some(commit) = repo.tag_commit(remote, version).await.repo_op(component, "resolve")? {
        return Ok(ResolvedVersion::Tag {
            name: version.to_string(),
            commit,
        });
    }

    if looks_like_commit(version) {
        let prefix = version.to_ascii_lowercase();
        let commit = repo.resolve_commit(version).await.repo_op(component, "resolve")?;
        if let Some(commit) = commit.filter(|commit| commit.starts_with(&prefix)) {
            return Ok(ResolvedVersion::Commit {
                commit,
            });
        }
    }

    Err(ref_error())
}
