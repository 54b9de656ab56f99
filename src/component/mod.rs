//! Components and their working trees
//!
//! A [`Component`] is a configuration module sourced from a git repository.
//! It is declared as a `{name, repository URL, version}` triple and owns
//! exactly one working-tree directory, by default
//! `<work_dir>/dependencies/<name>` (see [`component_dir`]).
//!
//! Changing [`Component::set_repo_url`] or [`Component::set_version`] only
//! records the desired state. Nothing touches the working tree until
//! [`Component::ensure`] reconciles it:
//!
//! 1. clone the repository, or refresh `origin` (recreating it when the URL
//!    changed),
//! 2. resolve the version to a branch, tag or commit ([`resolver`]),
//! 3. check out the result and discard uncommitted modifications ([`sync`]).
//!
//! After a successful reconciliation the component's manifest template can be
//! rendered with [`Component::render_jsonnetfile_json`] ([`jsonnetfile`]).
//!
//! # Examples
//!
//! ```rust,no_run
//! use commodore::component::{component_dir, Component};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let work_dir = Path::new("/work");
//! let mut argocd = Component::new(
//!     "argocd",
//!     "https://github.com/projectsyn/component-argocd.git",
//!     "master",
//!     component_dir(work_dir, "argocd"),
//! );
//! argocd.ensure().await?;
//!
//! argocd.set_version("v1.2.0");
//! argocd.ensure().await?;
//! # Ok(())
//! # }
//! ```

pub mod aliases;
pub mod batch;
pub mod jsonnetfile;
pub mod lock;
pub mod resolver;
pub mod sync;

pub use aliases::{component_deprecation_notices, verify_component_aliases};
pub use batch::{DEFAULT_MAX_PARALLEL, SyncPolicy, SyncReport, sync_components};
pub use jsonnetfile::RenderOutcome;
pub use resolver::ResolvedVersion;

use crate::core::CommodoreError;
use crate::git::{GitRepo, Head, ORIGIN, Vcs};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Working-tree directory of component `name` below `work_dir`.
#[must_use]
pub fn component_dir(work_dir: &Path, name: &str) -> PathBuf {
    work_dir.join("dependencies").join(name)
}

/// Key under which component `name` appears in a parameter tree.
///
/// Parameter keys cannot contain hyphens, so every `-` becomes `_`. Class and
/// import names keep the hyphenated name.
///
/// ```rust
/// use commodore::component::parameter_key;
///
/// assert_eq!(parameter_key("nfs-provisioner"), "nfs_provisioner");
/// ```
#[must_use]
pub fn parameter_key(name: &str) -> String {
    name.replace('-', "_")
}

/// A component and the repository backing its working tree.
///
/// The repository handle defaults to [`GitRepo`]; any [`Vcs`] implementation
/// can be supplied through [`Component::with_repo`].
#[derive(Debug)]
pub struct Component<V = GitRepo> {
    name: String,
    repo_url: String,
    version: String,
    directory: PathBuf,
    repo: V,
}

impl Component<GitRepo> {
    /// Declares a component whose working tree lives at `directory`.
    ///
    /// The directory is not inspected until [`ensure`](Component::ensure).
    pub fn new(
        name: impl Into<String>,
        repo_url: impl Into<String>,
        version: impl Into<String>,
        directory: impl Into<PathBuf>,
    ) -> Self {
        let name = name.into();
        let directory = directory.into();
        let repo = GitRepo::new(&directory).with_context(name.clone());
        Self {
            name,
            repo_url: repo_url.into(),
            version: version.into(),
            directory,
            repo,
        }
    }

    /// Reconstructs a component from a repository already checked out at
    /// `directory`, taking the URL from `origin` and the version from `HEAD`.
    pub async fn open_existing(name: impl Into<String>, directory: impl Into<PathBuf>) -> Result<Self> {
        let name = name.into();
        let repo = GitRepo::new(directory.into()).with_context(name.clone());
        Self::from_repository(name, repo).await
    }
}

impl<V: Vcs> Component<V> {
    /// Declares a component backed by an arbitrary repository handle. The
    /// working-tree directory is the handle's path.
    pub fn with_repo(
        name: impl Into<String>,
        repo_url: impl Into<String>,
        version: impl Into<String>,
        repo: V,
    ) -> Self {
        Self {
            name: name.into(),
            repo_url: repo_url.into(),
            version: version.into(),
            directory: repo.path().to_path_buf(),
            repo,
        }
    }

    /// Reconstructs a component from an existing repository.
    ///
    /// The version is the branch `HEAD` is attached to, or the commit it is
    /// detached at.
    pub async fn from_repository(name: impl Into<String>, repo: V) -> Result<Self> {
        let name = name.into();
        if !repo.is_repository() {
            return Err(CommodoreError::RepositoryError {
                component: name,
                operation: "open".to_string(),
                reason: format!("{} is not a git repository", repo.path().display()),
            }
            .into());
        }

        let urls = repo.remote_urls(ORIGIN).await.repo_op(&name, "open")?;
        let Some(urls) = urls else {
            return Err(CommodoreError::RepositoryError {
                component: name,
                operation: "open".to_string(),
                reason: format!("repository has no remote '{ORIGIN}'"),
            }
            .into());
        };

        let version = match repo.head().await.repo_op(&name, "open")? {
            Head::Attached { branch, .. } | Head::Unborn { branch } => branch,
            Head::Detached { commit } => commit,
        };

        Ok(Self::with_repo(name, urls.fetch, version, repo))
    }

    /// Component name as declared (may contain hyphens).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared pull URL.
    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    /// Declared version specifier.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Working-tree directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The repository handle.
    pub fn repo(&self) -> &V {
        &self.repo
    }

    /// Key of this component in parameter trees.
    pub fn parameters_key(&self) -> String {
        parameter_key(&self.name)
    }

    /// Records a new pull URL. Applied by the next [`ensure`](Self::ensure).
    pub fn set_repo_url(&mut self, repo_url: impl Into<String>) {
        self.repo_url = repo_url.into();
    }

    /// Records a new version. Applied by the next [`ensure`](Self::ensure).
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }
}

/// Converts failures of repository operations into
/// [`CommodoreError::RepositoryError`] for a named component.
///
/// Errors that already are component-level ([`CommodoreError::RefError`],
/// [`CommodoreError::RepositoryError`]) pass through untouched.
pub(crate) trait RepoResultExt<T> {
    fn repo_op(self, component: &str, operation: &str) -> Result<T>;
}

impl<T> RepoResultExt<T> for Result<T> {
    fn repo_op(self, component: &str, operation: &str) -> Result<T> {
        self.map_err(|error| {
            let reason = match error.downcast_ref::<CommodoreError>() {
                Some(CommodoreError::RefError { .. } | CommodoreError::RepositoryError { .. }) => {
                    return error;
                }
                Some(CommodoreError::GitCommandError { stderr, .. }) if !stderr.is_empty() => {
                    stderr.clone()
                }
                Some(
                    CommodoreError::GitCloneFailed { reason, .. }
                    | CommodoreError::GitCheckoutFailed { reason, .. },
                ) => reason.clone(),
                _ => format!("{error:#}"),
            };
            CommodoreError::RepositoryError {
                component: component.to_string(),
                operation: operation.to_string(),
                reason,
            }
            .into()
        })
    }
}
