//! Git access for component working trees
//!
//! Component synchronization only ever talks to a repository through the
//! [`Vcs`] trait: a deliberately narrow set of operations (clone, fetch,
//! remote management, ref lookup, checkout, reset, dirty check). The
//! production implementation is [`GitRepo`], which drives the system `git`
//! binary through [`GitCommand`] so that SSH agents, credential helpers and the
//! user's git configuration all work unchanged. Tests substitute an in-memory
//! implementation (see `test_utils::FakeRepo`).
//!
//! # Remotes
//!
//! Every component repository has a remote named [`ORIGIN`] whose pull URL is
//! the declared repository URL and whose push URL is derived from it by
//! [`remote::push_url`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use commodore::git::{GitRepo, Head, Vcs, ORIGIN};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let repo = GitRepo::new("/work/dependencies/argocd");
//! if !repo.is_repository() {
//!     repo.clone_from("https://github.com/projectsyn/component-argocd.git").await?;
//! }
//! repo.fetch(ORIGIN).await?;
//! if let Head::Attached { branch, .. } = repo.head().await? {
//!     println!("on branch {branch}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod command_builder;
pub mod remote;

use crate::core::CommodoreError;
use crate::git::command_builder::GitCommand;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Name of the remote every component repository is reconciled against.
pub const ORIGIN: &str = "origin";

/// Pull and push URL of a remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrls {
    /// URL used by fetch
    pub fetch: String,
    /// URL used by push
    pub push: String,
}

/// Where `HEAD` points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// Attached to a local branch which has at least one commit.
    Attached {
        /// Short branch name
        branch: String,
        /// Full commit id of the branch tip
        commit: String,
    },
    /// Detached at a commit.
    Detached {
        /// Full commit id
        commit: String,
    },
    /// Attached to a branch that has no commits yet (freshly initialized
    /// repository).
    Unborn {
        /// Short branch name
        branch: String,
    },
}

impl Head {
    /// The commit `HEAD` resolves to, if any.
    #[must_use]
    pub fn commit(&self) -> Option<&str> {
        match self {
            Self::Attached { commit, .. } | Self::Detached { commit } => Some(commit),
            Self::Unborn { .. } => None,
        }
    }

    /// Whether `HEAD` is detached.
    #[must_use]
    pub const fn is_detached(&self) -> bool {
        matches!(self, Self::Detached { .. })
    }
}

/// The repository operations component synchronization is built on.
///
/// Implementations must keep each method atomic from the caller's point of
/// view; the synchronizer composes them so that a failure between two calls
/// never leaves `origin` missing without a usable replacement.
#[allow(async_fn_in_trait)]
pub trait Vcs {
    /// Directory of the working tree.
    fn path(&self) -> &Path;

    /// Whether the directory currently holds a repository.
    fn is_repository(&self) -> bool;

    /// Clones `url` into [`path`](Self::path), fetching all branches and tags.
    /// The resulting repository has `url` as both pull and push URL of
    /// [`ORIGIN`].
    async fn clone_from(&self, url: &str) -> Result<()>;

    /// Fetches a remote including tags, pruning remote-tracking branches and
    /// tags that no longer exist upstream.
    async fn fetch(&self, remote: &str) -> Result<()>;

    /// Pull and push URL of a remote, or `None` if it does not exist.
    async fn remote_urls(&self, remote: &str) -> Result<Option<RemoteUrls>>;

    /// Adds a remote with `url` as its pull URL.
    async fn add_remote(&self, remote: &str, url: &str) -> Result<()>;

    /// Sets the push URL of a remote independently of its pull URL.
    async fn set_push_url(&self, remote: &str, url: &str) -> Result<()>;

    /// Removes a remote along with its remote-tracking branches.
    async fn remove_remote(&self, remote: &str) -> Result<()>;

    /// Renames a remote, moving its remote-tracking branches.
    async fn rename_remote(&self, old: &str, new: &str) -> Result<()>;

    /// Commit of the remote-tracking branch `<remote>/<branch>`, if present.
    /// `branch` is matched as an exact ref name, never as a revision
    /// expression.
    async fn remote_branch_commit(&self, remote: &str, branch: &str) -> Result<Option<String>>;

    /// Commit tag `tag` points to (peeled), if `remote` itself has the tag
    /// and its commit has been fetched. Tags obtained from other remotes do
    /// not count.
    async fn tag_commit(&self, remote: &str, tag: &str) -> Result<Option<String>>;

    /// Full id of the commit `rev` names, if it exists and is unambiguous.
    async fn resolve_commit(&self, rev: &str) -> Result<Option<String>>;

    /// Current `HEAD`.
    async fn head(&self) -> Result<Head>;

    /// Upstream (`<remote>/<branch>`) configured for a local branch.
    async fn upstream(&self, branch: &str) -> Result<Option<String>>;

    /// Creates or resets local `branch` to the tip of `<remote>/<branch>`,
    /// attaches `HEAD` to it and makes it track the remote branch. Local
    /// modifications are discarded.
    async fn checkout_branch(&self, branch: &str, remote: &str) -> Result<()>;

    /// Detaches `HEAD` at `commit`, discarding local modifications.
    async fn checkout_detached(&self, commit: &str) -> Result<()>;

    /// Discards uncommitted modifications of tracked files.
    async fn reset_hard(&self) -> Result<()>;

    /// Whether tracked files have uncommitted modifications.
    async fn is_dirty(&self) -> Result<bool>;
}

/// A repository handle backed by the system `git` command.
///
/// The struct only stores the path (and a log context); every query goes to
/// git so the handle never disagrees with on-disk state.
///
/// # Thread Safety
///
/// `GitRepo` is `Send` and `Sync`, but concurrent mutating operations on the
/// same repository conflict at the git level. Callers serialize them (see
/// `component::lock::ComponentLock`).
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
    context: Option<String>,
}

impl GitRepo {
    /// Creates a handle for the repository at `path`. No validation happens
    /// here; use [`Vcs::is_repository`].
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            context: None,
        }
    }

    /// Labels every git command issued through this handle in debug logs.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn git(&self, cmd: GitCommand) -> GitCommand {
        let cmd = cmd.current_dir(&self.path);
        match &self.context {
            Some(ctx) => cmd.with_context(ctx.clone()),
            None => cmd,
        }
    }

    /// Runs `rev-parse --verify --quiet`, mapping "no such revision" to `None`.
    async fn verify(&self, rev: &str) -> Result<Option<String>> {
        match self.git(GitCommand::verify_ref(rev)).execute_stdout().await {
            Ok(sha) => Ok(Some(sha)),
            Err(e) => match e.downcast_ref::<CommodoreError>() {
                Some(CommodoreError::GitCommandError { stderr, .. })
                    if stderr.is_empty() || stderr.contains("ambiguous") =>
                {
                    Ok(None)
                }
                _ => Err(e),
            },
        }
    }

    /// Peeled commit of the fully qualified ref `refname`, if exactly that ref
    /// exists.
    async fn ref_commit(&self, refname: &str) -> Result<Option<String>> {
        match self.git(GitCommand::show_ref(refname)).execute_success().await {
            Ok(()) => self.verify(&format!("{refname}^{{commit}}")).await,
            Err(e) => match e.downcast_ref::<CommodoreError>() {
                Some(CommodoreError::GitCommandError { stderr, .. })
                    if stderr.is_empty() || stderr.contains("not a valid ref") =>
                {
                    Ok(None)
                }
                _ => Err(e),
            },
        }
    }
}

impl Vcs for GitRepo {
    fn path(&self) -> &Path {
        &self.path
    }

    fn is_repository(&self) -> bool {
        self.path.join(".git").exists()
    }

    async fn clone_from(&self, url: &str) -> Result<()> {
        let parent = self
            .path
            .parent()
            .with_context(|| format!("{} has no parent directory", self.path.display()))?;
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;

        // Clone next to the target and move it into place once git succeeded,
        // so an interrupted clone never leaves a partial repository behind.
        let staging = tempfile::Builder::new()
            .prefix(".clone-")
            .tempdir_in(parent)
            .with_context(|| format!("Failed to create staging directory in {}", parent.display()))?;
        let staged = staging.path().join("repo");

        let mut cmd = GitCommand::clone(url, &staged);
        if let Some(ctx) = &self.context {
            cmd = cmd.with_context(ctx.clone());
        }
        cmd.execute_success().await?;

        if self.path.exists() {
            tokio::fs::remove_dir(&self.path).await.with_context(|| {
                format!("{} exists and is not an empty directory", self.path.display())
            })?;
        }
        tokio::fs::rename(&staged, &self.path)
            .await
            .with_context(|| format!("Failed to move clone into {}", self.path.display()))?;

        Ok(())
    }

    async fn fetch(&self, remote: &str) -> Result<()> {
        self.git(GitCommand::fetch(remote)).execute_success().await
    }

    async fn remote_urls(&self, remote: &str) -> Result<Option<RemoteUrls>> {
        let remotes = self.git(GitCommand::list_remotes()).execute_stdout().await?;
        if !remotes.lines().any(|line| line.trim() == remote) {
            return Ok(None);
        }

        let fetch = self.git(GitCommand::remote_url(remote, false)).execute_stdout().await?;
        let push = self.git(GitCommand::remote_url(remote, true)).execute_stdout().await?;
        Ok(Some(RemoteUrls {
            fetch,
            push,
        }))
    }

    async fn add_remote(&self, remote: &str, url: &str) -> Result<()> {
        self.git(GitCommand::add_remote(remote, url)).execute_success().await
    }

    async fn set_push_url(&self, remote: &str, url: &str) -> Result<()> {
        self.git(GitCommand::set_push_url(remote, url)).execute_success().await
    }

    async fn remove_remote(&self, remote: &str) -> Result<()> {
        self.git(GitCommand::remove_remote(remote)).execute_success().await
    }

    async fn rename_remote(&self, old: &str, new: &str) -> Result<()> {
        self.git(GitCommand::rename_remote(old, new)).execute_success().await
    }

    async fn remote_branch_commit(&self, remote: &str, branch: &str) -> Result<Option<String>> {
        self.ref_commit(&format!("refs/remotes/{remote}/{branch}")).await
    }

    async fn tag_commit(&self, remote: &str, tag: &str) -> Result<Option<String>> {
        let refname = format!("refs/tags/{tag}");
        let listing = self.git(GitCommand::ls_remote_tag(remote, tag)).execute_stdout().await?;

        let mut direct = None;
        let mut peeled = None;
        for line in listing.lines() {
            let Some((object, name)) = line.split_once('\t') else {
                continue;
            };
            if name == refname {
                direct = Some(object.trim());
            } else if name.strip_suffix("^{}") == Some(refname.as_str()) {
                peeled = Some(object.trim());
            }
        }

        match peeled.or(direct) {
            Some(object) => self.verify(&format!("{object}^{{commit}}")).await,
            None => Ok(None),
        }
    }

    async fn resolve_commit(&self, rev: &str) -> Result<Option<String>> {
        self.verify(&format!("{rev}^{{commit}}")).await
    }

    async fn head(&self) -> Result<Head> {
        let branch = match self.git(GitCommand::current_branch()).execute_stdout().await {
            Ok(branch) => Some(branch),
            Err(e) => match e.downcast_ref::<CommodoreError>() {
                Some(CommodoreError::GitCommandError { .. }) => None,
                _ => return Err(e),
            },
        };
        let commit = self.verify("HEAD").await?;

        Ok(match (branch, commit) {
            (Some(branch), Some(commit)) => Head::Attached {
                branch,
                commit,
            },
            (Some(branch), None) => Head::Unborn {
                branch,
            },
            (None, Some(commit)) => Head::Detached {
                commit,
            },
            (None, None) => {
                return Err(CommodoreError::GitCommandError {
                    operation: "rev-parse".to_string(),
                    stderr: format!("HEAD of {} is neither a branch nor a commit", self.path.display()),
                }
                .into());
            }
        })
    }

    async fn upstream(&self, branch: &str) -> Result<Option<String>> {
        match self.git(GitCommand::upstream(branch)).execute_stdout().await {
            Ok(upstream) => Ok(Some(upstream)),
            Err(e) => match e.downcast_ref::<CommodoreError>() {
                Some(CommodoreError::GitCommandError { .. }) => Ok(None),
                _ => Err(e),
            },
        }
    }

    async fn checkout_branch(&self, branch: &str, remote: &str) -> Result<()> {
        let remote_branch = format!("{remote}/{branch}");
        self.git(GitCommand::checkout_branch(branch, &remote_branch)).execute_success().await?;
        self.git(GitCommand::set_upstream(branch, &remote_branch)).execute_success().await
    }

    async fn checkout_detached(&self, commit: &str) -> Result<()> {
        self.git(GitCommand::checkout_detached(commit)).execute_success().await
    }

    async fn reset_hard(&self) -> Result<()> {
        self.git(GitCommand::reset_hard()).execute_success().await
    }

    async fn is_dirty(&self) -> Result<bool> {
        let status = self.git(GitCommand::status_porcelain()).execute_stdout().await?;
        Ok(!status.is_empty())
    }
}

/// Checks whether the `git` executable can be run.
pub fn is_git_installed() -> bool {
    std::process::Command::new(crate::utils::platform::get_git_command())
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Returns [`CommodoreError::GitNotFound`] unless git is available.
pub fn ensure_git_available() -> Result<()> {
    if !is_git_installed() {
        return Err(CommodoreError::GitNotFound.into());
    }
    Ok(())
}
