//! Working-tree reconciliation
//!
//! [`Component::ensure`] brings a component's working tree in line with its
//! declared URL and version. The outcome after success is always the same:
//!
//! - `origin` fetches from the declared URL and pushes to
//!   [`push_url`](crate::git::remote::push_url) of it,
//! - `HEAD` is attached to a local branch tracking `origin/<version>` at its
//!   tip, or detached at the tag's or commit's exact commit,
//! - tracked files carry no uncommitted modifications.
//!
//! # Replacing `origin`
//!
//! When the declared URL differs from `origin`'s, the new remote is set up
//! and fetched under the name [`STAGING_REMOTE`] first. Only once the version
//! resolves against it is `origin` removed and the staging remote renamed in
//! its place. A failure or interruption before that point leaves the old
//! `origin` and the checkout untouched; a leftover staging remote is removed
//! at the start of the next reconciliation.
//!
//! # Idempotence
//!
//! Reconciling an already reconciled tree fetches `origin` once and changes
//! nothing else: checkout and reset only run when `HEAD`, the upstream or
//! the tree differ from the target state.

use crate::component::lock::ComponentLock;
use crate::component::resolver::{ResolvedVersion, resolve};
use crate::component::{Component, RepoResultExt};
use crate::git::remote::push_url;
use crate::git::{Head, ORIGIN, RemoteUrls, Vcs};
use anyhow::Result;
use tracing::{debug, info, warn};

/// Name under which a replacement `origin` is prepared.
pub const STAGING_REMOTE: &str = "commodore-staging";

impl<V: Vcs> Component<V> {
    /// Reconciles the working tree with the declared URL and version.
    ///
    /// Returns what the version resolved to. Holds the component's
    /// [`ComponentLock`] for the whole operation.
    ///
    /// # Errors
    ///
    /// - [`RefError`](crate::core::CommodoreError::RefError) if the version
    ///   names no branch, tag or commit after fetching. An existing checkout
    ///   and its `origin` are left as they were.
    /// - [`RepositoryError`](crate::core::CommodoreError::RepositoryError) if
    ///   a git operation fails. Nothing is retried.
    pub async fn ensure(&mut self) -> Result<ResolvedVersion> {
        let _lock = ComponentLock::acquire(&self.directory).await?;

        let resolved = if self.repo.is_repository() {
            self.refresh_remote().await?
        } else {
            self.clone_repository().await?
        };

        self.apply(&resolved).await?;

        if self.repo.is_dirty().await.repo_op(&self.name, "status")? {
            debug!("Discarding local modifications of {}", self.name);
            self.repo.reset_hard().await.repo_op(&self.name, "reset")?;
        }

        info!("Component {} at {}", self.name, resolved);
        Ok(resolved)
    }

    async fn clone_repository(&self) -> Result<ResolvedVersion> {
        info!("Cloning {} from {}", self.name, self.repo_url);
        self.repo.clone_from(&self.repo_url).await.repo_op(&self.name, "clone")?;
        self.repo.set_push_url(ORIGIN, &push_url(&self.repo_url)).await.repo_op(&self.name, "remote")?;
        resolve(&self.repo, ORIGIN, &self.name, &self.version).await
    }

    async fn refresh_remote(&self) -> Result<ResolvedVersion> {
        if self.repo.remote_urls(STAGING_REMOTE).await.repo_op(&self.name, "remote")?.is_some() {
            debug!("Removing leftover remote {STAGING_REMOTE} of {}", self.name);
            self.repo.remove_remote(STAGING_REMOTE).await.repo_op(&self.name, "remote")?;
        }

        let origin = self.repo.remote_urls(ORIGIN).await.repo_op(&self.name, "remote")?;
        match origin {
            Some(urls) if urls.fetch == self.repo_url => {
                let push = push_url(&self.repo_url);
                if urls.push != push {
                    debug!("Updating push URL of {} to {push}", self.name);
                    self.repo.set_push_url(ORIGIN, &push).await.repo_op(&self.name, "remote")?;
                }
                debug!("Fetching {} from {}", self.name, self.repo_url);
                self.repo.fetch(ORIGIN).await.repo_op(&self.name, "fetch")?;
                resolve(&self.repo, ORIGIN, &self.name, &self.version).await
            }
            other => self.replace_origin(other).await,
        }
    }

    async fn replace_origin(&self, current: Option<RemoteUrls>) -> Result<ResolvedVersion> {
        match &current {
            Some(urls) => info!("Switching {} from {} to {}", self.name, urls.fetch, self.repo_url),
            None => info!("Adding remote {ORIGIN} {} to {}", self.repo_url, self.name),
        }

        self.repo.add_remote(STAGING_REMOTE, &self.repo_url).await.repo_op(&self.name, "remote")?;

        let staged = async {
            self.repo
                .set_push_url(STAGING_REMOTE, &push_url(&self.repo_url))
                .await
                .repo_op(&self.name, "remote")?;
            self.repo.fetch(STAGING_REMOTE).await.repo_op(&self.name, "fetch")?;
            resolve(&self.repo, STAGING_REMOTE, &self.name, &self.version).await
        }
        .await;

        let resolved = match staged {
            Ok(resolved) => resolved,
            Err(e) => {
                if let Err(cleanup) = self.repo.remove_remote(STAGING_REMOTE).await {
                    warn!("Failed to remove remote {STAGING_REMOTE} of {}: {cleanup:#}", self.name);
                }
                return Err(e);
            }
        };

        if current.is_some() {
            self.repo.remove_remote(ORIGIN).await.repo_op(&self.name, "remote")?;
        }
        self.repo.rename_remote(STAGING_REMOTE, ORIGIN).await.repo_op(&self.name, "remote")?;

        Ok(resolved)
    }

    async fn apply(&self, resolved: &ResolvedVersion) -> Result<()> {
        let head = self.repo.head().await.repo_op(&self.name, "checkout")?;

        match resolved {
            ResolvedVersion::Branch { name, commit } => {
                let tracking = format!("{ORIGIN}/{name}");
                let at_tip = matches!(
                    &head,
                    Head::Attached { branch, commit: c } if branch == name && c == commit
                );
                let tracks = at_tip
                    && self.repo.upstream(name).await.repo_op(&self.name, "checkout")?.as_deref()
                        == Some(tracking.as_str());

                if !tracks {
                    debug!("Checking out branch {name} of {}", self.name);
                    self.repo.checkout_branch(name, ORIGIN).await.repo_op(&self.name, "checkout")?;
                }
            }
            ResolvedVersion::Tag { commit, .. } | ResolvedVersion::Commit { commit } => {
                let detached_here = matches!(&head, Head::Detached { commit: c } if c == commit);
                if !detached_here {
                    debug!("Detaching {} at {commit}", self.name);
                    self.repo.checkout_detached(commit).await.repo_op(&self.name, "checkout")?;
                }
            }
        }

        Ok(())
    }
}
