//! In-memory [`Vcs`] implementation
//!
//! [`FakeRemotes`] plays the role of the hosting side: a set of repositories
//! keyed by URL, each with branches, tags and known commits that tests can
//! change between reconciliations. [`FakeRepo`] is a local repository that
//! clones and fetches from it, and records every mutating operation so tests
//! can assert exactly what a reconciliation did.

use crate::core::CommodoreError;
use crate::git::{Head, RemoteUrls, Vcs};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Default)]
struct Upstream {
    branches: BTreeMap<String, String>,
    tags: BTreeMap<String, String>,
    commits: BTreeSet<String>,
}

impl Upstream {
    fn objects(&self) -> impl Iterator<Item = &String> {
        self.branches.values().chain(self.tags.values()).chain(self.commits.iter())
    }
}

/// Upstream repositories reachable by URL. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeRemotes {
    repos: Arc<Mutex<HashMap<String, Upstream>>>,
}

impl FakeRemotes {
    fn repos(&self) -> MutexGuard<'_, HashMap<String, Upstream>> {
        self.repos.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates or moves a branch of the repository at `url`.
    pub fn set_branch(&self, url: &str, branch: &str, commit: &str) {
        self.repos().entry(url.to_string()).or_default().branches.insert(branch.to_string(), commit.to_string());
    }

    /// Deletes a branch of the repository at `url`.
    pub fn remove_branch(&self, url: &str, branch: &str) {
        if let Some(upstream) = self.repos().get_mut(url) {
            upstream.branches.remove(branch);
        }
    }

    /// Creates or moves a tag of the repository at `url`.
    pub fn set_tag(&self, url: &str, tag: &str, commit: &str) {
        self.repos().entry(url.to_string()).or_default().tags.insert(tag.to_string(), commit.to_string());
    }

    /// Deletes a tag of the repository at `url`.
    pub fn remove_tag(&self, url: &str, tag: &str) {
        if let Some(upstream) = self.repos().get_mut(url) {
            upstream.tags.remove(tag);
        }
    }

    /// Adds a commit reachable only through history.
    pub fn add_commit(&self, url: &str, commit: &str) {
        self.repos().entry(url.to_string()).or_default().commits.insert(commit.to_string());
    }

    fn snapshot(&self, url: &str) -> Option<Upstream> {
        self.repos().get(url).cloned()
    }
}

#[derive(Debug, Default)]
struct State {
    cloned: bool,
    remotes: BTreeMap<String, RemoteUrls>,
    tracking: BTreeMap<String, BTreeMap<String, String>>,
    objects: BTreeSet<String>,
    upstreams: BTreeMap<String, String>,
    head: Option<Head>,
    dirty: bool,
    calls: Vec<String>,
}

/// A local repository living entirely in memory.
#[derive(Debug, Clone)]
pub struct FakeRepo {
    path: PathBuf,
    remotes: FakeRemotes,
    state: Arc<Mutex<State>>,
}

fn command_error(operation: &str, stderr: String) -> anyhow::Error {
    CommodoreError::GitCommandError {
        operation: operation.to_string(),
        stderr,
    }
    .into()
}

impl FakeRepo {
    /// A not yet cloned repository at `path` that reaches `remotes`.
    pub fn new(path: impl Into<PathBuf>, remotes: &FakeRemotes) -> Self {
        Self {
            path: path.into(),
            remotes: remotes.clone(),
            state: Arc::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutating operations performed so far, in git command syntax.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Forgets recorded operations.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Simulates an uncommitted modification of a tracked file.
    pub fn make_dirty(&self) {
        self.state().dirty = true;
    }

    /// Current `HEAD`; unborn `master` before the first clone.
    pub fn head_state(&self) -> Head {
        self.state().head.clone().unwrap_or(Head::Unborn {
            branch: "master".to_string(),
        })
    }

    /// URLs of a remote.
    pub fn remote(&self, name: &str) -> Option<RemoteUrls> {
        self.state().remotes.get(name).cloned()
    }

    /// Upstream configured for a local branch.
    pub fn upstream_of(&self, branch: &str) -> Option<String> {
        self.state().upstreams.get(branch).cloned()
    }

    fn record(&self, call: String) {
        self.state().calls.push(call);
    }

    fn require_remote(state: &State, remote: &str) -> Result<()> {
        if state.remotes.contains_key(remote) {
            Ok(())
        } else {
            Err(command_error("remote", format!("error: No such remote: '{remote}'")))
        }
    }
}

impl Vcs for FakeRepo {
    fn path(&self) -> &Path {
        &self.path
    }

    fn is_repository(&self) -> bool {
        self.state().cloned
    }

    async fn clone_from(&self, url: &str) -> Result<()> {
        self.record(format!("clone {url}"));
        let Some(upstream) = self.remotes.snapshot(url) else {
            return Err(CommodoreError::GitCloneFailed {
                url: url.to_string(),
                reason: format!("fatal: repository '{url}' not found"),
            }
            .into());
        };

        let mut state = self.state();
        if state.cloned {
            return Err(CommodoreError::GitCloneFailed {
                url: url.to_string(),
                reason: format!("fatal: destination path '{}' already exists", self.path.display()),
            }
            .into());
        }

        let default_branch = if upstream.branches.contains_key("master") {
            Some("master".to_string())
        } else {
            upstream.branches.keys().next().cloned()
        };

        state.cloned = true;
        state.remotes.insert(
            "origin".to_string(),
            RemoteUrls {
                fetch: url.to_string(),
                push: url.to_string(),
            },
        );
        state.objects.extend(upstream.objects().cloned());
        state.head = Some(match default_branch {
            Some(branch) => {
                state.upstreams.insert(branch.clone(), format!("origin/{branch}"));
                Head::Attached {
                    commit: upstream.branches[&branch].clone(),
                    branch,
                }
            }
            None => Head::Unborn {
                branch: "master".to_string(),
            },
        });
        state.tracking.insert("origin".to_string(), upstream.branches);
        Ok(())
    }

    async fn fetch(&self, remote: &str) -> Result<()> {
        self.record(format!("fetch {remote}"));
        let url = self
            .remote(remote)
            .map(|urls| urls.fetch)
            .ok_or_else(|| command_error("fetch", format!("fatal: '{remote}' does not appear to be a git repository")))?;
        let upstream = self
            .remotes
            .snapshot(&url)
            .ok_or_else(|| command_error("fetch", format!("fatal: repository '{url}' not found")))?;

        let mut state = self.state();
        state.objects.extend(upstream.objects().cloned());
        state.tracking.insert(remote.to_string(), upstream.branches);
        Ok(())
    }

    async fn remote_urls(&self, remote: &str) -> Result<Option<RemoteUrls>> {
        Ok(self.remote(remote))
    }

    async fn add_remote(&self, remote: &str, url: &str) -> Result<()> {
        self.record(format!("remote add {remote} {url}"));
        let mut state = self.state();
        if state.remotes.contains_key(remote) {
            return Err(command_error("remote", format!("error: remote {remote} already exists.")));
        }
        state.remotes.insert(
            remote.to_string(),
            RemoteUrls {
                fetch: url.to_string(),
                push: url.to_string(),
            },
        );
        Ok(())
    }

    async fn set_push_url(&self, remote: &str, url: &str) -> Result<()> {
        self.record(format!("remote set-url --push {remote} {url}"));
        let mut state = self.state();
        Self::require_remote(&state, remote)?;
        if let Some(urls) = state.remotes.get_mut(remote) {
            urls.push = url.to_string();
        }
        Ok(())
    }

    async fn remove_remote(&self, remote: &str) -> Result<()> {
        self.record(format!("remote remove {remote}"));
        let mut state = self.state();
        Self::require_remote(&state, remote)?;
        state.remotes.remove(remote);
        state.tracking.remove(remote);
        let prefix = format!("{remote}/");
        state.upstreams.retain(|_, upstream| !upstream.starts_with(&prefix));
        Ok(())
    }

    async fn rename_remote(&self, old: &str, new: &str) -> Result<()> {
        self.record(format!("remote rename {old} {new}"));
        let mut state = self.state();
        Self::require_remote(&state, old)?;
        if state.remotes.contains_key(new) {
            return Err(command_error("remote", format!("error: remote {new} already exists.")));
        }
        if let Some(urls) = state.remotes.remove(old) {
            state.remotes.insert(new.to_string(), urls);
        }
        if let Some(refs) = state.tracking.remove(old) {
            state.tracking.insert(new.to_string(), refs);
        }
        let prefix = format!("{old}/");
        for upstream in state.upstreams.values_mut() {
            if let Some(branch) = upstream.strip_prefix(&prefix) {
                *upstream = format!("{new}/{branch}");
            }
        }
        Ok(())
    }

    async fn remote_branch_commit(&self, remote: &str, branch: &str) -> Result<Option<String>> {
        Ok(self.state().tracking.get(remote).and_then(|refs| refs.get(branch)).cloned())
    }

    async fn tag_commit(&self, remote: &str, tag: &str) -> Result<Option<String>> {
        let url = self
            .remote(remote)
            .map(|urls| urls.fetch)
            .ok_or_else(|| command_error("ls-remote", format!("fatal: '{remote}' does not appear to be a git repository")))?;
        let advertised = self.remotes.snapshot(&url).and_then(|upstream| upstream.tags.get(tag).cloned());
        Ok(advertised.filter(|commit| self.state().objects.contains(commit)))
    }

    async fn resolve_commit(&self, rev: &str) -> Result<Option<String>> {
        let rev = rev.to_ascii_lowercase();
        let state = self.state();
        let mut matches = state.objects.iter().filter(|object| object.starts_with(&rev));
        Ok(match (matches.next(), matches.next()) {
            (Some(commit), None) => Some(commit.clone()),
            _ => None,
        })
    }

    async fn head(&self) -> Result<Head> {
        self.state()
            .head
            .clone()
            .ok_or_else(|| command_error("rev-parse", "fatal: not a git repository".to_string()))
    }

    async fn upstream(&self, branch: &str) -> Result<Option<String>> {
        Ok(self.upstream_of(branch))
    }

    async fn checkout_branch(&self, branch: &str, remote: &str) -> Result<()> {
        self.record(format!("checkout -B {branch} {remote}/{branch}"));
        let mut state = self.state();
        let commit = state.tracking.get(remote).and_then(|refs| refs.get(branch)).cloned().ok_or_else(|| {
            anyhow::Error::from(CommodoreError::GitCheckoutFailed {
                reference: format!("{remote}/{branch}"),
                reason: format!("fatal: '{remote}/{branch}' is not a commit"),
            })
        })?;
        state.upstreams.insert(branch.to_string(), format!("{remote}/{branch}"));
        state.head = Some(Head::Attached {
            branch: branch.to_string(),
            commit,
        });
        state.dirty = false;
        Ok(())
    }

    async fn checkout_detached(&self, commit: &str) -> Result<()> {
        self.record(format!("checkout --detach {commit}"));
        let mut state = self.state();
        if !state.objects.contains(commit) {
            return Err(CommodoreError::GitCheckoutFailed {
                reference: commit.to_string(),
                reason: format!("fatal: reference is not a tree: {commit}"),
            }
            .into());
        }
        state.head = Some(Head::Detached {
            commit: commit.to_string(),
        });
        state.dirty = false;
        Ok(())
    }

    async fn reset_hard(&self) -> Result<()> {
        self.record("reset --hard".to_string());
        self.state().dirty = false;
        Ok(())
    }

    async fn is_dirty(&self) -> Result<bool> {
        Ok(self.state().dirty)
    }
}
