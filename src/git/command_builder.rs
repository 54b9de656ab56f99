//! Type-safe Git command builder for consistent command execution
//!
//! All git invocations in Commodore go through [`GitCommand`]: it runs the
//! system `git` binary with `-C <dir>` (never relying on the process's current
//! directory), applies a timeout, logs under the `git` tracing target and
//! classifies failures into [`CommodoreError`] variants.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::CommodoreError;
use crate::utils::platform::get_git_command;

/// Default time a single git command may run before it is abandoned.
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Builder for constructing and executing git commands.
///
/// # Examples
///
/// ```rust,no_run
/// use commodore::git::command_builder::GitCommand;
///
/// # async fn example() -> anyhow::Result<()> {
/// let head = GitCommand::new()
///     .args(["rev-parse", "HEAD"])
///     .current_dir("/path/to/repo")
///     .with_context("argocd")
///     .execute_stdout()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct GitCommand {
    /// Command arguments passed to git
    args: Vec<String>,

    /// Repository directory, passed to git via `-C`
    current_dir: Option<PathBuf>,

    /// Environment variables to set for the git process
    env_vars: Vec<(String, String)>,

    /// Maximum duration to wait for completion
    timeout_duration: Duration,

    /// Optional context (usually the component name) for log messages
    context: Option<String>,

    /// For clone commands, the URL being cloned
    clone_url: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            // Never block on credential prompts; a missing credential is a failure.
            env_vars: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
            timeout_duration: DEFAULT_GIT_TIMEOUT,
            context: None,
            clone_url: None,
        }
    }
}

impl GitCommand {
    /// Creates an empty command with the default timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the repository directory the command operates on.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Appends a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets a context string included in debug log messages.
    ///
    /// With many components syncing in parallel this is what tells the log
    /// lines of different repositories apart.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn log_prefix(&self) -> String {
        self.context.as_ref().map(|ctx| format!("({ctx}) ")).unwrap_or_default()
    }

    /// Executes the command and returns its captured output.
    ///
    /// # Errors
    ///
    /// A non-zero exit status is converted into
    /// [`CommodoreError::GitCloneFailed`], [`CommodoreError::GitCheckoutFailed`]
    /// or [`CommodoreError::GitCommandError`] depending on the subcommand. A
    /// timeout is reported as [`CommodoreError::GitCommandError`].
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let start = std::time::Instant::now();
        let git_command = get_git_command();
        let prefix = self.log_prefix();
        let mut cmd = Command::new(git_command);

        let mut full_args = Vec::new();
        if let Some(ref dir) = self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());
        cmd.args(&full_args);

        tracing::debug!(target: "git", "{}Executing command: {} {}", prefix, git_command, full_args.join(" "));

        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let operation = self.args.first().cloned().unwrap_or_else(|| "unknown".to_string());

        let duration = self.timeout_duration;
        let output = if let Ok(result) = timeout(duration, cmd.output()).await {
            result.with_context(|| format!("Failed to execute git {}", full_args.join(" ")))?
        } else {
            tracing::warn!(
                target: "git",
                "{}Command timed out after {} seconds: git {}",
                prefix,
                duration.as_secs(),
                full_args.join(" ")
            );
            return Err(CommodoreError::GitCommandError {
                operation,
                stderr: format!(
                    "git command timed out after {} seconds (network issue or credential prompt?)",
                    duration.as_secs()
                ),
            }
            .into());
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "git",
                "{}Command failed with exit code {:?}: {}",
                prefix,
                output.status.code(),
                stderr.trim()
            );

            let reason = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };

            let error = match operation.as_str() {
                "clone" => CommodoreError::GitCloneFailed {
                    url: self.clone_url.unwrap_or_else(|| "unknown".to_string()),
                    reason,
                },
                "checkout" => CommodoreError::GitCheckoutFailed {
                    reference: self.args.last().cloned().unwrap_or_default(),
                    reason,
                },
                _ => CommodoreError::GitCommandError {
                    operation,
                    stderr: reason,
                },
            };
            return Err(error.into());
        }

        if !stdout.trim().is_empty() {
            tracing::trace!(target: "git", "{}{}", prefix, stdout.trim());
        }
        if !stderr.trim().is_empty() {
            tracing::debug!(target: "git", "{}{}", prefix, stderr.trim());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(target: "git::perf", "{}Git {} took {:.2}s", prefix, operation, elapsed.as_secs_f64());
        } else if elapsed.as_millis() > 100 {
            tracing::debug!(target: "git::perf", "{}Git {} took {}ms", prefix, operation, elapsed.as_millis());
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Executes the command and returns trimmed stdout.
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Executes the command, discarding its output.
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

/// Output from a git command
#[derive(Debug)]
pub struct GitCommandOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

// Convenience builders for the operations the synchronizer needs

impl GitCommand {
    /// `git clone` fetching every branch and tag of `url` into `target`.
    pub fn clone(url: &str, target: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new().args(["clone", "--no-single-branch", "--", url]);
        cmd.args.push(target.as_ref().display().to_string());
        cmd.clone_url = Some(url.to_string());
        cmd
    }

    /// `git fetch` of one remote, including tags, pruning branches and tags
    /// that vanished upstream.
    pub fn fetch(remote: &str) -> Self {
        Self::new().args(["fetch", "--tags", "--prune", "--prune-tags", "--force", remote])
    }

    /// `git ls-remote --tags <remote> refs/tags/<tag>`: what the remote
    /// itself advertises for one tag, including the peeled `^{}` entry of an
    /// annotated tag.
    pub fn ls_remote_tag(remote: &str, tag: &str) -> Self {
        Self::new().args(["ls-remote", "--tags", remote, &format!("refs/tags/{tag}")])
    }

    /// `git show-ref --verify --quiet <refname>`; fails unless exactly this
    /// fully qualified ref exists.
    pub fn show_ref(refname: &str) -> Self {
        Self::new().args(["show-ref", "--verify", "--quiet", refname])
    }

    /// `git checkout -B <branch> <start>`: create or reset a local branch and
    /// attach HEAD to it.
    pub fn checkout_branch(branch_name: &str, start_point: &str) -> Self {
        Self::new().args(["checkout", "--force", "-B", branch_name, start_point])
    }

    /// `git checkout --detach <commit>`
    pub fn checkout_detached(commit: &str) -> Self {
        Self::new().args(["checkout", "--force", "--detach", commit])
    }

    /// `git branch --set-upstream-to=<upstream> <branch>`
    pub fn set_upstream(branch_name: &str, upstream: &str) -> Self {
        Self::new().args(["branch", &format!("--set-upstream-to={upstream}"), branch_name])
    }

    /// `git rev-parse --abbrev-ref <branch>@{upstream}`
    pub fn upstream(branch_name: &str) -> Self {
        Self::new().args(["rev-parse", "--abbrev-ref", &format!("{branch_name}@{{upstream}}")])
    }

    /// `git reset --hard HEAD`
    pub fn reset_hard() -> Self {
        Self::new().args(["reset", "--hard", "HEAD"])
    }

    /// `git rev-parse --verify --quiet <rev>`; fails when the rev is unknown.
    pub fn verify_ref(rev: &str) -> Self {
        Self::new().args(["rev-parse", "--verify", "--quiet", rev])
    }

    /// `git symbolic-ref --quiet --short HEAD`; fails when HEAD is detached.
    pub fn current_branch() -> Self {
        Self::new().args(["symbolic-ref", "--quiet", "--short", "HEAD"])
    }

    /// `git rev-parse HEAD`
    pub fn current_commit() -> Self {
        Self::new().args(["rev-parse", "HEAD"])
    }

    /// `git status --porcelain --untracked-files=no`
    pub fn status_porcelain() -> Self {
        Self::new().args(["status", "--porcelain", "--untracked-files=no"])
    }

    /// `git remote` (list remote names)
    pub fn list_remotes() -> Self {
        Self::new().arg("remote")
    }

    /// `git remote get-url [--push] <remote>`
    pub fn remote_url(remote: &str, push: bool) -> Self {
        let cmd = Self::new().args(["remote", "get-url"]);
        let cmd = if push { cmd.arg("--push") } else { cmd };
        cmd.arg(remote)
    }

    /// `git remote add <remote> <url>`
    pub fn add_remote(remote: &str, url: &str) -> Self {
        Self::new().args(["remote", "add", remote, url])
    }

    /// `git remote set-url --push <remote> <url>`
    pub fn set_push_url(remote: &str, url: &str) -> Self {
        Self::new().args(["remote", "set-url", "--push", remote, url])
    }

    /// `git remote remove <remote>`
    pub fn remove_remote(remote: &str) -> Self {
        Self::new().args(["remote", "remove", remote])
    }

    /// `git remote rename <old> <new>`
    pub fn rename_remote(old: &str, new: &str) -> Self {
        Self::new().args(["remote", "rename", old, new])
    }
}
