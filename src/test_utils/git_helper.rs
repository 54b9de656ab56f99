//! Git test helper utilities
//!
//! [`TestGit`] builds the repositories tests reconcile against. It runs git
//! synchronously and fails loudly, which keeps fixture setup short.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Git command runner for test fixtures.
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    fn run_git_command(&self, args: &[&str], action: &str) -> Result<std::process::Output> {
        let output = Command::new(crate::utils::platform::get_git_command())
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| action.to_string())?;

        if !output.status.success() {
            bail!("{} failed: {}", action, String::from_utf8_lossy(&output.stderr));
        }

        Ok(output)
    }

    fn stdout(&self, args: &[&str], action: &str) -> Result<String> {
        let output = self.run_git_command(args, action)?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Create a new TestGit instance for the given repository path
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// Creates `path` and initializes an upstream repository in it with one
    /// commit on `master`.
    pub fn init_upstream(path: impl Into<PathBuf>) -> Result<Self> {
        let git = Self::new(path);
        std::fs::create_dir_all(&git.repo_path)?;
        git.init()?;
        git.config_user()?;
        git.set_head("master")?;
        git.write_file("README.md", "# component\n")?;
        git.add_all()?;
        git.commit("Initial commit")?;
        Ok(git)
    }

    /// Return the repository path
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// `file://` URL of this repository
    pub fn file_url(&self) -> String {
        format!("file://{}", self.repo_path.display())
    }

    /// Initialize a new git repository
    pub fn init(&self) -> Result<()> {
        self.run_git_command(&["init"], "Failed to initialize git repository")?;
        Ok(())
    }

    /// Configure git user (and disable signing) for tests
    pub fn config_user(&self) -> Result<()> {
        self.run_git_command(
            &["config", "user.email", "test@commodore.example"],
            "Failed to configure git user email",
        )?;
        self.run_git_command(&["config", "user.name", "Test User"], "Failed to configure git user name")?;
        self.run_git_command(&["config", "commit.gpgsign", "false"], "Failed to disable commit signing")?;
        self.run_git_command(&["config", "tag.gpgsign", "false"], "Failed to disable tag signing")?;
        Ok(())
    }

    /// Writes a file relative to the repository root
    pub fn write_file(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.repo_path.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Add all files to staging
    pub fn add_all(&self) -> Result<()> {
        self.run_git_command(&["add", "."], "Failed to add files to git")?;
        Ok(())
    }

    /// Create a commit with the given message
    pub fn commit(&self, message: &str) -> Result<()> {
        self.run_git_command(&["commit", "-m", message], "Failed to create git commit")?;
        Ok(())
    }

    /// Writes a file, commits it and returns the new commit id
    pub fn commit_file(&self, relative: &str, content: &str, message: &str) -> Result<String> {
        self.write_file(relative, content)?;
        self.add_all()?;
        self.commit(message)?;
        self.rev_parse_head()
    }

    /// Create a lightweight tag
    pub fn tag(&self, tag_name: &str) -> Result<()> {
        self.run_git_command(&["tag", tag_name], &format!("Failed to create tag: {tag_name}"))?;
        Ok(())
    }

    /// Create an annotated tag
    pub fn tag_annotated(&self, tag_name: &str, message: &str) -> Result<()> {
        self.run_git_command(
            &["tag", "-a", tag_name, "-m", message],
            &format!("Failed to create tag: {tag_name}"),
        )?;
        Ok(())
    }

    /// Deletes a tag
    pub fn delete_tag(&self, tag_name: &str) -> Result<()> {
        self.run_git_command(&["tag", "-d", tag_name], &format!("Failed to delete tag: {tag_name}"))?;
        Ok(())
    }

    /// Checkout a branch or commit
    pub fn checkout(&self, ref_name: &str) -> Result<()> {
        self.run_git_command(&["checkout", ref_name], &format!("Failed to checkout: {ref_name}"))?;
        Ok(())
    }

    /// Create and checkout a branch
    pub fn create_branch(&self, branch_name: &str) -> Result<()> {
        self.run_git_command(
            &["checkout", "-b", branch_name],
            &format!("Failed to create branch: {branch_name}"),
        )?;
        Ok(())
    }

    /// Deletes a local branch
    pub fn delete_branch(&self, branch_name: &str) -> Result<()> {
        self.run_git_command(
            &["branch", "-D", branch_name],
            &format!("Failed to delete branch: {branch_name}"),
        )?;
        Ok(())
    }

    /// Set HEAD to point to a branch (making it default branch)
    pub fn set_head(&self, branch_name: &str) -> Result<()> {
        self.run_git_command(
            &["symbolic-ref", "HEAD", &format!("refs/heads/{branch_name}")],
            &format!("Failed to set HEAD to branch: {branch_name}"),
        )?;
        Ok(())
    }

    /// Get current commit SHA
    pub fn rev_parse_head(&self) -> Result<String> {
        self.rev_parse("HEAD")
    }

    /// Full commit id of a revision
    pub fn rev_parse(&self, rev: &str) -> Result<String> {
        self.stdout(&["rev-parse", &format!("{rev}^{{commit}}")], &format!("Failed to resolve {rev}"))
    }

    /// Branch HEAD is attached to, or `None` when detached
    pub fn current_branch(&self) -> Result<Option<String>> {
        let branch = self.stdout(&["branch", "--show-current"], "Failed to get current branch name")?;
        Ok(if branch.is_empty() { None } else { Some(branch) })
    }

    /// Upstream of a local branch, e.g. `origin/master`
    pub fn upstream(&self, branch_name: &str) -> Result<String> {
        self.stdout(
            &["rev-parse", "--abbrev-ref", &format!("{branch_name}@{{upstream}}")],
            &format!("Failed to get upstream of {branch_name}"),
        )
    }

    /// Fetch or push URL of a remote
    pub fn remote_url(&self, remote: &str, push: bool) -> Result<String> {
        let mut args = vec!["remote", "get-url"];
        if push {
            args.push("--push");
        }
        args.push(remote);
        self.stdout(&args, &format!("Failed to get URL of remote {remote}"))
    }

    /// Names of all remotes
    pub fn remotes(&self) -> Result<Vec<String>> {
        let output = self.stdout(&["remote"], "Failed to list remotes")?;
        Ok(output.lines().map(str::to_string).collect())
    }

    /// Remote-tracking branches, e.g. `origin/master`
    pub fn remote_branches(&self) -> Result<Vec<String>> {
        let output = self.stdout(
            &["for-each-ref", "--format=%(refname:short)", "refs/remotes"],
            "Failed to list remote branches",
        )?;
        Ok(output.lines().map(str::to_string).filter(|r| !r.ends_with("/HEAD")).collect())
    }

    /// Get porcelain status output
    pub fn status_porcelain(&self) -> Result<String> {
        self.stdout(&["status", "--porcelain"], "Failed to get git status")
    }

    /// All refs with their commit ids, one per line
    pub fn show_ref(&self) -> Result<String> {
        self.stdout(&["show-ref", "--head"], "Failed to list refs")
    }
}
