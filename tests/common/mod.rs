//! Shared fixtures for the integration suite
//!
//! Every test gets its own [`TestProject`]: a temporary directory with
//! upstream repositories under `upstreams/` (reached via `file://` URLs) and
//! a working directory under `work/` whose `dependencies/` holds the
//! component checkouts.

// Not every test module uses every helper
#![allow(dead_code)]

use anyhow::Result;
use commodore::component::{Component, component_dir};
use commodore::test_utils::{TestGit, init_test_logging};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestProject {
    _temp_dir: TempDir,
    root: PathBuf,
}

/// An upstream component repository.
pub struct Upstream {
    pub git: TestGit,
    pub url: String,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        init_test_logging(None);
        let temp_dir = TempDir::new()?;
        // Canonicalize so file:// URLs and git's view of paths agree (macOS /private/var)
        let root = temp_dir.path().canonicalize()?;
        std::fs::create_dir_all(root.join("upstreams"))?;
        std::fs::create_dir_all(root.join("work"))?;
        Ok(Self {
            _temp_dir: temp_dir,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn work_dir(&self) -> PathBuf {
        self.root.join("work")
    }

    /// Creates an upstream repository with one commit on `master`.
    pub fn create_upstream(&self, name: &str) -> Result<Upstream> {
        let git = TestGit::init_upstream(self.root.join("upstreams").join(name))?;
        let url = git.file_url();
        Ok(Upstream {
            git,
            url,
        })
    }

    /// Declares a component below this project's working directory.
    pub fn component(&self, name: &str, url: &str, version: &str) -> Component {
        Component::new(name, url, version, component_dir(&self.work_dir(), name))
    }

    /// Runs git assertions against a component checkout.
    pub fn checkout(&self, name: &str) -> TestGit {
        TestGit::new(component_dir(&self.work_dir(), name))
    }
}

impl Upstream {
    /// Adds a branch forked from `master` with one extra commit; returns its tip.
    pub fn branch_with_commit(&self, branch: &str, file: &str) -> Result<String> {
        self.git.checkout("master")?;
        self.git.create_branch(branch)?;
        let tip = self.git.commit_file(file, &format!("{branch}\n"), &format!("Work on {branch}"))?;
        self.git.checkout("master")?;
        Ok(tip)
    }
}
