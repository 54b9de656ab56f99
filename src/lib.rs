//! Commodore - component source management
//!
//! Commodore assembles cluster configuration from *components*: reusable
//! configuration modules that live in their own git repositories. This crate
//! keeps a local working tree per component, pinned to a declared branch, tag
//! or commit, and renders each component's `jsonnetfile.json` from its
//! template.
//!
//! # Architecture
//!
//! - [`component`] - [`Component`](component::Component), version resolution,
//!   working-tree reconciliation, manifest rendering, alias checks and batch
//!   sync
//! - [`git`] - the [`Vcs`](git::Vcs) trait, its `git` CLI implementation and
//!   push URL derivation
//! - [`config`] - `commodore.toml`
//! - [`core`] - error types and user-facing error reporting
//! - [`cli`] - the `commodore` command
//! - [`utils`] - platform and progress helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use commodore::component::{component_dir, Component};
//! use serde_json::Map;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut argocd = Component::new(
//!     "argocd",
//!     "https://github.com/projectsyn/component-argocd.git",
//!     "master",
//!     component_dir(Path::new("/work"), "argocd"),
//! );
//! let resolved = argocd.ensure().await?;
//! println!("argocd is at {resolved}");
//!
//! argocd.render_jsonnetfile_json(&Map::new())?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod component;
pub mod config;
pub mod core;
pub mod git;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
