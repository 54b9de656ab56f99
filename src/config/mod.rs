//! Project configuration
//!
//! A project declares its components in `commodore.toml`:
//!
//! ```toml
//! work_dir = "."          # optional, relative to this file
//! max_parallel = 4        # optional
//!
//! [components.argocd]
//! url = "https://github.com/projectsyn/component-argocd.git"
//! version = "master"
//!
//! [components.argocd.jsonnetfile_parameters]
//! kube_prometheus_version = "1.18"
//!
//! [aliases]
//! argocd-secondary = "argocd"
//! ```
//!
//! Every component is implicitly an alias of itself. Unknown keys are
//! rejected so that typos do not silently drop settings.

use crate::component::{Component, DEFAULT_MAX_PARALLEL, component_dir};
use crate::core::CommodoreError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default name of the project configuration file.
pub const CONFIG_FILE: &str = "commodore.toml";

/// A component declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentSpec {
    /// Pull URL of the component repository
    pub url: String,
    /// Branch, tag or commit to check out
    pub version: String,
    /// Variables for rendering the component's `jsonnetfile.json.tera`
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub jsonnetfile_parameters: Map<String, Value>,
}

/// Contents of `commodore.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Working directory; components live in `<work_dir>/dependencies`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,

    /// Number of components synced concurrently
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,

    /// Components by name
    #[serde(default)]
    pub components: BTreeMap<String, ComponentSpec>,

    /// Alias name to component name
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    base_dir: PathBuf,
}

impl ProjectConfig {
    /// Reads and validates a configuration file. Relative paths in it are
    /// resolved against the file's directory.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::parse(&content, &path.display().to_string(), base_dir)
    }

    /// Parses and validates configuration text. `source` names the text in
    /// error messages.
    pub fn parse(content: &str, source: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(|e| CommodoreError::ConfigParseError {
            file: source.to_string(),
            reason: e.message().to_string(),
        })?;
        config.base_dir = base_dir.into();
        config.validate().map_err(|reason| CommodoreError::ConfigParseError {
            file: source.to_string(),
            reason,
        })?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.max_parallel == Some(0) {
            return Err("max_parallel must be at least 1".to_string());
        }

        for (name, spec) in &self.components {
            if name.trim().is_empty() {
                return Err("component names must not be empty".to_string());
            }
            if name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(format!("component name '{name}' is not a valid directory name"));
            }
            if spec.url.trim().is_empty() {
                return Err(format!("component '{name}' has an empty url"));
            }
            if spec.version.trim().is_empty() {
                return Err(format!("component '{name}' has an empty version"));
            }
        }

        for (alias, component) in &self.aliases {
            if alias.trim().is_empty() {
                return Err("alias names must not be empty".to_string());
            }
            if !self.components.contains_key(component) {
                return Err(format!("alias '{alias}' refers to undeclared component '{component}'"));
            }
        }

        Ok(())
    }

    /// The resolved working directory.
    pub fn work_dir(&self) -> PathBuf {
        match &self.work_dir {
            Some(dir) => self.base_dir.join(dir),
            None => self.base_dir.clone(),
        }
    }

    /// Configured parallelism, or [`DEFAULT_MAX_PARALLEL`].
    pub fn max_parallel(&self) -> usize {
        self.max_parallel.unwrap_or(DEFAULT_MAX_PARALLEL)
    }

    /// Alias to component, including each component as its own alias.
    pub fn component_aliases(&self) -> BTreeMap<String, String> {
        let mut aliases: BTreeMap<String, String> =
            self.components.keys().map(|name| (name.clone(), name.clone())).collect();
        aliases.extend(self.aliases.iter().map(|(a, c)| (a.clone(), c.clone())));
        aliases
    }

    /// Declared components with their working-tree directories, in name order.
    pub fn components(&self) -> Vec<Component> {
        let work_dir = self.work_dir();
        self.components
            .iter()
            .map(|(name, spec)| {
                Component::new(name.clone(), spec.url.clone(), spec.version.clone(), component_dir(&work_dir, name))
            })
            .collect()
    }
}
