//! Dependency manifest rendering
//!
//! A component may ship `jsonnetfile.json.tera` in the root of its repository
//! instead of (or next to) a static `jsonnetfile.json`. The template is
//! rendered with the component's `jsonnetfile_parameters` as top-level
//! variables, and the output becomes the component's `jsonnetfile.json`:
//!
//! ```text
//! {
//!   "version": 1,
//!   "dependencies": [
//!     {
//!       "source": { "git": { "remote": "https://github.com/bitnami-labs/kube-libsonnet", "subdir": "" } },
//!       "version": "{{ kube_libsonnet_version }}"
//!     }
//!   ],
//!   "legacyImports": true
//! }
//! ```
//!
//! The rendered text must be a JSON object with an integer `version`, a
//! `dependencies` array and a boolean `legacyImports`. Other fields are kept.
//! It is written back pretty-printed, with a trailing newline.

use crate::component::Component;
use crate::core::CommodoreError;
use crate::git::Vcs;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::Path;
use tera::{Context as TeraContext, Tera};

/// The dependency manifest consumed by jsonnet-bundler.
pub const JSONNETFILE: &str = "jsonnetfile.json";

/// The template the manifest is rendered from.
pub const JSONNETFILE_TEMPLATE: &str = "jsonnetfile.json.tera";

/// Structure a rendered manifest must have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonnetFile {
    /// Manifest schema version
    pub version: u64,
    /// Dependency declarations, in order
    pub dependencies: Vec<Value>,
    /// Whether legacy (non-namespaced) imports are enabled
    #[serde(rename = "legacyImports")]
    pub legacy_imports: bool,
    /// Any further fields, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What [`render_jsonnetfile`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// No template; any existing manifest was left alone.
    NoTemplate,
    /// The manifest was rendered from the template.
    Rendered,
    /// The manifest was rendered and replaced a manifest already on disk.
    RenderedOverExisting,
}

/// Renders `jsonnetfile.json` in `directory` from its template.
///
/// # Errors
///
/// [`CommodoreError::ManifestError`] if the template does not render (syntax
/// error, undefined variable) or its output is not a valid manifest. I/O
/// errors are returned as is.
pub fn render_jsonnetfile(component: &str, directory: &Path, variables: &Map<String, Value>) -> Result<RenderOutcome> {
    let template_path = directory.join(JSONNETFILE_TEMPLATE);
    if !template_path.is_file() {
        return Ok(RenderOutcome::NoTemplate);
    }

    let manifest_path = directory.join(JSONNETFILE);
    let overwrite = manifest_path.exists();
    if overwrite {
        tracing::warn!(
            "Component {component} repo contains both {JSONNETFILE} and {JSONNETFILE_TEMPLATE}, continuing with {JSONNETFILE_TEMPLATE}"
        );
    }

    let source = std::fs::read_to_string(&template_path)
        .with_context(|| format!("Failed to read {}", template_path.display()))?;

    let manifest_error = |reason: String| -> anyhow::Error {
        CommodoreError::ManifestError {
            component: component.to_string(),
            file: JSONNETFILE_TEMPLATE.to_string(),
            reason,
        }
        .into()
    };

    let rendered = render_template(&source, variables).map_err(manifest_error)?;
    let manifest: JsonnetFile = serde_json::from_str(&rendered)
        .map_err(|e| manifest_error(format!("output is not a valid {JSONNETFILE}: {e}")))?;

    let mut output = serde_json::to_string_pretty(&manifest)?;
    output.push('\n');

    // Replace atomically so a failed write never leaves a truncated manifest
    let mut file = tempfile::NamedTempFile::new_in(directory)
        .with_context(|| format!("Failed to create temporary file in {}", directory.display()))?;
    file.write_all(output.as_bytes())?;
    file.persist(&manifest_path)
        .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

    tracing::debug!("Rendered {} of component {component}", JSONNETFILE);

    Ok(if overwrite {
        RenderOutcome::RenderedOverExisting
    } else {
        RenderOutcome::Rendered
    })
}

fn render_template(source: &str, variables: &Map<String, Value>) -> std::result::Result<String, String> {
    let context = TeraContext::from_serialize(variables).map_err(|e| format_tera_error(&e))?;

    let mut tera = Tera::default();
    tera.add_raw_template(JSONNETFILE_TEMPLATE, source).map_err(|e| format_tera_error(&e))?;
    tera.render(JSONNETFILE_TEMPLATE, &context).map_err(|e| format_tera_error(&e))
}

/// Flattens a Tera error and its sources into one message; the top-level
/// error alone rarely says what went wrong.
fn format_tera_error(error: &tera::Error) -> String {
    use std::error::Error;

    let mut messages = vec![error.to_string()];
    let mut current: Option<&dyn Error> = error.source();
    while let Some(err) = current {
        messages.push(err.to_string());
        current = err.source();
    }

    messages.retain(|msg| !msg.trim().is_empty());
    messages.join("\n  → ")
}

impl<V: Vcs> Component<V> {
    /// Renders this component's `jsonnetfile.json` from its template, if it
    /// has one. See [`render_jsonnetfile`].
    pub fn render_jsonnetfile_json(&self, variables: &Map<String, Value>) -> Result<RenderOutcome> {
        render_jsonnetfile(&self.name, &self.directory, variables)
    }
}
