use anyhow::Result;
use commodore::component::RenderOutcome;
use commodore::core::CommodoreError;
use commodore::test_utils::capture_logs;
use serde_json::{Map, Value, json};

use crate::common::TestProject;

const TEMPLATE: &str = r#"{
  "version": 1,
  "dependencies": [
    {
      "source": { "git": { "remote": "https://github.com/bitnami-labs/kube-libsonnet", "subdir": "" } },
      "version": "{{ version_var }}"
    }
  ],
  "legacyImports": true
}
"#;

fn variables(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn manifest(project: &TestProject, name: &str) -> Result<Value> {
    let path = project.checkout(name).repo_path().join("jsonnetfile.json");
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

#[tokio::test]
async fn test_render_template_from_synced_component() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-metrics")?;
    upstream.git.commit_file("jsonnetfile.json.tera", TEMPLATE, "Add jsonnetfile template")?;

    let mut component = project.component("metrics-server", &upstream.url, "master");
    component.ensure().await?;

    let (outcome, logs) = capture_logs(|| component.render_jsonnetfile_json(&variables(json!({"version_var": "1.18"}))));

    assert_eq!(outcome?, RenderOutcome::Rendered);
    assert_eq!(logs.count_containing("contains both"), 0);
    let manifest = manifest(&project, "metrics-server")?;
    assert_eq!(manifest["dependencies"][0]["version"], "1.18");
    assert_eq!(manifest["legacyImports"], true);
    Ok(())
}

#[tokio::test]
async fn test_render_overwrites_committed_manifest_with_warning() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-metrics")?;
    upstream.git.write_file("jsonnetfile.json.tera", TEMPLATE)?;
    upstream.git.write_file("jsonnetfile.json", "{\"version\": 1, \"dependencies\": [], \"legacyImports\": false}\n")?;
    upstream.git.add_all()?;
    upstream.git.commit("Add jsonnetfile and template")?;

    let mut component = project.component("metrics-server", &upstream.url, "master");
    component.ensure().await?;

    let (outcome, logs) = capture_logs(|| component.render_jsonnetfile_json(&variables(json!({"version_var": "1.19"}))));

    assert_eq!(outcome?, RenderOutcome::RenderedOverExisting);
    assert_eq!(logs.count_containing("contains both"), 1);
    assert!(logs.contents().contains("metrics-server"));
    assert_eq!(manifest(&project, "metrics-server")?["dependencies"][0]["version"], "1.19");
    Ok(())
}

#[tokio::test]
async fn test_component_without_template() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;

    let mut component = project.component("argocd", &upstream.url, "master");
    component.ensure().await?;

    assert_eq!(component.render_jsonnetfile_json(&Map::new())?, RenderOutcome::NoTemplate);
    assert!(!component.directory().join("jsonnetfile.json").exists());
    Ok(())
}

#[tokio::test]
async fn test_missing_variable_names_component_and_template() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-metrics")?;
    upstream.git.commit_file("jsonnetfile.json.tera", TEMPLATE, "Add jsonnetfile template")?;

    let mut component = project.component("metrics-server", &upstream.url, "master");
    component.ensure().await?;

    let err = component.render_jsonnetfile_json(&Map::new()).unwrap_err();

    assert!(matches!(err.downcast_ref::<CommodoreError>(), Some(CommodoreError::ManifestError { .. })));
    let message = err.to_string();
    assert!(message.contains("metrics-server"));
    assert!(message.contains("jsonnetfile.json.tera"));
    Ok(())
}
