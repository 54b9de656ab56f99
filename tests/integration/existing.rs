use anyhow::Result;
use commodore::component::{Component, component_dir};
use commodore::core::CommodoreError;

use crate::common::TestProject;

#[tokio::test]
async fn test_open_existing_branch_checkout() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;
    project.component("argocd", &upstream.url, "master").ensure().await?;

    let reopened = Component::open_existing("argocd", component_dir(&project.work_dir(), "argocd")).await?;

    assert_eq!(reopened.name(), "argocd");
    assert_eq!(reopened.repo_url(), upstream.url);
    assert_eq!(reopened.version(), "master");
    Ok(())
}

#[tokio::test]
async fn test_open_existing_detached_checkout() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;
    upstream.git.tag("v1.0.0")?;
    let tagged = upstream.git.rev_parse_head()?;
    project.component("argocd", &upstream.url, "v1.0.0").ensure().await?;

    let reopened = Component::open_existing("argocd", component_dir(&project.work_dir(), "argocd")).await?;

    assert_eq!(reopened.version(), tagged);
    Ok(())
}

#[tokio::test]
async fn test_reopened_component_can_be_updated() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;
    let feature_tip = upstream.branch_with_commit("feature-x", "feature.txt")?;
    project.component("argocd", &upstream.url, "master").ensure().await?;

    let mut reopened = Component::open_existing("argocd", component_dir(&project.work_dir(), "argocd")).await?;
    reopened.set_version("feature-x");
    reopened.ensure().await?;

    assert_eq!(project.checkout("argocd").rev_parse_head()?, feature_tip);
    Ok(())
}

#[tokio::test]
async fn test_open_existing_requires_repository() -> Result<()> {
    let project = TestProject::new()?;
    let directory = component_dir(&project.work_dir(), "argocd");
    std::fs::create_dir_all(&directory)?;

    let err = Component::open_existing("argocd", &directory).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CommodoreError>(),
        Some(CommodoreError::RepositoryError { component, .. }) if component == "argocd"
    ));
    Ok(())
}
