use anyhow::Result;
use commodore::core::CommodoreError;
use commodore::git::{GitRepo, ORIGIN, RemoteUrls, Vcs};

use crate::common::TestProject;

const STAGING: &str = "commodore-staging";

#[tokio::test]
async fn test_url_change_replaces_origin() -> Result<()> {
    let project = TestProject::new()?;
    let old = project.create_upstream("component-argocd")?;
    old.branch_with_commit("old-only", "old.txt")?;
    let new = project.create_upstream("component-argocd-fork")?;
    let new_tip = new.git.commit_file("fork.txt", "fork\n", "Fork")?;

    let mut component = project.component("argocd", &old.url, "master");
    component.ensure().await?;

    component.set_repo_url(&new.url);
    component.ensure().await?;

    let checkout = project.checkout("argocd");
    assert_eq!(checkout.remote_url("origin", false)?, new.url);
    assert_eq!(checkout.remote_url("origin", true)?, new.url);
    assert_eq!(checkout.remotes()?, vec!["origin".to_string()]);
    assert!(!checkout.remote_branches()?.contains(&"origin/old-only".to_string()));
    assert_eq!(checkout.current_branch()?, Some("master".to_string()));
    assert_eq!(checkout.rev_parse_head()?, new_tip);
    assert_eq!(checkout.upstream("master")?, "origin/master");
    Ok(())
}

#[tokio::test]
async fn test_unreachable_url_keeps_previous_origin() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;

    let mut component = project.component("argocd", &upstream.url, "master");
    component.ensure().await?;
    let head = project.checkout("argocd").rev_parse_head()?;

    let missing = format!("file://{}", project.root().join("upstreams/missing").display());
    component.set_repo_url(&missing);
    let err = component.ensure().await.unwrap_err();

    match err.downcast_ref::<CommodoreError>() {
        Some(CommodoreError::RepositoryError { component, operation, .. }) => {
            assert_eq!(component, "argocd");
            assert_eq!(operation, "fetch");
        }
        other => panic!("expected RepositoryError, got {other:?}"),
    }
    let checkout = project.checkout("argocd");
    assert_eq!(checkout.remote_url("origin", false)?, upstream.url);
    assert_eq!(checkout.remotes()?, vec!["origin".to_string()]);
    assert_eq!(checkout.rev_parse_head()?, head);
    Ok(())
}

#[tokio::test]
async fn test_unresolvable_version_at_new_url_keeps_previous_origin() -> Result<()> {
    let project = TestProject::new()?;
    let old = project.create_upstream("component-argocd")?;
    old.branch_with_commit("feature-x", "feature.txt")?;
    let new = project.create_upstream("component-argocd-fork")?;

    let mut component = project.component("argocd", &old.url, "feature-x");
    component.ensure().await?;

    component.set_repo_url(&new.url);
    let err = component.ensure().await.unwrap_err();

    assert!(matches!(err.downcast_ref::<CommodoreError>(), Some(CommodoreError::RefError { .. })));
    let checkout = project.checkout("argocd");
    assert_eq!(checkout.remote_url("origin", false)?, old.url);
    assert_eq!(checkout.remotes()?, vec!["origin".to_string()]);
    assert_eq!(checkout.current_branch()?, Some("feature-x".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_revision_expression_at_new_url_keeps_previous_origin() -> Result<()> {
    let project = TestProject::new()?;
    let old = project.create_upstream("component-argocd")?;
    let new = project.create_upstream("component-argocd-fork")?;
    new.git.commit_file("fork.txt", "fork\n", "Fork")?;

    let mut component = project.component("argocd", &old.url, "master");
    component.ensure().await?;
    let checkout = project.checkout("argocd");
    let head = checkout.rev_parse_head()?;

    for version in ["master~1", "HEAD"] {
        component.set_repo_url(&new.url);
        component.set_version(version);
        let err = component.ensure().await.unwrap_err();

        assert!(
            matches!(err.downcast_ref::<CommodoreError>(), Some(CommodoreError::RefError { .. })),
            "{version}: {err:?}"
        );
        assert_eq!(checkout.remote_url("origin", false)?, old.url);
        assert_eq!(checkout.remotes()?, vec!["origin".to_string()]);
        assert_eq!(checkout.current_branch()?, Some("master".to_string()));
        assert_eq!(checkout.rev_parse_head()?, head);
    }
    Ok(())
}

#[tokio::test]
async fn test_tag_only_at_previous_url_does_not_resolve() -> Result<()> {
    let project = TestProject::new()?;
    let old = project.create_upstream("component-argocd")?;
    old.git.tag("old-only-tag")?;
    let new = project.create_upstream("component-argocd-fork")?;

    let mut component = project.component("argocd", &old.url, "master");
    component.ensure().await?;
    let head = project.checkout("argocd").rev_parse_head()?;

    component.set_repo_url(&new.url);
    component.set_version("old-only-tag");
    let err = component.ensure().await.unwrap_err();

    assert!(matches!(err.downcast_ref::<CommodoreError>(), Some(CommodoreError::RefError { .. })));
    let checkout = project.checkout("argocd");
    assert_eq!(checkout.remote_url("origin", false)?, old.url);
    assert_eq!(checkout.remotes()?, vec!["origin".to_string()]);
    assert_eq!(checkout.rev_parse_head()?, head);
    Ok(())
}

#[tokio::test]
async fn test_interrupted_switch_recovers() -> Result<()> {
    let project = TestProject::new()?;
    let old = project.create_upstream("component-argocd")?;
    let new = project.create_upstream("component-argocd-fork")?;
    let new_tip = new.git.commit_file("fork.txt", "fork\n", "Fork")?;

    let mut component = project.component("argocd", &old.url, "master");
    component.ensure().await?;

    // state left behind by a switch interrupted after staging the new remote
    let repo = GitRepo::new(component.directory());
    repo.add_remote(STAGING, &new.url).await?;
    repo.fetch(STAGING).await?;

    component.set_repo_url(&new.url);
    component.ensure().await?;

    let checkout = project.checkout("argocd");
    assert_eq!(checkout.remotes()?, vec!["origin".to_string()]);
    assert_eq!(checkout.remote_url("origin", false)?, new.url);
    assert_eq!(checkout.rev_parse_head()?, new_tip);
    Ok(())
}

#[tokio::test]
async fn test_push_url_is_restored() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;

    let mut component = project.component("argocd", &upstream.url, "master");
    component.ensure().await?;

    let repo = GitRepo::new(component.directory());
    repo.set_push_url(ORIGIN, "ssh://git@elsewhere.example.com/org/repo.git").await?;

    component.ensure().await?;

    assert_eq!(
        repo.remote_urls(ORIGIN).await?,
        Some(RemoteUrls {
            fetch: upstream.url.clone(),
            push: upstream.url.clone(),
        })
    );
    Ok(())
}

#[tokio::test]
async fn test_clone_of_missing_repository_fails_cleanly() -> Result<()> {
    let project = TestProject::new()?;
    let missing = format!("file://{}", project.root().join("upstreams/missing").display());

    let mut component = project.component("argocd", &missing, "master");
    let err = component.ensure().await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CommodoreError>(),
        Some(CommodoreError::RepositoryError { operation, .. }) if operation == "clone"
    ));
    assert!(!component.directory().exists());
    // no staging directories left next to the checkout
    let leftovers: Vec<_> = std::fs::read_dir(project.work_dir().join("dependencies"))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(".clone-"))
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}
