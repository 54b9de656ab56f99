use anyhow::Result;
use commodore::component::ResolvedVersion;
use commodore::core::CommodoreError;

use crate::common::TestProject;

fn is_ref_error(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<CommodoreError>(), Some(CommodoreError::RefError { .. }))
}

fn head_log(project: &TestProject, name: &str) -> Result<String> {
    Ok(std::fs::read_to_string(project.checkout(name).repo_path().join(".git/logs/HEAD"))?)
}

#[tokio::test]
async fn test_branch_checkout_tracks_remote() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;
    let tip = upstream.git.rev_parse_head()?;

    let mut component = project.component("argocd", &upstream.url, "master");
    let resolved = component.ensure().await?;

    assert_eq!(
        resolved,
        ResolvedVersion::Branch {
            name: "master".to_string(),
            commit: tip.clone()
        }
    );
    let checkout = project.checkout("argocd");
    assert_eq!(checkout.current_branch()?, Some("master".to_string()));
    assert_eq!(checkout.rev_parse_head()?, tip);
    assert_eq!(checkout.upstream("master")?, "origin/master");
    assert_eq!(checkout.remote_url("origin", false)?, upstream.url);
    assert_eq!(checkout.remote_url("origin", true)?, upstream.url);
    assert_eq!(checkout.status_porcelain()?, "");
    Ok(())
}

#[tokio::test]
async fn test_full_commit_detaches_head() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;
    let first = upstream.git.rev_parse_head()?;
    upstream.git.commit_file("component/main.jsonnet", "{}\n", "Add main")?;

    let mut component = project.component("argocd", &upstream.url, &first);
    let resolved = component.ensure().await?;

    assert_eq!(resolved, ResolvedVersion::Commit { commit: first.clone() });
    let checkout = project.checkout("argocd");
    assert_eq!(checkout.current_branch()?, None);
    assert_eq!(checkout.rev_parse_head()?, first);
    assert!(!checkout.repo_path().join("component/main.jsonnet").exists());
    Ok(())
}

#[tokio::test]
async fn test_abbreviated_commit_detaches_head() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;
    let first = upstream.git.rev_parse_head()?;
    upstream.git.commit_file("README.md", "v2\n", "Update readme")?;

    let mut component = project.component("argocd", &upstream.url, &first[..12]);
    component.ensure().await?;

    assert_eq!(project.checkout("argocd").rev_parse_head()?, first);
    Ok(())
}

#[tokio::test]
async fn test_annotated_tag_detaches_at_tagged_commit() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;
    let tagged = upstream.git.commit_file("README.md", "v1\n", "Release v1.0.0")?;
    upstream.git.tag_annotated("v1.0.0", "Version 1.0.0")?;
    upstream.git.commit_file("README.md", "v2\n", "Start v2")?;

    let mut component = project.component("argocd", &upstream.url, "v1.0.0");
    let resolved = component.ensure().await?;

    assert_eq!(resolved.kind(), "tag");
    let checkout = project.checkout("argocd");
    assert_eq!(checkout.current_branch()?, None);
    assert_eq!(checkout.rev_parse_head()?, tagged);
    Ok(())
}

#[tokio::test]
async fn test_branch_preferred_over_tag_with_same_name() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;
    upstream.git.tag("release")?;
    let branch_tip = upstream.branch_with_commit("release", "release.txt")?;

    let mut component = project.component("argocd", &upstream.url, "release");
    component.ensure().await?;

    let checkout = project.checkout("argocd");
    assert_eq!(checkout.current_branch()?, Some("release".to_string()));
    assert_eq!(checkout.rev_parse_head()?, branch_tip);
    Ok(())
}

#[tokio::test]
async fn test_switch_to_other_branch() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;
    let feature_tip = upstream.branch_with_commit("feature-x", "feature.txt")?;

    let mut component = project.component("argocd", &upstream.url, "master");
    component.ensure().await?;

    component.set_version("feature-x");
    component.ensure().await?;

    let checkout = project.checkout("argocd");
    assert_eq!(checkout.current_branch()?, Some("feature-x".to_string()));
    assert_eq!(checkout.rev_parse_head()?, feature_tip);
    assert_eq!(checkout.upstream("feature-x")?, "origin/feature-x");
    assert!(checkout.repo_path().join("feature.txt").exists());
    assert_eq!(checkout.status_porcelain()?, "");
    Ok(())
}

#[tokio::test]
async fn test_tag_then_back_to_branch() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;
    upstream.git.tag("v1.0.0")?;
    let tip = upstream.git.commit_file("README.md", "v2\n", "Start v2")?;

    let mut component = project.component("argocd", &upstream.url, "v1.0.0");
    component.ensure().await?;
    assert_eq!(project.checkout("argocd").current_branch()?, None);

    component.set_version("master");
    component.ensure().await?;

    let checkout = project.checkout("argocd");
    assert_eq!(checkout.current_branch()?, Some("master".to_string()));
    assert_eq!(checkout.rev_parse_head()?, tip);
    Ok(())
}

#[tokio::test]
async fn test_branch_follows_new_upstream_commits() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;

    let mut component = project.component("argocd", &upstream.url, "master");
    component.ensure().await?;

    let new_tip = upstream.git.commit_file("README.md", "updated\n", "Update")?;
    component.ensure().await?;

    assert_eq!(project.checkout("argocd").rev_parse_head()?, new_tip);
    Ok(())
}

#[tokio::test]
async fn test_local_commits_are_discarded() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;
    let tip = upstream.git.rev_parse_head()?;

    let mut component = project.component("argocd", &upstream.url, "master");
    component.ensure().await?;

    let checkout = project.checkout("argocd");
    checkout.config_user()?;
    checkout.commit_file("local.txt", "local\n", "Local change")?;
    assert_ne!(checkout.rev_parse_head()?, tip);

    component.ensure().await?;

    assert_eq!(checkout.rev_parse_head()?, tip);
    assert!(!checkout.repo_path().join("local.txt").exists());
    Ok(())
}

#[tokio::test]
async fn test_modifications_are_reset_untracked_files_kept() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;

    let mut component = project.component("argocd", &upstream.url, "master");
    component.ensure().await?;

    let checkout = project.checkout("argocd");
    checkout.write_file("README.md", "scribbled\n")?;
    checkout.write_file("notes.txt", "mine\n")?;

    component.ensure().await?;

    assert_eq!(std::fs::read_to_string(checkout.repo_path().join("README.md"))?, "# component\n");
    assert!(checkout.repo_path().join("notes.txt").exists());
    Ok(())
}

#[tokio::test]
async fn test_unknown_version_leaves_checkout_untouched() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;
    upstream.branch_with_commit("feature-x", "feature.txt")?;

    let mut component = project.component("argocd", &upstream.url, "feature-x");
    component.ensure().await?;
    let checkout = project.checkout("argocd");
    let head_before = checkout.rev_parse_head()?;
    let refs_before = checkout.show_ref()?;

    component.set_version("does-not-exist");
    let err = component.ensure().await.unwrap_err();

    assert!(is_ref_error(&err));
    assert!(err.to_string().contains("does-not-exist"));
    assert!(err.to_string().contains("argocd"));
    assert_eq!(checkout.current_branch()?, Some("feature-x".to_string()));
    assert_eq!(checkout.rev_parse_head()?, head_before);
    assert_eq!(checkout.show_ref()?, refs_before);
    Ok(())
}

#[tokio::test]
async fn test_unknown_version_on_first_sync() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;

    let mut component = project.component("argocd", &upstream.url, "v9.9.9");
    let err = component.ensure().await.unwrap_err();

    assert!(is_ref_error(&err));
    Ok(())
}

#[tokio::test]
async fn test_second_ensure_changes_nothing() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;

    let mut component = project.component("argocd", &upstream.url, "master");
    component.ensure().await?;

    let checkout = project.checkout("argocd");
    let refs = checkout.show_ref()?;
    let log = head_log(&project, "argocd")?;
    let config = std::fs::read_to_string(checkout.repo_path().join(".git/config"))?;

    component.ensure().await?;

    assert_eq!(checkout.show_ref()?, refs);
    assert_eq!(head_log(&project, "argocd")?, log);
    assert_eq!(std::fs::read_to_string(checkout.repo_path().join(".git/config"))?, config);
    Ok(())
}

#[tokio::test]
async fn test_second_ensure_of_tag_changes_nothing() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;
    upstream.git.tag("v1.0.0")?;

    let mut component = project.component("argocd", &upstream.url, "v1.0.0");
    component.ensure().await?;
    let log = head_log(&project, "argocd")?;

    component.ensure().await?;

    assert_eq!(head_log(&project, "argocd")?, log);
    Ok(())
}

#[tokio::test]
async fn test_deleted_upstream_branches_are_pruned() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;
    upstream.branch_with_commit("feature-x", "feature.txt")?;

    let mut component = project.component("argocd", &upstream.url, "master");
    component.ensure().await?;
    let checkout = project.checkout("argocd");
    assert!(checkout.remote_branches()?.contains(&"origin/feature-x".to_string()));

    upstream.git.delete_branch("feature-x")?;
    component.ensure().await?;

    assert!(!checkout.remote_branches()?.contains(&"origin/feature-x".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_deleted_upstream_tags_are_pruned() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;
    upstream.git.tag("v1.0.0")?;

    let mut component = project.component("argocd", &upstream.url, "v1.0.0");
    component.ensure().await?;
    let checkout = project.checkout("argocd");
    let head = checkout.rev_parse_head()?;

    upstream.git.delete_tag("v1.0.0")?;
    let err = component.ensure().await.unwrap_err();

    assert!(is_ref_error(&err));
    assert!(!checkout.show_ref()?.contains("refs/tags/v1.0.0"));
    assert_eq!(checkout.rev_parse_head()?, head);
    Ok(())
}

#[tokio::test]
async fn test_revision_expressions_are_ref_errors() -> Result<()> {
    let project = TestProject::new()?;
    let upstream = project.create_upstream("component-argocd")?;
    upstream.git.commit_file("second.txt", "second\n", "Second commit")?;

    let mut fresh = project.component("fresh", &upstream.url, "HEAD");
    let err = fresh.ensure().await.unwrap_err();
    assert!(is_ref_error(&err), "HEAD: {err:?}");

    let mut component = project.component("argocd", &upstream.url, "master");
    component.ensure().await?;
    let checkout = project.checkout("argocd");
    let head = checkout.rev_parse_head()?;

    for version in ["master~1", "master^", "HEAD", "master@{0}"] {
        component.set_version(version);
        let err = component.ensure().await.unwrap_err();
        assert!(is_ref_error(&err), "{version}: {err:?}");
        assert_eq!(checkout.current_branch()?, Some("master".to_string()));
        assert_eq!(checkout.rev_parse_head()?, head);
    }
    Ok(())
}
