//! Reconciling many components at once
//!
//! Components own disjoint directories, so their reconciliations are
//! independent and run concurrently up to a caller-chosen bound. A failing
//! component never affects the others: components already reconciled stay
//! reconciled, and there is no rollback. What happens to components that
//! have not started yet is the caller's [`SyncPolicy`].

use crate::component::Component;
use crate::component::resolver::ResolvedVersion;
use crate::git::Vcs;
use crate::utils::progress::ProgressBar;
use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};

/// Default number of components reconciled at the same time.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// What to do with pending components once one has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// Start no further components. Those already running finish.
    #[default]
    FailFast,
    /// Reconcile every component regardless of failures.
    KeepGoing,
}

/// Outcome of [`sync_components`], in declaration order.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Reconciled components and what their version resolved to
    pub synced: Vec<(String, ResolvedVersion)>,
    /// Components whose reconciliation failed
    pub failed: Vec<(String, anyhow::Error)>,
    /// Components not attempted because of [`SyncPolicy::FailFast`]
    pub skipped: Vec<String>,
}

impl SyncReport {
    /// Whether every component was reconciled.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    /// Turns failures into an error.
    ///
    /// A single failure is returned unchanged so its type survives; several
    /// are combined into one error listing each component.
    pub fn into_result(mut self) -> Result<Vec<(String, ResolvedVersion)>> {
        match self.failed.len() {
            0 => Ok(self.synced),
            1 => Err(self.failed.remove(0).1),
            n => {
                let messages: Vec<String> =
                    self.failed.into_iter().map(|(name, error)| format!("  {name}: {error}")).collect();
                Err(anyhow::anyhow!("Failed to sync {n} components:\n{}", messages.join("\n")))
            }
        }
    }
}

enum Outcome {
    Synced(ResolvedVersion),
    Failed(anyhow::Error),
    Skipped,
}

/// Reconciles `components` with at most `max_parallel` running at once.
///
/// `max_parallel` of 0 is treated as 1. Progress, if given, advances once per
/// component.
pub async fn sync_components<V: Vcs>(
    components: &mut [Component<V>],
    max_parallel: usize,
    policy: SyncPolicy,
    progress: Option<&ProgressBar>,
) -> SyncReport {
    let aborted = AtomicBool::new(false);
    let aborted = &aborted;
    let concurrency = max_parallel.max(1);

    tracing::debug!("Syncing {} components, {} at a time", components.len(), concurrency);

    let mut results: Vec<(usize, String, Outcome)> = stream::iter(components.iter_mut().enumerate())
        .map(|(index, component)| async move {
            let name = component.name().to_string();
            if aborted.load(Ordering::SeqCst) {
                tracing::debug!("Skipping {name}");
                return (index, name, Outcome::Skipped);
            }

            let outcome = match component.ensure().await {
                Ok(resolved) => Outcome::Synced(resolved),
                Err(error) => {
                    tracing::debug!("Syncing {name} failed: {error:#}");
                    if policy == SyncPolicy::FailFast {
                        aborted.store(true, Ordering::SeqCst);
                    }
                    Outcome::Failed(error)
                }
            };

            if let Some(progress) = progress {
                progress.set_message(name.clone());
                progress.inc(1);
            }
            (index, name, outcome)
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    results.sort_by_key(|(index, _, _)| *index);

    let mut report = SyncReport::default();
    for (_, name, outcome) in results {
        match outcome {
            Outcome::Synced(resolved) => report.synced.push((name, resolved)),
            Outcome::Failed(error) => report.failed.push((name, error)),
            Outcome::Skipped => report.skipped.push(name),
        }
    }
    report
}
