//! `commodore sync`

use crate::cli::GlobalOptions;
use crate::component::{SyncPolicy, sync_components};
use crate::config::ProjectConfig;
use crate::git::ensure_git_available;
use crate::utils::progress::ProgressBar;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Clone or update every component and render its dependency manifest.
///
/// Components are reconciled concurrently. After the first failure no new
/// components are started unless `--keep-going` is given; components that
/// were already reconciled stay as they are.
#[derive(Args, Debug)]
pub struct SyncCommand {
    /// Number of components synced at the same time [default: from config, or 4]
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    max_parallel: Option<u16>,

    /// Sync all components even if some fail
    #[arg(long)]
    keep_going: bool,
}

impl SyncCommand {
    pub(crate) async fn execute(self, options: &GlobalOptions) -> Result<()> {
        ensure_git_available()?;
        let config = ProjectConfig::load(&options.config).await?;

        let mut components = config.components();
        if components.is_empty() {
            if !options.quiet {
                println!("No components declared in {}", options.config.display());
            }
            return Ok(());
        }

        let max_parallel = self.max_parallel.map_or_else(|| config.max_parallel(), usize::from);
        let policy = if self.keep_going {
            SyncPolicy::KeepGoing
        } else {
            SyncPolicy::FailFast
        };

        let progress = if options.no_progress {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(components.len() as u64)
        };
        progress.set_prefix("Syncing");

        let mut report = sync_components(&mut components, max_parallel, policy, Some(&progress)).await;
        progress.finish_and_clear();

        for component in &components {
            if !report.synced.iter().any(|(name, _)| name == component.name()) {
                continue;
            }
            let Some(spec) = config.components.get(component.name()) else {
                continue;
            };
            if let Err(error) = component.render_jsonnetfile_json(&spec.jsonnetfile_parameters) {
                report.synced.retain(|(name, _)| name != component.name());
                report.failed.push((component.name().to_string(), error));
            }
        }

        if !options.quiet {
            for (name, resolved) in &report.synced {
                println!("  {} {} {}", "✓".green(), name.bold(), resolved.to_string().dimmed());
            }
            for (name, error) in &report.failed {
                println!("  {} {} {}", "✗".red(), name.bold(), error.to_string().red());
            }
            for name in &report.skipped {
                println!("  {} {} {}", "-".yellow(), name.bold(), "skipped".yellow());
            }
            if report.is_success() {
                println!("{} Synced {} components", "✓".green().bold(), report.synced.len());
            }
        }

        report.into_result().map(|_| ())
    }
}
