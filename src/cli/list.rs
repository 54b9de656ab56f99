//! `commodore list`

use crate::cli::GlobalOptions;
use crate::component::{component_dir, parameter_key};
use crate::config::ProjectConfig;
use crate::git::{GitRepo, Vcs};
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Show declared components and aliases.
#[derive(Args, Debug)]
pub struct ListCommand {}

impl ListCommand {
    pub(crate) async fn execute(self, options: &GlobalOptions) -> Result<()> {
        let config = ProjectConfig::load(&options.config).await?;
        let work_dir = config.work_dir();

        let aliases = config.component_aliases();
        if aliases.is_empty() {
            println!("No components declared in {}", options.config.display());
            return Ok(());
        }

        for (alias, name) in &aliases {
            let Some(spec) = config.components.get(name) else {
                continue;
            };
            let directory = component_dir(&work_dir, name);
            let state = if GitRepo::new(&directory).is_repository() {
                "synced".green()
            } else {
                "not synced".yellow()
            };

            if alias == name {
                println!("{} ({})", alias.bold(), state);
            } else {
                println!("{} -> {} ({})", alias.bold(), name, state);
            }
            println!("  parameters: {}", parameter_key(alias));
            println!("  version:    {}", spec.version);
            println!("  url:        {}", spec.url);
            println!("  directory:  {}", directory.display());
        }

        Ok(())
    }
}
