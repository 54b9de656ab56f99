//! `commodore check-aliases`

use crate::cli::GlobalOptions;
use crate::component::{component_deprecation_notices, verify_component_aliases};
use crate::config::ProjectConfig;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Verify that aliased components support multiple instances, and show
/// deprecation notices of the components in use.
#[derive(Args, Debug)]
pub struct CheckAliasesCommand {
    /// YAML file with the cluster's parameters (optionally below a top-level `parameters` key)
    #[arg(long)]
    parameters: PathBuf,
}

impl CheckAliasesCommand {
    pub(crate) async fn execute(self, options: &GlobalOptions) -> Result<()> {
        let config = ProjectConfig::load(&options.config).await?;
        let parameters = load_parameters(&self.parameters).await?;

        let aliases = config.component_aliases();
        verify_component_aliases(&aliases, &parameters)?;

        if !options.quiet {
            let notices = component_deprecation_notices(&aliases, &parameters);
            if !notices.is_empty() {
                println!("\n{}", "Commodore notices:".bold());
                for notice in notices {
                    println!(" > {notice}");
                }
            }
            println!("{} {} aliases verified", "✓".green().bold(), aliases.len());
        }

        Ok(())
    }
}

async fn load_parameters(path: &Path) -> Result<Value> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read parameters from {}", path.display()))?;
    let document: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse parameters from {}", path.display()))?;

    Ok(match document {
        Value::Object(mut map) if map.get("parameters").is_some_and(Value::is_object) => {
            map.remove("parameters").unwrap_or_default()
        }
        other => other,
    })
}
