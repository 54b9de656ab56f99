//! Command-line interface
//!
//! ```text
//! commodore [--verbose | --quiet] [--no-progress] [--config PATH] <COMMAND>
//!
//! Commands:
//!   sync           Clone or update every component, then render its jsonnetfile.json
//!   list           Show declared components and aliases
//!   check-aliases  Verify aliases against cluster parameters
//! ```
//!
//! Logging goes through `tracing`. `--verbose` selects `debug`, `--quiet`
//! only shows errors, the default is `info`; `RUST_LOG` overrides all of them.

mod check_aliases;
mod list;
mod sync;

pub use check_aliases::CheckAliasesCommand;
pub use list::ListCommand;
pub use sync::SyncCommand;

use crate::config::CONFIG_FILE;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Options shared by all subcommands.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    /// Path of the project configuration
    pub config: PathBuf,
    /// Only errors are printed
    pub quiet: bool,
    /// Progress bars are suppressed
    pub no_progress: bool,
}

/// Commodore: fetch and pin configuration components from git.
#[derive(Parser, Debug)]
#[command(
    name = "commodore",
    about = "Fetch versioned configuration components from git",
    version,
    long_about = "Commodore keeps a local checkout of every configuration component a project declares, \
                  pinned to the declared branch, tag or commit."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug output, including every git command
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable progress bars
    #[arg(long, global = true)]
    no_progress: bool,

    /// Project configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clone or update every component and render its dependency manifest
    Sync(SyncCommand),
    /// Show declared components and aliases
    List(ListCommand),
    /// Verify that aliased components support multiple instances
    CheckAliases(CheckAliasesCommand),
}

impl Cli {
    /// Sets up logging and runs the selected subcommand.
    pub async fn execute(self) -> Result<()> {
        init_tracing(self.log_level());

        let options = GlobalOptions {
            config: self.config,
            quiet: self.quiet,
            no_progress: self.no_progress || self.quiet,
        };

        match self.command {
            Commands::Sync(cmd) => cmd.execute(&options).await,
            Commands::List(cmd) => cmd.execute(&options).await,
            Commands::CheckAliases(cmd) => cmd.execute(&options).await,
        }
    }

    /// Log filter selected by the verbosity flags.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // try_init: a subscriber may already be installed (tests)
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
