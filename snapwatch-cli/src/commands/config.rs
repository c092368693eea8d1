//! `snapwatch config` — configuration inspection.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use snapwatch_core::{config, paths};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Load the config (creating defaults if absent) and print it.
    Show(ConfigShowArgs),
    /// Print the resolved config file path.
    Path,
}

#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Config file to use instead of the standard location.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show(args) => {
            let path = args.config.unwrap_or_else(paths::config_path);
            let (config, source) = config::load(&path)
                .with_context(|| format!("unable to read config {}", path.display()))?;
            println!("config file: {}", path.display());
            println!("source: {source}");
            println!(
                "{}",
                serde_json::to_string_pretty(&config)
                    .context("failed to render configuration JSON")?
            );
        }
        ConfigCommand::Path => {
            println!("{}", paths::config_path().display());
        }
    }
    Ok(())
}
