//! `snapwatch run` — foreground daemon.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use snapwatch_core::{config, paths};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Config file to use instead of the standard location.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Watch this directory instead of the configured one.
    #[arg(long)]
    pub logs_dir: Option<String>,

    /// Enable debug mode (registers the /test/broadcast endpoint).
    #[arg(long)]
    pub debug: bool,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let path = self.config.unwrap_or_else(paths::config_path);
        let (mut config, source) = config::load(&path)
            .with_context(|| format!("unable to read config {}", path.display()))?;

        if let Some(dir) = self.logs_dir {
            config.upwork_logs_dir = dir;
        }
        if self.debug {
            config.debug_mode = true;
        }

        config::validate(&config).context("configuration error")?;

        println!("config file: {}", path.display());
        println!("using {source}");

        snapwatch_daemon::start_blocking(config).context("daemon exited with error")
    }
}
