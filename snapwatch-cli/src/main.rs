//! snapwatch — watches the observed desktop application's log directory and
//! notifies local WebSocket subscribers when a screen capture is recorded.
//!
//! # Usage
//!
//! ```text
//! snapwatch run [--config <path>] [--logs-dir <dir>] [--debug]
//! snapwatch config show [--config <path>]
//! snapwatch config path
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::config::ConfigCommand;
use commands::run::RunArgs;

#[derive(Parser, Debug)]
#[command(
    name = "snapwatch",
    version,
    about = "Screen-capture notification daemon",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the daemon in the foreground (tailer + WebSocket front end).
    Run(RunArgs),

    /// Inspect the effective configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Config { command } => commands::config::run(command),
    }
}
