//! Console for the Warden guardian recovery workflow
//!
//! Drives sign-in, guardian registration and recovery against the in-process
//! sandbox network. Log and error lines are mirrored into a console panel.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use warden_core::WardenConfig;
use warden_recovery::GuardianRecoveryWorkflow;
use warden_simulator::{fill_sandbox_defaults, SimulatedNetwork};

mod commands;
mod console;
mod demo;
mod shell;

use console::ConsolePanel;
use shell::Shell;

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Warden - guardian social recovery for Safe smart accounts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = ".warden/config.toml")]
    config: PathBuf,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Interactive shell (default)
    Shell,
    /// Run the whole recovery end to end
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let panel = ConsolePanel::echoing();
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_ansi(false)
        .with_target(false)
        .with_writer(panel.clone())
        .try_init()
        .map_err(|e| anyhow!("failed to install logging: {e}"))?;

    let network = SimulatedNetwork::new();
    let mut config = WardenConfig::load(Some(&cli.config))
        .with_context(|| format!("loading {}", cli.config.display()))?;
    fill_sandbox_defaults(&mut config, &network)?;

    let workflow = Arc::new(GuardianRecoveryWorkflow::new(
        Arc::new(network.clone()),
        config,
    ));

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Shell => Shell::new(workflow, network, panel).run().await,
        Commands::Demo => demo::run(&workflow, &network).await,
    }
}
