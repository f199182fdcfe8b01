//! ktrain CLI
//!
//! Command-line interface for submitting training runs to the ktrain
//! dispatcher and following them to completion.

mod commands;
mod config;
mod resources;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "ktrain")]
#[command(about = "Submit and follow training runs on the cluster", long_about = None)]
struct Cli {
    /// Dispatcher URL
    #[arg(long, env = "KTRAIN_URL", default_value = "http://localhost:8080")]
    dispatcher_url: String,

    /// Bearer token for the dispatcher API
    #[arg(long, env = "KTRAIN_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        dispatcher_url: cli.dispatcher_url,
        token: cli.token,
    };

    handle_command(cli.command, &config).await
}
