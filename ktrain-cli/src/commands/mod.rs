//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod train;
mod workload;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

pub use train::TrainArgs;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Submit a training script
    Train(TrainArgs),
    /// Show the current state of a workload
    Status {
        /// Workload ID
        id: String,
    },
    /// Block until a workload finishes
    Wait {
        /// Workload ID
        id: String,

        /// Give up after this many seconds (default: wait indefinitely)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Cancel a pending or running workload
    Cancel {
        /// Workload ID
        id: String,
    },
    /// Print the training pod's log
    Logs {
        /// Workload ID
        id: String,
    },
    /// Show where a succeeded workload wrote its model
    Result {
        /// Workload ID
        id: String,
    },
}

/// Handle a CLI command
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        Commands::Train(args) => train::submit(&client, args).await,
        Commands::Status { id } => workload::status(&client, &id).await,
        Commands::Wait { id, timeout } => workload::wait(&client, &id, timeout).await,
        Commands::Cancel { id } => workload::cancel(&client, &id).await,
        Commands::Logs { id } => workload::logs(&client, &id).await,
        Commands::Result { id } => workload::result(&client, &id).await,
    }
}
