//! Training submission command

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use ktrain_client::DispatcherClient;
use ktrain_core::domain::{Disposition, ResourceProfile};
use ktrain_core::dto::training::SubmitTraining;
use ktrain_core::validation::validate_data_reference;

use crate::resources::{parse_cpu, parse_memory};

use super::workload;

/// Arguments of `ktrain train`
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Path to the training script
    pub script: PathBuf,

    /// Project the run belongs to
    #[arg(short, long, env = "KTRAIN_PROJECT")]
    pub project: String,

    /// Dataset reference URI with a scheme, e.g. s3://bucket/dataset/v1
    #[arg(short, long, value_parser = parse_data_reference)]
    pub data: String,

    /// CPU for the run, e.g. `2` or `500m`
    #[arg(long, value_parser = parse_cpu, requires = "memory")]
    pub cpu: Option<u32>,

    /// Memory for the run, e.g. `4Gi`
    #[arg(long, value_parser = parse_memory, requires = "cpu")]
    pub memory: Option<u32>,

    /// Secret holding storage credentials, if not the default
    #[arg(long)]
    pub credentials: Option<String>,

    /// Submit a new run even if a recent result exists
    #[arg(long)]
    pub force: bool,

    /// Skip restoring and saving the project's training cache
    #[arg(long)]
    pub no_cache: bool,

    /// Follow the workload until it finishes
    #[arg(short, long)]
    pub wait: bool,

    /// Arguments passed to the script, after `--`
    #[arg(last = true)]
    pub extra_args: Vec<String>,
}

impl TrainArgs {
    fn resources(&self) -> Option<ResourceProfile> {
        match (self.cpu, self.memory) {
            (Some(cpu_millis), Some(memory_mib)) => Some(ResourceProfile {
                cpu_millis,
                memory_mib,
            }),
            _ => None,
        }
    }
}

fn parse_data_reference(input: &str) -> Result<String, String> {
    validate_data_reference(input).map_err(|e| e.to_string())?;
    Ok(input.to_string())
}

/// Submit a training script and optionally follow it
pub async fn submit(client: &DispatcherClient, args: TrainArgs) -> Result<()> {
    let script = tokio::fs::read_to_string(&args.script)
        .await
        .with_context(|| format!("Failed to read script {}", args.script.display()))?;

    let req = SubmitTraining {
        project_id: args.project.clone(),
        script,
        data_reference: args.data.clone(),
        resources: args.resources(),
        credentials: args.credentials.clone(),
        force: args.force,
        use_cache: !args.no_cache,
        extra_args: args.extra_args.clone(),
    };

    let dispatch = client.submit_training(&req).await?;

    let verb = match dispatch.disposition {
        Disposition::Created => "Submitted".green(),
        Disposition::Attached => "Attached to running".yellow(),
        Disposition::Reused => "Reused finished".cyan(),
    };
    println!("{} {} workload {}", "✓".green(), verb, dispatch.workload_id.bold());
    println!("  Project:   {}", dispatch.project_id);
    println!("  Data hash: {}", dispatch.data_hash.dimmed());
    println!("  Phase:     {}", workload::colorize_phase(dispatch.phase));

    if args.wait {
        println!();
        workload::wait(client, &dispatch.workload_id, None).await?;
    }

    Ok(())
}
