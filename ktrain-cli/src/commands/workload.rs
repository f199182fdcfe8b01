//! Workload command handlers
//!
//! Status, waiting, cancellation and logs of a single workload.

use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use colored::*;
use ktrain_client::DispatcherClient;
use ktrain_core::domain::{WorkloadPhase, WorkloadRecord};

/// Longest single wait request; the dispatcher caps it anyway.
const WAIT_CHUNK_SECS: u64 = 300;

/// Get and display a workload
pub async fn status(client: &DispatcherClient, id: &str) -> Result<()> {
    let record = client.get_workload(id).await?;
    print_workload_details(&record);
    Ok(())
}

/// Seconds for the next wait request, or `None` once the deadline has passed
///
/// Partial seconds round up so the last request never asks for zero.
fn next_chunk(remaining: Option<Duration>) -> Option<u64> {
    match remaining {
        None => Some(WAIT_CHUNK_SECS),
        Some(left) if left.is_zero() => None,
        Some(left) => {
            let secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
            Some(secs.min(WAIT_CHUNK_SECS))
        }
    }
}

/// Wait for a workload to finish, re-issuing bounded wait requests
///
/// Fails when the workload fails so scripts can rely on the exit code.
pub async fn wait(client: &DispatcherClient, id: &str, timeout: Option<u64>) -> Result<()> {
    let deadline = timeout.map(|secs| Instant::now() + Duration::from_secs(secs));

    println!("{}", format!("Waiting for {}...", id).dimmed());

    let record = loop {
        let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
        let record = match next_chunk(remaining) {
            Some(chunk) => client.wait(id, chunk).await?,
            None => client.get_workload(id).await?,
        };
        if record.phase.is_terminal() {
            break record;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            println!(
                "{}",
                format!("⚠ Still {} after the timeout", record.phase).yellow()
            );
            print_workload_details(&record);
            return Ok(());
        }
    };

    print_workload_details(&record);

    if record.phase == WorkloadPhase::Failed {
        bail!("workload {} failed", record.workload_id);
    }
    Ok(())
}

/// Cancel a workload
pub async fn cancel(client: &DispatcherClient, id: &str) -> Result<()> {
    if client.cancel(id).await? {
        println!("{} Cancelled workload {}", "✓".green(), id.bold());
    } else {
        println!(
            "{}",
            format!("Workload {} had already finished.", id).yellow()
        );
    }
    Ok(())
}

/// Print the workload's log
pub async fn logs(client: &DispatcherClient, id: &str) -> Result<()> {
    let logs = client.logs(id).await?;

    if logs.is_empty() {
        println!("{}", "No logs yet for this workload.".yellow());
    } else {
        println!("{}", format!("Logs for workload {}:", id).bold());
        println!("{}", "─".repeat(80).dimmed());
        print!("{}", logs);
        if !logs.ends_with('\n') {
            println!();
        }
        println!("{}", "─".repeat(80).dimmed());
    }

    Ok(())
}

/// Print where the model of a succeeded workload lives
pub async fn result(client: &DispatcherClient, id: &str) -> Result<()> {
    let result = match client.result(id).await {
        Ok(result) => result,
        Err(e) if e.is_not_found() => {
            println!(
                "{}",
                format!("Workload {} has no model yet.", id).yellow()
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("{} Model for workload {}", "✓".green(), result.workload_id.bold());
    if let Some(bucket) = &result.bucket {
        println!("  Bucket: {}", bucket.cyan());
    }
    println!("  Path:   {}", result.model_path.cyan());
    Ok(())
}

/// Print detailed workload information
fn print_workload_details(record: &WorkloadRecord) {
    println!("{}", "Workload Details:".bold());
    println!("  ID:         {}", record.workload_id.cyan());
    println!("  Project:    {}", record.fingerprint.project_id);
    println!("  Data hash:  {}", record.fingerprint.data_hash.dimmed());
    println!("  Generation: {}", record.generation);
    println!("  Phase:      {}", colorize_phase(record.phase));
    println!(
        "  Created:    {}",
        record.created_at.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(finished) = record.terminal_at {
        println!("  Finished:   {}", finished.format("%Y-%m-%d %H:%M:%S"));

        let seconds = finished
            .signed_duration_since(record.created_at)
            .num_seconds();
        println!("  Duration:   {}s", seconds);
    }

    if let Some(detail) = &record.detail {
        println!("\n{}", "Detail:".bold());
        println!("{}", detail.red());
    }
}

/// Colorize a workload phase for display
pub fn colorize_phase(phase: WorkloadPhase) -> ColoredString {
    let label = phase.to_string();
    match phase {
        WorkloadPhase::Pending => label.yellow(),
        WorkloadPhase::Running => label.cyan(),
        WorkloadPhase::Succeeded => label.green(),
        WorkloadPhase::Failed => label.red(),
    }
}
