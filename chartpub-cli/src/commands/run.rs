use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::eyre::bail;
use color_eyre::Result;

use publish_service::{progress_channel, RunExecutor, Trigger};

/// Run the job once as a manual trigger
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the job file (default: chartpub.yml here or at the repository root)
    pub job: Option<PathBuf>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let (path, job) = super::load_job(args.job)?;
    output::status("Loaded", &format!("{} ({})", job.name, path.display()));

    if !job.manual {
        bail!("Job '{}' does not allow manual runs", job.name);
    }

    let (tx, mut rx) = progress_channel();
    let executor = RunExecutor::new(job)?.with_progress(tx);

    // Spawn execution in background
    let exec_handle = tokio::spawn(async move { executor.execute(Trigger::Manual).await });

    // Process events in the foreground
    while let Some(event) = rx.recv().await {
        output::event(&event);
    }

    let report = exec_handle.await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if !report.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
