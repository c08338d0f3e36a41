use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use publish_service::{progress_channel, RunExecutor, Scheduler};

/// Run the job on its cron triggers until interrupted
#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Path to the job file (default: chartpub.yml here or at the repository root)
    pub job: Option<PathBuf>,
}

pub async fn execute(args: ScheduleArgs) -> Result<()> {
    let (path, job) = super::load_job(args.job)?;
    output::status("Scheduling", &format!("{} ({})", job.name, path.display()));

    let (tx, mut rx) = progress_channel();
    let scheduler = Scheduler::new(RunExecutor::new(job)?.with_progress(tx))?;
    for trigger in scheduler.schedule().triggers() {
        output::info(&format!("cron '{}' (UTC)", trigger.expression()));
    }

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            output::event(&event);
        }
    });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    let mut failed = 0;
    let runs = scheduler
        .run_with(shutdown, |report| {
            if !report.is_success() {
                failed += 1;
            }
        })
        .await?;

    // Closes the progress channel
    drop(scheduler);
    printer.await?;

    output::status("Stopped", &format!("{} run(s), {} failed", runs, failed));
    Ok(())
}
