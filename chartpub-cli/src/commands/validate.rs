use crate::output;

use std::path::PathBuf;

use chrono::Utc;
use clap::Args;
use color_eyre::Result;

use publish_service::provision::install_command;
use publish_service::JobSchedule;

/// Validate a job file and preview its fire times
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the job file (default: chartpub.yml here or at the repository root)
    pub job: Option<PathBuf>,

    /// Print the next N fire times
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub upcoming: usize,
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    let (path, job) = match super::load_job(args.job) {
        Ok(loaded) => loaded,
        Err(e) => {
            output::error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };

    output::status("Validating", &format!("{}", path.display()));
    output::check(&format!("Job '{}'", job.name));

    let schedule = JobSchedule::from_job(&job)?;
    for trigger in schedule.triggers() {
        output::check(&format!("cron '{}' (UTC)", trigger.expression()));
    }
    if job.manual {
        output::check("manual runs allowed");
    }

    match &job.provision {
        Some(provision) => {
            output::check(&format!(
                "runtime {} {}",
                provision.runtime.program, provision.runtime.version
            ));
            if let Some(install) = install_command(provision) {
                output::check(&format!("install: {}", install));
            }
        }
        None => output::info("no provisioning"),
    }

    output::check(&format!("generate: {}", job.generate.run));
    output::check(&format!(
        "publish '{}' to {}/{}",
        job.publish.artifacts, job.publish.remote, job.publish.branch
    ));

    if !job.workspace.is_dir() {
        output::warning(&format!(
            "workspace {} does not exist yet",
            job.workspace.display()
        ));
    }

    if args.upcoming > 0 {
        output::header("Upcoming runs");
        for trigger in schedule.upcoming(Utc::now(), args.upcoming) {
            if let Some(at) = trigger.fire_time() {
                output::info(&format!("{}  {}", at.format("%Y-%m-%d %H:%M UTC"), trigger));
            }
        }
    }

    output::success("Job is valid");
    Ok(())
}
