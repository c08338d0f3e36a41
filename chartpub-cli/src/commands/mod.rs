// CLI Commands
// Subcommand implementations and shared job file resolution

pub mod run;
pub mod schedule;
pub mod validate;

use std::path::PathBuf;

use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;

use publish_service::utils::{find_job_file, JOB_FILE_NAME};
use publish_service::{JobDefinition, JobParser};

/// Load the job from an explicit path or the discovered `chartpub.yml`
pub fn load_job(path: Option<PathBuf>) -> Result<(PathBuf, JobDefinition)> {
    let path = match path {
        Some(path) => path,
        None => {
            let cwd = std::env::current_dir()?;
            match find_job_file(&cwd) {
                Some(found) => found,
                None => bail!(
                    "No {} found in {} or its repository root",
                    JOB_FILE_NAME,
                    cwd.display()
                ),
            }
        }
    };

    if !path.exists() {
        bail!("Job file not found: {}", path.display());
    }

    let job = JobParser::from_file(&path)
        .wrap_err_with(|| format!("Invalid job file {}", path.display()))?;
    Ok((path, job))
}
