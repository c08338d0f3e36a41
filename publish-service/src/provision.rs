// Environment Provisioner
// Verifies the runtime version and installs the generator's libraries

use crate::execution::context::RunContext;
use crate::execution::events::ExecutionEvent;
use crate::execution::report::RunStage;
use crate::job::ProvisionConfig;
use crate::runners::{ShellConfig, ShellRunner};
use crate::{ServiceError, ServiceResult};

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;

/// Prepares the execution environment before the generator runs.
///
/// Any error is fatal to the run; there is no retry and no fallback.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn provision(&self, ctx: &RunContext) -> ServiceResult<ProvisionSummary>;
}

/// What the provisioner established
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionSummary {
    pub runtime_path: PathBuf,
    pub runtime_version: String,
    pub packages: Vec<String>,
}

/// Provisioner for a runtime found on PATH plus a package install command
pub struct ToolchainProvisioner {
    config: ProvisionConfig,
    shell: ShellRunner,
}

impl ToolchainProvisioner {
    pub fn new(config: ProvisionConfig) -> Self {
        Self {
            config,
            shell: ShellRunner::new(),
        }
    }

    async fn check_runtime(&self, ctx: &RunContext) -> ServiceResult<(PathBuf, String)> {
        let runtime = &self.config.runtime;

        let path = which::which(&runtime.program).map_err(|e| {
            ServiceError::Provision(format!("runtime '{}' not found: {}", runtime.program, e))
        })?;

        let output = Command::new(&path)
            .arg("--version")
            .current_dir(&ctx.workspace)
            .envs(&ctx.env)
            .output()
            .await
            .map_err(|e| {
                ServiceError::Provision(format!("could not run '{} --version': {}", runtime.program, e))
            })?;

        // Some runtimes print their version on stderr
        let reported = format!(
            "{} {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let reported = reported.trim().to_string();

        if !output.status.success() || !version_matches(&reported, &runtime.version) {
            return Err(ServiceError::Provision(format!(
                "'{}' reports '{}', required version {}",
                runtime.program, reported, runtime.version
            )));
        }

        Ok((path, reported))
    }

    async fn run_command(&self, ctx: &RunContext, script: &str) -> ServiceResult<()> {
        ctx.emit(ExecutionEvent::info(
            format!("$ {}", script),
            Some(RunStage::Provision),
        ));

        let output = self
            .shell
            .run_script_streaming(
                script,
                &ctx.env,
                &ctx.workspace,
                &ShellConfig::default(),
                ctx.output_forwarder(RunStage::Provision),
            )
            .await;

        match output.failure_reason() {
            None => Ok(()),
            Some(reason) => Err(ServiceError::Provision(format!("'{}' {}", script, reason))),
        }
    }
}

#[async_trait]
impl Provisioner for ToolchainProvisioner {
    async fn provision(&self, ctx: &RunContext) -> ServiceResult<ProvisionSummary> {
        let (runtime_path, runtime_version) = self.check_runtime(ctx).await?;
        tracing::info!(
            job = %ctx.job_name,
            runtime = %runtime_path.display(),
            version = %runtime_version,
            "runtime verified"
        );
        ctx.emit(ExecutionEvent::info(
            format!("Using {} ({})", runtime_path.display(), runtime_version),
            Some(RunStage::Provision),
        ));

        if let Some(script) = install_command(&self.config) {
            self.run_command(ctx, &script).await?;
        }

        for script in &self.config.setup {
            self.run_command(ctx, script).await?;
        }

        Ok(ProvisionSummary {
            runtime_path,
            runtime_version,
            packages: self.config.packages.clone(),
        })
    }
}

/// `<install> <packages...>`, or None when there is nothing to install
pub fn install_command(config: &ProvisionConfig) -> Option<String> {
    if config.packages.is_empty() {
        return None;
    }
    Some(format!(
        "{} {}",
        config.install.trim(),
        config.packages.join(" ")
    ))
}

/// Whether a `--version` banner reports the wanted version.
///
/// "3.11" matches "Python 3.11.4" and "v3.11" but not "3.110" or "13.11".
pub fn version_matches(reported: &str, wanted: &str) -> bool {
    let wanted = wanted.trim().trim_start_matches('v');
    if wanted.is_empty() {
        return false;
    }
    let prefix = format!("{}.", wanted);

    reported
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '(' | ')' | '-'))
        .map(|token| token.trim_start_matches('v'))
        .any(|token| token == wanted || token.starts_with(&prefix))
}
