// Artifact Generator
// External chart generation behind a substitutable capability

use crate::artifacts::{Artifact, ArtifactPattern};
use crate::execution::context::RunContext;
use crate::execution::events::ExecutionEvent;
use crate::execution::report::RunStage;
use crate::job::GenerateConfig;
use crate::runners::{ShellConfig, ShellRunner};
use crate::{ServiceError, ServiceResult};

use async_trait::async_trait;
use std::time::Duration;

/// Produces the artifact set for a run.
///
/// The publisher only sees the files on disk, so any data source or
/// renderer can stand behind this trait.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn produce(&self, ctx: &RunContext) -> ServiceResult<Generated>;
}

/// Files present after the generator finished
#[derive(Debug, Clone, Default)]
pub struct Generated {
    pub artifacts: Vec<Artifact>,
}

impl Generated {
    pub fn names(&self) -> Vec<String> {
        self.artifacts.iter().map(|a| a.name.clone()).collect()
    }
}

/// Runs the configured command through the shell in the workspace
pub struct ScriptGenerator {
    config: GenerateConfig,
    pattern: ArtifactPattern,
    shell: ShellRunner,
}

impl ScriptGenerator {
    pub fn new(config: GenerateConfig, pattern: ArtifactPattern) -> Self {
        Self {
            config,
            pattern,
            shell: ShellRunner::new(),
        }
    }

    fn shell_config(&self) -> ShellConfig {
        ShellConfig::with_timeout(
            self.config
                .timeout_minutes
                .map(|m| Duration::from_secs(m.saturating_mul(60))),
        )
    }
}

#[async_trait]
impl Generator for ScriptGenerator {
    async fn produce(&self, ctx: &RunContext) -> ServiceResult<Generated> {
        ctx.emit(ExecutionEvent::info(
            format!("$ {}", self.config.run),
            Some(RunStage::Generate),
        ));

        let output = self
            .shell
            .run_script_streaming(
                &self.config.run,
                &ctx.env,
                &ctx.workspace,
                &self.shell_config(),
                ctx.output_forwarder(RunStage::Generate),
            )
            .await;

        if let Some(reason) = output.failure_reason() {
            return Err(ServiceError::Generate(reason));
        }

        let artifacts = self.pattern.collect(&ctx.workspace)?;
        if artifacts.is_empty() {
            let message = format!("No files matching '{}' were produced", self.pattern.as_str());
            if self.config.require_artifacts {
                return Err(ServiceError::Generate(message));
            }
            tracing::warn!(job = %ctx.job_name, pattern = self.pattern.as_str(), "generator produced no artifacts");
            ctx.emit(ExecutionEvent::warning(message, Some(RunStage::Generate)));
        }

        Ok(Generated { artifacts })
    }
}
