// Artifact Publisher
// Stages artifact files, commits when they changed, pushes with compare-and-swap

use crate::execution::context::RunContext;
use crate::execution::events::ExecutionEvent;
use crate::execution::report::RunStage;
use crate::generator::Generated;
use crate::git::{CommitResult, GitRepo};
use crate::job::PublishConfig;
use crate::ServiceResult;

use std::fmt;

/// Publish progress of a single run.
///
/// `Staged -> {CommitCreated | NoOpNoChange} -> Pushed | Failed`
///
/// An unchanged run still pushes the untouched tip, which the remote
/// accepts as a no-op, so `NoOpNoChange` leads to `Pushed` too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    Staged,
    CommitCreated,
    NoOpNoChange,
    Pushed,
    Failed,
}

impl PublishState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PublishState::Pushed | PublishState::Failed)
    }
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishState::Staged => "staged",
            PublishState::CommitCreated => "commit created",
            PublishState::NoOpNoChange => "no change",
            PublishState::Pushed => "pushed",
            PublishState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Successful end of the publish stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Pushed {
        commit: String,
        files: Vec<String>,
        attempts: u32,
    },
    NoChange,
}

pub struct Publisher {
    config: PublishConfig,
}

impl Publisher {
    pub fn new(config: PublishConfig) -> Self {
        Self { config }
    }

    /// Working copy handle for the publishing branch, authenticated when
    /// `token_env` names a non-empty variable.
    pub fn repository(&self, ctx: &RunContext) -> GitRepo {
        let token = self.config.token_env.as_ref().and_then(|var| {
            let value = ctx
                .env
                .get(var)
                .cloned()
                .or_else(|| std::env::var(var).ok())
                .filter(|v| !v.is_empty());
            if value.is_none() {
                tracing::warn!(variable = %var, "push token variable is not set");
            }
            value
        });

        GitRepo::new(&ctx.workspace, &self.config.remote, &self.config.branch)
            .with_identity(self.config.author.clone())
            .with_token(token)
    }

    /// Commit and push the changed artifacts on top of `base_tip`.
    ///
    /// The push only lands if the remote branch still points at `base_tip`
    /// (or at the tip a retry rebased onto).
    pub async fn publish(
        &self,
        ctx: &RunContext,
        repo: &GitRepo,
        base_tip: &str,
        generated: &Generated,
    ) -> ServiceResult<PublishOutcome> {
        match self.try_publish(ctx, repo, base_tip, generated).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                enter(ctx, PublishState::Failed);
                Err(e)
            }
        }
    }

    async fn try_publish(
        &self,
        ctx: &RunContext,
        repo: &GitRepo,
        base_tip: &str,
        generated: &Generated,
    ) -> ServiceResult<PublishOutcome> {
        let names = generated.names();
        repo.stage(&names).await?;
        enter(ctx, PublishState::Staged);

        let changed = repo.staged_changes(&names).await?;
        let mut committed = if changed.is_empty() {
            false
        } else {
            let message = render_message(&self.config.message, ctx);
            match repo.commit(&message, &changed).await? {
                CommitResult::NothingToCommit => false,
                CommitResult::Created(sha) => {
                    tracing::info!(job = %ctx.job_name, commit = %sha, files = changed.len(), "commit created");
                    true
                }
            }
        };
        enter(
            ctx,
            if committed {
                PublishState::CommitCreated
            } else {
                PublishState::NoOpNoChange
            },
        );

        let max_attempts = self.config.push_attempts.max(1);
        let mut lease = base_tip.to_string();
        let mut attempt = 1;
        loop {
            match repo.push(&lease).await {
                Ok(()) => break,
                Err(e) if e.is_push_rejection() && attempt < max_attempts => {
                    tracing::warn!(job = %ctx.job_name, attempt, "push rejected, rebasing onto remote tip");
                    ctx.emit(ExecutionEvent::warning(
                        format!("{}; rebasing onto {}/{}", e, self.config.remote, self.config.branch),
                        Some(RunStage::Publish),
                    ));
                    lease = repo.rebase_onto_remote().await?;
                    // The rebase drops our commit when the remote already has the same change
                    if committed && repo.head().await? == lease {
                        tracing::info!(job = %ctx.job_name, "artifact changes already on the remote");
                        committed = false;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let head = repo.head().await?;
        enter(ctx, PublishState::Pushed);

        if !committed {
            tracing::info!(job = %ctx.job_name, tip = %head, branch = %self.config.branch, "branch already up to date");
            return Ok(PublishOutcome::NoChange);
        }
        tracing::info!(job = %ctx.job_name, commit = %head, branch = %self.config.branch, "pushed");

        Ok(PublishOutcome::Pushed {
            commit: head,
            files: changed,
            attempts: attempt,
        })
    }
}

fn enter(ctx: &RunContext, state: PublishState) {
    tracing::debug!(job = %ctx.job_name, state = %state, "publish state");
    ctx.emit(ExecutionEvent::debug(
        format!("publish: {}", state),
        Some(RunStage::Publish),
    ));
}

/// Fill `{date}`, `{datetime}`, `{job}` and `{trigger}` from the run
pub fn render_message(template: &str, ctx: &RunContext) -> String {
    template
        .replace("{date}", &ctx.started_at.format("%Y-%m-%d").to_string())
        .replace(
            "{datetime}",
            &ctx.started_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        )
        .replace("{job}", &ctx.job_name)
        .replace("{trigger}", &ctx.trigger.to_string())
}
