// Run Executor
// Runs checkout, provision, generate and publish in order for one trigger

use crate::artifacts::ArtifactPattern;
use crate::execution::context::RunContext;
use crate::execution::events::{EventSender, ExecutionEvent, ProgressSender};
use crate::execution::report::{RunOutcome, RunReport, RunStage, StageReport, StageStatus};
use crate::generator::{Generator, ScriptGenerator};
use crate::job::JobDefinition;
use crate::provision::{Provisioner, ToolchainProvisioner};
use crate::publisher::{PublishOutcome, Publisher};
use crate::schedule::Trigger;
use crate::ServiceResult;

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Executes runs of a single job.
///
/// Stages run strictly in sequence and the first failure ends the run;
/// every later stage is reported as skipped.
pub struct RunExecutor {
    job: JobDefinition,
    provisioner: Option<Arc<dyn Provisioner>>,
    generator: Arc<dyn Generator>,
    publisher: Publisher,
    event_tx: Option<ProgressSender>,
}

impl RunExecutor {
    /// Build an executor with the provisioner and generator the job declares
    pub fn new(job: JobDefinition) -> ServiceResult<Self> {
        let pattern = ArtifactPattern::new(&job.publish.artifacts)?;
        let provisioner = job
            .provision
            .clone()
            .map(|config| Arc::new(ToolchainProvisioner::new(config)) as Arc<dyn Provisioner>);
        let generator = Arc::new(ScriptGenerator::new(job.generate.clone(), pattern));
        let publisher = Publisher::new(job.publish.clone());

        Ok(Self {
            job,
            provisioner,
            generator,
            publisher,
            event_tx: None,
        })
    }

    /// Set progress event sender
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn with_provisioner(mut self, provisioner: Arc<dyn Provisioner>) -> Self {
        self.provisioner = Some(provisioner);
        self
    }

    /// Substitute the artifact generator (alternate data source or renderer)
    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn job(&self) -> &JobDefinition {
        &self.job
    }

    /// Execute one run. Never fails: stage errors end up in the report outcome.
    pub async fn execute(&self, trigger: Trigger) -> RunReport {
        let start = Instant::now();
        let ctx = RunContext::new(&self.job, trigger.clone()).with_progress(self.event_tx.clone());

        tracing::info!(job = %self.job.name, run_id = %ctx.run_id, trigger = %trigger, "run started");
        self.event_tx
            .send_event(ExecutionEvent::run_started(&self.job.name, trigger.clone()));

        let mut stages = Vec::new();
        let outcome = self.run_stages(&ctx, &mut stages).await;

        for stage in RunStage::ALL {
            if stages.iter().all(|s: &StageReport| s.stage != stage) {
                let reason = "an earlier stage failed";
                self.event_tx
                    .send_event(ExecutionEvent::stage_skipped(stage, reason));
                stages.push(skipped(stage, reason));
            }
        }

        let duration = start.elapsed();
        match &outcome {
            RunOutcome::Failed { stage, reason } => {
                tracing::error!(job = %self.job.name, stage = %stage, reason = %reason, "run failed")
            }
            other => tracing::info!(job = %self.job.name, outcome = %other, "run finished"),
        }
        self.event_tx.send_event(ExecutionEvent::run_completed(
            &self.job.name,
            outcome.clone(),
            duration,
        ));

        RunReport {
            run_id: ctx.run_id,
            job: self.job.name.clone(),
            trigger,
            started_at: ctx.started_at,
            finished_at: Utc::now(),
            stages,
            outcome,
        }
    }

    async fn run_stages(&self, ctx: &RunContext, stages: &mut Vec<StageReport>) -> RunOutcome {
        let repo = self.publisher.repository(ctx);

        let base_tip = match self
            .run_stage(ctx, stages, RunStage::Checkout, repo.checkout_remote_tip(), |tip| {
                Some(format!("at {}", short(tip)))
            })
            .await
        {
            Ok(tip) => tip,
            Err(outcome) => return outcome,
        };

        match &self.provisioner {
            Some(provisioner) => {
                let provisioned = self
                    .run_stage(ctx, stages, RunStage::Provision, provisioner.provision(ctx), |s| {
                        Some(s.runtime_version.clone())
                    })
                    .await;
                if let Err(outcome) = provisioned {
                    return outcome;
                }
            }
            None => {
                let reason = "no provision section";
                self.event_tx
                    .send_event(ExecutionEvent::stage_skipped(RunStage::Provision, reason));
                stages.push(skipped(RunStage::Provision, reason));
            }
        }

        let generated = match self
            .run_stage(ctx, stages, RunStage::Generate, self.generator.produce(ctx), |g| {
                Some(format!("{} artifact(s)", g.artifacts.len()))
            })
            .await
        {
            Ok(generated) => generated,
            Err(outcome) => return outcome,
        };

        let published = self
            .run_stage(
                ctx,
                stages,
                RunStage::Publish,
                self.publisher.publish(ctx, &repo, &base_tip, &generated),
                |outcome| match outcome {
                    PublishOutcome::Pushed { commit, .. } => Some(format!("pushed {}", short(commit))),
                    PublishOutcome::NoChange => Some("no change".to_string()),
                },
            )
            .await;

        match published {
            Ok(PublishOutcome::Pushed { commit, files, .. }) => {
                RunOutcome::Published { commit, files }
            }
            Ok(PublishOutcome::NoChange) => RunOutcome::NoChange,
            Err(outcome) => outcome,
        }
    }

    /// Time one stage, report it, and turn its error into a failed outcome
    async fn run_stage<T, F>(
        &self,
        ctx: &RunContext,
        stages: &mut Vec<StageReport>,
        stage: RunStage,
        work: F,
        describe: impl FnOnce(&T) -> Option<String>,
    ) -> Result<T, RunOutcome>
    where
        F: Future<Output = ServiceResult<T>>,
    {
        let start = Instant::now();
        tracing::info!(job = %ctx.job_name, stage = %stage, "stage started");
        self.event_tx.send_event(ExecutionEvent::stage_started(stage));

        let result = work.await;
        let duration = start.elapsed();

        let (status, message) = match &result {
            Ok(value) => (StageStatus::Succeeded, describe(value)),
            Err(e) => {
                tracing::warn!(job = %ctx.job_name, stage = %stage, error = %e, "stage failed");
                self.event_tx
                    .send_event(ExecutionEvent::error(e.to_string(), Some(stage)));
                (StageStatus::Failed, Some(e.to_string()))
            }
        };

        self.event_tx.send_event(ExecutionEvent::stage_completed(
            stage,
            status,
            duration,
            message.clone(),
        ));
        stages.push(StageReport {
            stage,
            status,
            duration,
            message,
        });

        result.map_err(|e| RunOutcome::failed(stage, e.to_string()))
    }
}

fn skipped(stage: RunStage, reason: &str) -> StageReport {
    StageReport {
        stage,
        status: StageStatus::Skipped,
        duration: std::time::Duration::ZERO,
        message: Some(reason.to_string()),
    }
}

fn short(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::execution::events::progress_channel;
    use crate::generator::Generated;
    use crate::job::{JobParser, ProvisionConfig, RuntimeRequirement};
    use crate::test_support::GitFixture;

    use async_trait::async_trait;

    fn job(fixture: &GitFixture, run: &str) -> JobDefinition {
        let mut job = JobParser::parse(
            r#"
name: TICKER charts
schedule:
  - cron: "0 7 * * *"
  - cron: "0 10 * * *"
generate:
  run: "true"
publish:
  artifacts: "TICKER_*.html"
"#,
        )
        .unwrap();
        job.workspace = fixture.workspace().to_path_buf();
        job.generate.run = run.to_string();
        job
    }

    async fn run(job: JobDefinition) -> RunReport {
        RunExecutor::new(job).unwrap().execute(Trigger::Manual).await
    }

    fn statuses(report: &RunReport) -> Vec<(RunStage, StageStatus)> {
        report.stages.iter().map(|s| (s.stage, s.status)).collect()
    }

    #[tokio::test]
    async fn test_identical_output_leaves_branch_unchanged() {
        let fixture = GitFixture::new(&[("TICKER_chart1.html", "one")]);
        let before = fixture.remote_tip();

        let report = run(job(&fixture, "printf one > TICKER_chart1.html")).await;

        assert_eq!(report.outcome, RunOutcome::NoChange);
        assert!(report.is_success());
        assert_eq!(fixture.remote_tip(), before);
        assert_eq!(
            report.stage(RunStage::Publish).unwrap().message.as_deref(),
            Some("no change")
        );
    }

    #[tokio::test]
    async fn test_changed_chart_publishes_one_commit() {
        let fixture = GitFixture::new(&[
            ("TICKER_chart1.html", "one"),
            ("TICKER_chart2.html", "two"),
        ]);
        let commits_before = fixture.remote_commit_count();

        let report = run(job(
            &fixture,
            "printf one > TICKER_chart1.html; printf 'two v2' > TICKER_chart2.html; \
             echo scratch > notes.txt; echo edited > index.html",
        ))
        .await;

        let RunOutcome::Published { commit, files } = &report.outcome else {
            panic!("expected publish, got {}", report.outcome);
        };
        assert_eq!(files, &vec!["TICKER_chart2.html".to_string()]);
        assert_eq!(&fixture.remote_tip(), commit);
        assert_eq!(fixture.remote_commit_count(), commits_before + 1);
        assert_eq!(fixture.remote_tip_files(), vec!["TICKER_chart2.html"]);
        assert_eq!(fixture.remote_file("TICKER_chart2.html"), "two v2");
        assert_eq!(fixture.remote_file("index.html"), "<html>site</html>");
        assert_eq!(
            fixture.remote_subject(),
            format!("Update charts {}", report.started_at.format("%Y-%m-%d"))
        );
        assert_eq!(
            fixture.remote_author(),
            "github-actions[bot] <41898282+github-actions[bot]@users.noreply.github.com>"
        );
    }

    #[tokio::test]
    async fn test_workspace_below_checkout_root() {
        let fixture = GitFixture::new(&[("TICKER_chart1.html", "one")]);
        let site = fixture.workspace().join("site");
        std::fs::create_dir(&site).unwrap();
        let mut job = job(&fixture, "printf new > TICKER_chart9.html");
        job.workspace = site;

        let report = run(job).await;

        let RunOutcome::Published { files, .. } = &report.outcome else {
            panic!("expected publish, got {}", report.outcome);
        };
        assert_eq!(files, &vec!["TICKER_chart9.html".to_string()]);
        assert_eq!(fixture.remote_file("site/TICKER_chart9.html"), "new");
    }

    #[tokio::test]
    async fn test_generator_failure_publishes_nothing() {
        let fixture = GitFixture::new(&[("TICKER_chart1.html", "one")]);
        let before = fixture.remote_tip();

        let report = run(job(&fixture, "printf partial > TICKER_chart1.html; exit 1")).await;

        assert!(matches!(
            report.outcome,
            RunOutcome::Failed {
                stage: RunStage::Generate,
                ..
            }
        ));
        assert_eq!(fixture.remote_tip(), before);
        assert_eq!(
            statuses(&report),
            vec![
                (RunStage::Checkout, StageStatus::Succeeded),
                (RunStage::Provision, StageStatus::Skipped),
                (RunStage::Generate, StageStatus::Failed),
                (RunStage::Publish, StageStatus::Skipped),
            ]
        );
    }

    #[tokio::test]
    async fn test_provision_failure_skips_generator() {
        let fixture = GitFixture::new(&[("TICKER_chart1.html", "one")]);
        let mut job = job(&fixture, "touch generator.ran");
        job.provision = Some(ProvisionConfig {
            runtime: RuntimeRequirement {
                program: "chartpub-no-such-runtime-xyz".to_string(),
                version: "3.11".to_string(),
            },
            install: "true".to_string(),
            packages: vec!["plotly".to_string()],
            setup: Vec::new(),
        });

        let report = run(job).await;

        assert!(matches!(
            report.outcome,
            RunOutcome::Failed {
                stage: RunStage::Provision,
                ..
            }
        ));
        assert!(!fixture.workspace().join("generator.ran").exists());
        assert_eq!(
            report.stage(RunStage::Generate).unwrap().status,
            StageStatus::Skipped
        );
    }

    #[tokio::test]
    async fn test_missing_branch_fails_checkout() {
        let fixture = GitFixture::new(&[("TICKER_chart1.html", "one")]);
        let mut job = job(&fixture, "touch generator.ran");
        job.publish.branch = "missing-branch".to_string();

        let report = run(job).await;

        assert!(matches!(
            report.outcome,
            RunOutcome::Failed {
                stage: RunStage::Checkout,
                ..
            }
        ));
        assert!(!fixture.workspace().join("generator.ran").exists());
    }

    #[tokio::test]
    async fn test_concurrent_push_is_rejected_then_recovered() {
        let fixture = GitFixture::new(&[("TICKER_chart1.html", "one")]);

        let racing = format!(
            "{} && printf two > TICKER_chart1.html",
            fixture.concurrent_push_script("other.txt")
        );
        let report = run(job(&fixture, &racing)).await;

        let RunOutcome::Failed { stage, reason } = &report.outcome else {
            panic!("expected rejection, got {}", report.outcome);
        };
        assert_eq!(*stage, RunStage::Publish);
        assert!(reason.starts_with("Push rejected"), "{}", reason);

        let concurrent_tip = fixture.remote_tip();
        assert_eq!(fixture.remote_subject(), "Concurrent update");
        let local_head = fixture.repo().head().await.unwrap();
        assert_ne!(local_head, concurrent_tip);

        // The next run starts from the concurrent commit and publishes on top of it
        let report = run(job(&fixture, "printf two > TICKER_chart1.html")).await;
        assert!(matches!(report.outcome, RunOutcome::Published { .. }));
        assert_eq!(fixture.remote_commit_count(), 3);
        assert_eq!(fixture.remote_file("other.txt"), "concurrent");
        assert_eq!(fixture.remote_file("TICKER_chart1.html"), "two");
    }

    struct StaticGenerator;

    #[async_trait]
    impl Generator for StaticGenerator {
        async fn produce(&self, ctx: &RunContext) -> ServiceResult<Generated> {
            std::fs::write(ctx.workspace.join("TICKER_static.html"), "<html>static</html>")?;
            let pattern = ArtifactPattern::new("TICKER_*.html")?;
            Ok(Generated {
                artifacts: pattern.collect(&ctx.workspace)?,
            })
        }
    }

    #[tokio::test]
    async fn test_substituted_generator() {
        let fixture = GitFixture::new(&[("TICKER_chart1.html", "one")]);
        let executor = RunExecutor::new(job(&fixture, "exit 1"))
            .unwrap()
            .with_generator(Arc::new(StaticGenerator));

        let report = executor.execute(Trigger::Manual).await;

        let RunOutcome::Published { files, .. } = &report.outcome else {
            panic!("expected publish, got {}", report.outcome);
        };
        assert_eq!(files, &vec!["TICKER_static.html".to_string()]);
    }

    #[tokio::test]
    async fn test_progress_events_bracket_the_run() {
        let fixture = GitFixture::new(&[("TICKER_chart1.html", "one")]);
        let (tx, mut rx) = progress_channel();
        let executor = RunExecutor::new(job(&fixture, "echo rendering; printf one > TICKER_chart1.html"))
            .unwrap()
            .with_progress(tx);

        executor.execute(Trigger::Manual).await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert!(matches!(events.first(), Some(ExecutionEvent::RunStarted { .. })));
        assert!(matches!(
            events.last(),
            Some(ExecutionEvent::RunCompleted {
                outcome: RunOutcome::NoChange,
                ..
            })
        ));
        assert!(events.iter().any(|e| matches!(
            e,
            ExecutionEvent::StepOutput { stage: RunStage::Generate, output, .. } if output == "rendering"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            ExecutionEvent::StageSkipped {
                stage: RunStage::Provision,
                ..
            }
        )));
    }
}
