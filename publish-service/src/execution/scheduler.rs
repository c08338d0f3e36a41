// Run Scheduler
// Fires runs on a job's cron triggers until shut down

use crate::execution::executor::RunExecutor;
use crate::execution::report::RunReport;
use crate::schedule::JobSchedule;
use crate::{ServiceError, ServiceResult};

use chrono::{DateTime, Utc};
use std::future::Future;

/// Sequential cron loop for one job.
///
/// The next fire time is always computed from the current time, so fire
/// times that pass while a run is in progress are skipped, not queued.
pub struct Scheduler {
    schedule: JobSchedule,
    executor: RunExecutor,
}

impl Scheduler {
    pub fn new(executor: RunExecutor) -> ServiceResult<Self> {
        let schedule = JobSchedule::from_job(executor.job())?;
        if schedule.is_empty() {
            return Err(ServiceError::InvalidInput(format!(
                "job '{}' has no cron triggers to schedule",
                executor.job().name
            )));
        }
        Ok(Self { schedule, executor })
    }

    pub fn schedule(&self) -> &JobSchedule {
        &self.schedule
    }

    /// Run until `shutdown` resolves and return the number of runs started.
    ///
    /// A run in progress is finished before shutdown is observed.
    pub async fn run_until<S>(&self, shutdown: S) -> ServiceResult<usize>
    where
        S: Future<Output = ()>,
    {
        self.run_with(shutdown, |_| {}).await
    }

    /// Like `run_until`, handing every finished report to `on_report`
    pub async fn run_with<S, R>(&self, shutdown: S, mut on_report: R) -> ServiceResult<usize>
    where
        S: Future<Output = ()>,
        R: FnMut(&RunReport),
    {
        tokio::pin!(shutdown);
        let job = &self.executor.job().name;
        let mut runs = 0;
        let mut last_fire: Option<DateTime<Utc>> = None;

        loop {
            // Never fire the same instant twice if the timer woke early
            let now = Utc::now();
            let from = last_fire.map_or(now, |last| last.max(now));
            let Some(trigger) = self.schedule.next_fire(from) else {
                tracing::info!(job = %job, "no further fire times");
                return Ok(runs);
            };
            let Some(fire_time) = trigger.fire_time() else {
                return Ok(runs);
            };

            tracing::info!(job = %job, next = %fire_time, trigger = %trigger, "waiting for next fire time");
            let wait = (fire_time - Utc::now()).to_std().unwrap_or_default();

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(job = %job, runs, "scheduler stopped");
                    return Ok(runs);
                }
                _ = tokio::time::sleep(wait) => {}
            }

            last_fire = Some(fire_time);
            runs += 1;
            let report = self.executor.execute(trigger).await;
            on_report(&report);
        }
    }
}
