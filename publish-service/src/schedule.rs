// Schedule Triggers
// Cron parsing and next fire time calculation, always in UTC

use crate::job::JobDefinition;
use crate::{ServiceError, ServiceResult};

use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// What started a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// A cron trigger fired
    Scheduled {
        expression: String,
        fire_time: DateTime<Utc>,
    },
    /// Started by hand, takes no inputs
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Scheduled { expression, .. } => write!(f, "schedule ({})", expression),
            Trigger::Manual => write!(f, "manual"),
        }
    }
}

impl Trigger {
    /// Scheduled fire time, None for manual runs
    pub fn fire_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Scheduled { fire_time, .. } => Some(*fire_time),
            Trigger::Manual => None,
        }
    }
}

/// A single parsed cron expression
#[derive(Debug, Clone)]
pub struct CronTrigger {
    expression: String,
    schedule: CronSchedule,
}

impl CronTrigger {
    /// Parse a standard five-field expression (minute hour day month weekday).
    ///
    /// Six and seven field expressions with a leading seconds column are
    /// passed through unchanged.
    pub fn parse(expression: &str) -> ServiceResult<Self> {
        let normalized = to_seconds_syntax(expression)?;
        let schedule =
            CronSchedule::from_str(&normalized).map_err(|e| ServiceError::Schedule {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            expression: expression.trim().to_string(),
            schedule,
        })
    }

    /// The expression as written in the job file
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Next fire time strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Build the trigger value recorded for a run fired at `fire_time`
    pub fn fired_at(&self, fire_time: DateTime<Utc>) -> Trigger {
        Trigger::Scheduled {
            expression: self.expression.clone(),
            fire_time,
        }
    }
}

/// All cron triggers of a job
#[derive(Debug, Clone, Default)]
pub struct JobSchedule {
    triggers: Vec<CronTrigger>,
}

impl JobSchedule {
    pub fn new(triggers: Vec<CronTrigger>) -> Self {
        Self { triggers }
    }

    pub fn from_job(job: &JobDefinition) -> ServiceResult<Self> {
        let triggers = job
            .cron_expressions()
            .into_iter()
            .map(CronTrigger::parse)
            .collect::<ServiceResult<Vec<_>>>()?;
        Ok(Self::new(triggers))
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn triggers(&self) -> &[CronTrigger] {
        &self.triggers
    }

    /// Earliest fire time across all triggers, strictly after `after`.
    ///
    /// When two expressions fire at the same instant the one declared first
    /// wins, so a single run is started.
    pub fn next_fire(&self, after: DateTime<Utc>) -> Option<Trigger> {
        let mut best: Option<(DateTime<Utc>, &CronTrigger)> = None;
        for trigger in &self.triggers {
            if let Some(at) = trigger.next_after(after) {
                match best {
                    Some((current, _)) if current <= at => {}
                    _ => best = Some((at, trigger)),
                }
            }
        }
        best.map(|(at, trigger)| trigger.fired_at(at))
    }

    /// The next `count` fire times after `after`
    pub fn upcoming(&self, after: DateTime<Utc>, count: usize) -> Vec<Trigger> {
        let mut fires = Vec::with_capacity(count);
        let mut cursor = after;
        while fires.len() < count {
            let Some(trigger) = self.next_fire(cursor) else {
                break;
            };
            if let Some(fire_time) = trigger.fire_time() {
                cursor = fire_time;
            }
            fires.push(trigger);
        }
        fires
    }
}

/// Convert standard cron syntax to the seconds-first form the cron crate expects.
fn to_seconds_syntax(expression: &str) -> ServiceResult<String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.len() {
        5 => {
            let weekday = translate_weekdays(fields[4]);
            Ok(format!(
                "0 {} {} {} {} {}",
                fields[0], fields[1], fields[2], fields[3], weekday
            ))
        }
        6 | 7 => Ok(fields.join(" ")),
        n => Err(ServiceError::Schedule {
            expression: expression.to_string(),
            reason: format!("expected 5 fields, found {}", n),
        }),
    }
}

/// Standard cron numbers weekdays 0-7 from Sunday, the cron crate 1-7.
/// Names are unambiguous in both, so numbers are rewritten to names.
fn translate_weekdays(field: &str) -> String {
    const NAMES: [&str; 8] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

    field
        .split(',')
        .map(|part| {
            let (base, step) = match part.split_once('/') {
                Some((base, step)) => (base, Some(step)),
                None => (part, None),
            };
            let base = base
                .split('-')
                .map(|bound| match bound.parse::<usize>() {
                    Ok(n) if n < NAMES.len() => NAMES[n].to_string(),
                    _ => bound.to_string(),
                })
                .collect::<Vec<_>>()
                .join("-");
            match step {
                Some(step) => format!("{}/{}", base, step),
                None => base,
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}
