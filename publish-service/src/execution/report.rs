// Run Report
// Stage results and the tagged outcome of one run

use crate::schedule::Trigger;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Stages of a run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Checkout,
    Provision,
    Generate,
    Publish,
}

impl RunStage {
    pub const ALL: [RunStage; 4] = [
        RunStage::Checkout,
        RunStage::Provision,
        RunStage::Generate,
        RunStage::Publish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Checkout => "checkout",
            RunStage::Provision => "provision",
            RunStage::Generate => "generate",
            RunStage::Publish => "publish",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: RunStage,
    pub status: StageStatus,
    #[serde(serialize_with = "serialize_millis", rename = "duration_ms")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Exactly one new commit was pushed
    Published { commit: String, files: Vec<String> },
    /// Artifacts were identical to the branch tip, nothing committed
    NoChange,
    Failed { stage: RunStage, reason: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, RunOutcome::Failed { .. })
    }

    pub fn failed(stage: RunStage, reason: impl Into<String>) -> Self {
        RunOutcome::Failed {
            stage,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Published { commit, files } => {
                let short = commit.get(..7).unwrap_or(commit);
                write!(f, "published {} ({} file(s))", short, files.len())
            }
            RunOutcome::NoChange => write!(f, "no change"),
            RunOutcome::Failed { stage, reason } => write!(f, "failed at {}: {}", stage, reason),
        }
    }
}

/// Everything known about one run, from trigger to terminal state
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub job: String,
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageReport>,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn stage(&self, stage: RunStage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}
