// Run Context
// Identity, trigger and environment of a single run

use crate::execution::events::{EventSender, ExecutionEvent, ProgressSender};
use crate::execution::report::RunStage;
use crate::job::JobDefinition;
use crate::runners::OutputCallback;
use crate::schedule::Trigger;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

/// State shared by every stage of one run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub job_name: String,
    pub trigger: Trigger,
    /// UTC start time, also the date stamped on the commit
    pub started_at: DateTime<Utc>,
    /// Repository checkout the run works in
    pub workspace: PathBuf,
    /// Environment passed to provisioning and generator commands
    pub env: HashMap<String, String>,
    events: Option<ProgressSender>,
}

impl RunContext {
    pub fn new(job: &JobDefinition, trigger: Trigger) -> Self {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let mut env = job.env.clone();
        env.insert("CHARTPUB_RUN_ID".to_string(), run_id.to_string());
        env.insert("CHARTPUB_JOB".to_string(), job.name.clone());
        env.insert("CHARTPUB_TRIGGER".to_string(), trigger.to_string());

        Self {
            run_id,
            job_name: job.name.clone(),
            trigger,
            started_at,
            workspace: job.workspace.clone(),
            env,
            events: None,
        }
    }

    pub fn with_progress(mut self, tx: Option<ProgressSender>) -> Self {
        self.events = tx;
        self
    }

    pub fn emit(&self, event: ExecutionEvent) {
        self.events.send_event(event);
    }

    /// Callback that forwards command output lines as `StepOutput` events
    pub fn output_forwarder(&self, stage: RunStage) -> OutputCallback {
        let events = self.events.clone();
        Box::new(move |line, is_error| {
            events.send_event(ExecutionEvent::step_output(stage, line, is_error));
        })
    }
}
