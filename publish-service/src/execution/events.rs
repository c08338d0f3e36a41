// Execution Events
// Progress reporting and event types for run execution

use crate::execution::report::{RunOutcome, RunStage, StageStatus};
use crate::schedule::Trigger;

use std::time::Duration;
use tokio::sync::mpsc;

/// Sender for execution progress events
pub type ProgressSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Receiver for execution progress events
pub type ProgressReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Events emitted during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// Run started
    RunStarted { job_name: String, trigger: Trigger },

    /// Run reached a terminal state
    RunCompleted {
        job_name: String,
        outcome: RunOutcome,
        duration: Duration,
    },

    /// Stage execution started
    StageStarted { stage: RunStage },

    /// Stage execution completed
    StageCompleted {
        stage: RunStage,
        status: StageStatus,
        duration: Duration,
        message: Option<String>,
    },

    /// Stage was not run (disabled or an earlier stage failed)
    StageSkipped { stage: RunStage, reason: String },

    /// Output line from a command run by a stage
    StepOutput {
        stage: RunStage,
        output: String,
        is_error: bool,
    },

    /// Log message (info, warning, error)
    Log {
        level: LogLevel,
        message: String,
        stage: Option<RunStage>,
    },
}

/// Log level for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl ExecutionEvent {
    pub fn run_started(job_name: impl Into<String>, trigger: Trigger) -> Self {
        Self::RunStarted {
            job_name: job_name.into(),
            trigger,
        }
    }

    pub fn run_completed(
        job_name: impl Into<String>,
        outcome: RunOutcome,
        duration: Duration,
    ) -> Self {
        Self::RunCompleted {
            job_name: job_name.into(),
            outcome,
            duration,
        }
    }

    pub fn stage_started(stage: RunStage) -> Self {
        Self::StageStarted { stage }
    }

    pub fn stage_completed(
        stage: RunStage,
        status: StageStatus,
        duration: Duration,
        message: Option<String>,
    ) -> Self {
        Self::StageCompleted {
            stage,
            status,
            duration,
            message,
        }
    }

    pub fn stage_skipped(stage: RunStage, reason: impl Into<String>) -> Self {
        Self::StageSkipped {
            stage,
            reason: reason.into(),
        }
    }

    pub fn step_output(stage: RunStage, output: impl Into<String>, is_error: bool) -> Self {
        Self::StepOutput {
            stage,
            output: output.into(),
            is_error,
        }
    }

    pub fn debug(message: impl Into<String>, stage: Option<RunStage>) -> Self {
        Self::Log {
            level: LogLevel::Debug,
            message: message.into(),
            stage,
        }
    }

    /// Create an info log event
    pub fn info(message: impl Into<String>, stage: Option<RunStage>) -> Self {
        Self::Log {
            level: LogLevel::Info,
            message: message.into(),
            stage,
        }
    }

    /// Create a warning log event
    pub fn warning(message: impl Into<String>, stage: Option<RunStage>) -> Self {
        Self::Log {
            level: LogLevel::Warning,
            message: message.into(),
            stage,
        }
    }

    /// Create an error log event
    pub fn error(message: impl Into<String>, stage: Option<RunStage>) -> Self {
        Self::Log {
            level: LogLevel::Error,
            message: message.into(),
            stage,
        }
    }
}

/// Helper trait for sending events, ignoring errors (fire-and-forget)
pub trait EventSender {
    fn send_event(&self, event: ExecutionEvent);
}

impl EventSender for ProgressSender {
    fn send_event(&self, event: ExecutionEvent) {
        let _ = self.send(event);
    }
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: ExecutionEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event);
        }
    }
}
