// Publish Service Library
// Scheduled artifact regeneration and compare-and-swap publishing to a git branch

pub mod artifacts;
pub mod error;
pub mod execution;
pub mod generator;
pub mod git;
pub mod job;
pub mod provision;
pub mod publisher;
pub mod runners;
pub mod schedule;
pub mod utils;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use error::{ServiceError, ServiceResult};

// Re-export job types
pub use job::{JobDefinition, JobParser};

// Re-export execution types
pub use execution::{
    progress_channel, ExecutionEvent, LogLevel, ProgressSender, RunExecutor, RunOutcome,
    RunReport, RunStage, Scheduler, StageStatus,
};

// Re-export stage capabilities
pub use generator::{Generated, Generator, ScriptGenerator};
pub use provision::{Provisioner, ToolchainProvisioner};
pub use publisher::{PublishOutcome, PublishState, Publisher};
pub use schedule::{CronTrigger, JobSchedule, Trigger};
