// Execution Module
// Run orchestration, progress events, reports and the cron loop

pub mod context;
pub mod events;
pub mod executor;
pub mod report;
pub mod scheduler;

// Re-export key types
pub use context::RunContext;
pub use events::{progress_channel, ExecutionEvent, LogLevel, ProgressReceiver, ProgressSender};
pub use executor::RunExecutor;
pub use report::{RunOutcome, RunReport, RunStage, StageReport, StageStatus};
pub use scheduler::Scheduler;
