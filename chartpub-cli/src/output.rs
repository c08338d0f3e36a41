// Output formatting helpers for CLI commands

use publish_service::{ExecutionEvent, LogLevel, RunOutcome, RunStage, StageStatus};

/// Print a status message: "  Status message"
pub fn status(action: &str, message: &str) {
    eprintln!("\x1b[1;36m{:>12}\x1b[0m {}", action, message);
}

/// Print a success message with checkmark
pub fn success(message: &str) {
    eprintln!("\x1b[1;32m  \u{2713}\x1b[0m {}", message);
}

/// Print a failure message with X
pub fn failure(message: &str) {
    eprintln!("\x1b[1;31m  \u{2717}\x1b[0m {}", message);
}

/// Print a check/pass item
pub fn check(message: &str) {
    eprintln!("\x1b[32m  \u{2713}\x1b[0m {}", message);
}

/// Print a warning message
pub fn warning(message: &str) {
    eprintln!("\x1b[33m  !\x1b[0m {}", message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("\x1b[1;31merror:\x1b[0m {}", message);
}

/// Print an info message
pub fn info(message: &str) {
    eprintln!("\x1b[36m  i\x1b[0m {}", message);
}

/// Print a dim/muted message
pub fn dim(message: &str) {
    eprintln!("\x1b[2m{}\x1b[0m", message);
}

/// Print a dim success message
pub fn dim_success(message: &str) {
    eprintln!("\x1b[32m{}\x1b[0m", message);
}

/// Print a dim failure message
pub fn dim_failure(message: &str) {
    eprintln!("\x1b[31m{}\x1b[0m", message);
}

/// Print a stage header
pub fn stage_header(stage: RunStage) {
    eprintln!("\x1b[1;34m  Stage\x1b[0m {}", stage);
}

/// Print command output (indented)
pub fn step_output(line: &str) {
    eprintln!("        | {}", line);
}

/// Print command error output (indented, red)
pub fn step_error(line: &str) {
    eprintln!("\x1b[31m        | {}\x1b[0m", line);
}

/// Print a header line
pub fn header(message: &str) {
    eprintln!("\x1b[1m==> {}\x1b[0m", message);
}

/// Render one progress event
pub fn event(event: &ExecutionEvent) {
    match event {
        ExecutionEvent::RunStarted { job_name, trigger } => {
            header(&format!("Run '{}' ({})", job_name, trigger));
        }

        ExecutionEvent::RunCompleted {
            outcome, duration, ..
        } => {
            let secs = duration.as_secs_f64();
            match outcome {
                RunOutcome::Published { .. } => {
                    success(&format!("Run {} in {:.2}s", outcome, secs))
                }
                RunOutcome::NoChange => {
                    success(&format!("Run finished in {:.2}s: nothing to publish", secs))
                }
                RunOutcome::Failed { .. } => {
                    failure(&format!("Run {} after {:.2}s", outcome, secs))
                }
            }
        }

        ExecutionEvent::StageStarted { stage } => stage_header(*stage),

        ExecutionEvent::StageCompleted {
            stage,
            status,
            duration,
            message,
        } => {
            let symbol = match status {
                StageStatus::Succeeded => "OK",
                StageStatus::Failed => "FAIL",
                StageStatus::Skipped => "SKIP",
            };
            let detail = message
                .as_deref()
                .map(|m| format!(": {}", m))
                .unwrap_or_default();
            let line = format!(
                "  {} {} ({:.2}s){}",
                stage,
                symbol,
                duration.as_secs_f64(),
                detail
            );
            if *status == StageStatus::Failed {
                dim_failure(&line);
            } else {
                dim_success(&line);
            }
        }

        ExecutionEvent::StageSkipped { stage, reason } => {
            warning(&format!("  {} skipped: {}", stage, reason));
        }

        ExecutionEvent::StepOutput {
            output, is_error, ..
        } => {
            for line in output.lines() {
                if *is_error {
                    step_error(line);
                } else {
                    step_output(line);
                }
            }
        }

        ExecutionEvent::Log { level, message, .. } => match level {
            LogLevel::Error => error(message),
            LogLevel::Warning => warning(message),
            LogLevel::Info => dim(&format!("        {}", message)),
            // Publish state transitions; tracing covers them at debug level
            LogLevel::Debug => {}
        },
    }
}
