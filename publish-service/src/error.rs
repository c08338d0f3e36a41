// Service Error Types
// Shared error type for job parsing, scheduling, and run stages

use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid cron expression '{expression}': {reason}")]
    Schedule { expression: String, reason: String },

    #[error("Provisioning failed: {0}")]
    Provision(String),

    #[error("Generator failed: {0}")]
    Generate(String),

    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    /// The remote branch moved since checkout (compare-and-swap lost)
    #[error("Push rejected: {0}")]
    PushRejected(String),

    #[error("Push failed: {0}")]
    PushFailed(String),

    #[error("Rebase onto remote tip failed: {0}")]
    RebaseConflict(String),
}

impl ServiceError {
    pub fn git(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Git {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Whether a later run (or a retry after rebase) could succeed unchanged
    pub fn is_push_rejection(&self) -> bool {
        matches!(self, ServiceError::PushRejected(_))
    }
}
