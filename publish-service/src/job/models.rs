use serde::{Deserialize, Serialize};

use std::collections::HashMap;
use std::path::PathBuf;

/// A scheduled regenerate-and-publish job.
///
/// This represents the top-level structure of a `chartpub.yml` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Display name used in logs, reports and the `{job}` message placeholder
    pub name: String,

    /// Cron triggers, evaluated in UTC
    #[serde(default)]
    pub schedule: Vec<CronEntry>,

    /// Whether the job may be started by hand
    #[serde(default = "default_true")]
    pub manual: bool,

    /// Repository checkout to work in, relative to the job file
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// Environment variables passed to every command the job runs
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Toolchain to set up before the generator runs
    #[serde(default)]
    pub provision: Option<ProvisionConfig>,

    /// The external artifact generator
    pub generate: GenerateConfig,

    /// Where and how artifacts are committed
    pub publish: PublishConfig,
}

/// A single `- cron: "..."` schedule entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CronEntry {
    pub cron: String,
}

/// Runtime and library requirements for the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Required runtime (e.g. python3 at 3.11)
    pub runtime: RuntimeRequirement,

    /// Command prefix the package names are appended to
    #[serde(default = "default_install")]
    pub install: String,

    /// Libraries resolved by name only
    #[serde(default)]
    pub packages: Vec<String>,

    /// Extra shell commands run after installation
    #[serde(default)]
    pub setup: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeRequirement {
    /// Executable looked up on PATH
    pub program: String,

    /// Version prefix reported by `<program> --version`
    pub version: String,
}

/// The generator step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateConfig {
    /// Shell command that regenerates the artifacts
    pub run: String,

    /// Kill the generator after this many minutes (no limit when unset)
    #[serde(default)]
    pub timeout_minutes: Option<u64>,

    /// Treat an empty artifact set as a failure
    #[serde(default)]
    pub require_artifacts: bool,
}

/// Publishing branch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Pre-existing branch that serves the static site
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Glob selecting the artifact files, e.g. `0050_*.html`
    pub artifacts: String,

    /// Commit message template
    #[serde(default = "default_message")]
    pub message: String,

    #[serde(default)]
    pub author: CommitIdentity,

    /// Environment variable holding a push token
    #[serde(default)]
    pub token_env: Option<String>,

    /// Total push attempts; anything above 1 enables rebase-and-retry
    #[serde(default = "default_push_attempts")]
    pub push_attempts: u32,
}

/// Fixed service identity used as commit author and committer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl Default for CommitIdentity {
    fn default() -> Self {
        Self {
            name: "github-actions[bot]".to_string(),
            email: "41898282+github-actions[bot]@users.noreply.github.com".to_string(),
        }
    }
}

impl JobDefinition {
    /// All cron expressions in declaration order
    pub fn cron_expressions(&self) -> Vec<&str> {
        self.schedule.iter().map(|e| e.cron.as_str()).collect()
    }
}

fn default_true() -> bool {
    true
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}

fn default_install() -> String {
    "python3 -m pip install --quiet".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "gh-pages".to_string()
}

fn default_message() -> String {
    "Update charts {date}".to_string()
}

fn default_push_attempts() -> u32 {
    1
}
