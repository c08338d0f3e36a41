use crate::artifacts::ArtifactPattern;
use crate::job::models::JobDefinition;
use crate::schedule::CronTrigger;
use crate::{ServiceError, ServiceResult};

use std::fs;
use std::path::Path;

/// Longest generator timeout accepted: one day
pub const MAX_TIMEOUT_MINUTES: u64 = 24 * 60;

/// Parser for `chartpub.yml` job files.
pub struct JobParser;

impl JobParser {
    /// Parse and validate a job from a file path.
    ///
    /// A relative `workspace` is resolved against the directory holding the
    /// job file, so a job can be started from any current directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ServiceResult<JobDefinition> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut job = Self::parse_and_validate(&content)?;

        if job.workspace.is_relative() {
            let base = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            job.workspace = base.join(&job.workspace);
        }

        Ok(job)
    }

    /// Parse a job from a YAML string.
    pub fn parse(content: &str) -> ServiceResult<JobDefinition> {
        let job: JobDefinition = serde_yaml::from_str(content)?;
        Ok(job)
    }

    /// Parse and validate a job from a YAML string.
    pub fn parse_and_validate(content: &str) -> ServiceResult<JobDefinition> {
        let job = Self::parse(content)?;
        Self::validate(&job)?;
        Ok(job)
    }

    /// Validate a parsed job for semantic correctness.
    pub fn validate(job: &JobDefinition) -> ServiceResult<()> {
        if job.name.trim().is_empty() {
            return Err(invalid("Job name must not be empty"));
        }

        if job.schedule.is_empty() && !job.manual {
            return Err(invalid(format!(
                "Job '{}' has no cron triggers and manual runs are disabled",
                job.name
            )));
        }

        for entry in &job.schedule {
            CronTrigger::parse(&entry.cron)?;
        }

        if job.generate.run.trim().is_empty() {
            return Err(invalid("generate.run must not be empty"));
        }

        if let Some(minutes) = job.generate.timeout_minutes {
            if minutes == 0 || minutes > MAX_TIMEOUT_MINUTES {
                return Err(invalid(format!(
                    "generate.timeout_minutes must be between 1 and {}",
                    MAX_TIMEOUT_MINUTES
                )));
            }
        }

        if let Some(provision) = &job.provision {
            if provision.runtime.program.trim().is_empty() {
                return Err(invalid("provision.runtime.program must not be empty"));
            }
            if provision.runtime.version.trim().is_empty() {
                return Err(invalid("provision.runtime.version must not be empty"));
            }
            if !provision.packages.is_empty() && provision.install.trim().is_empty() {
                return Err(invalid("provision.install is required when packages are listed"));
            }
            for package in &provision.packages {
                if !is_valid_package_name(package) {
                    return Err(invalid(format!(
                        "Package '{}' is not a plain library name",
                        package
                    )));
                }
            }
        }

        Self::validate_publish(job)
    }

    fn validate_publish(job: &JobDefinition) -> ServiceResult<()> {
        let publish = &job.publish;

        for (field, value) in [("publish.remote", &publish.remote), ("publish.branch", &publish.branch)] {
            if value.is_empty() || value.starts_with('-') || value.contains(char::is_whitespace) {
                return Err(invalid(format!("{} '{}' is not a valid git name", field, value)));
            }
        }

        ArtifactPattern::new(&publish.artifacts)?;

        if !publish.message.contains("{date}") && !publish.message.contains("{datetime}") {
            return Err(invalid(
                "publish.message must contain {date} or {datetime}",
            ));
        }

        if publish.author.name.trim().is_empty() || publish.author.email.trim().is_empty() {
            return Err(invalid("publish.author needs both name and email"));
        }

        if publish.push_attempts == 0 {
            return Err(invalid("publish.push_attempts must be at least 1"));
        }

        Ok(())
    }
}

/// Library names are resolved by name only: no versions, URLs or shell syntax.
pub fn is_valid_package_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '[' | ']'))
}

fn invalid(message: impl Into<String>) -> ServiceError {
    ServiceError::InvalidInput(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHART_JOB: &str = r#"
name: 0050 charts
schedule:
  - cron: "0 7 * * *"
  - cron: "0 10 * * *"
provision:
  runtime:
    program: python3
    version: "3.11"
  packages: [yfinance, pandas, plotly]
generate:
  run: python3 scripts/make_charts.py
publish:
  branch: gh-pages
  artifacts: "0050_*.html"
  token_env: GITHUB_TOKEN
"#;

    #[test]
    fn test_parse_chart_job() {
        let job = JobParser::parse_and_validate(CHART_JOB).unwrap();

        assert_eq!(job.name, "0050 charts");
        assert_eq!(job.cron_expressions(), vec!["0 7 * * *", "0 10 * * *"]);
        assert!(job.manual);
        assert_eq!(job.publish.remote, "origin");
        assert_eq!(job.publish.branch, "gh-pages");
        assert_eq!(job.publish.push_attempts, 1);
        assert_eq!(job.publish.author.name, "github-actions[bot]");
        assert_eq!(job.publish.token_env.as_deref(), Some("GITHUB_TOKEN"));

        let provision = job.provision.unwrap();
        assert_eq!(provision.runtime.version, "3.11");
        assert_eq!(provision.packages, vec!["yfinance", "pandas", "plotly"]);
        assert_eq!(provision.install, "python3 -m pip install --quiet");
        assert!(!job.generate.require_artifacts);
        assert!(job.generate.timeout_minutes.is_none());
    }

    #[test]
    fn test_missing_generate_is_yaml_error() {
        let yaml = r#"
name: broken
publish:
  artifacts: "x_*.html"
"#;
        let err = JobParser::parse(yaml).unwrap_err();
        assert!(matches!(err, ServiceError::Yaml(_)));
    }

    #[test]
    fn test_rejects_untriggerable_job() {
        let yaml = r#"
name: never
manual: false
generate:
  run: "true"
publish:
  artifacts: "x_*.html"
"#;
        let err = JobParser::parse_and_validate(yaml).unwrap_err();
        assert!(err.to_string().contains("no cron triggers"));
    }

    #[test]
    fn test_rejects_bad_cron() {
        let yaml = r#"
name: bad cron
schedule:
  - cron: "not a cron"
generate:
  run: "true"
publish:
  artifacts: "x_*.html"
"#;
        let err = JobParser::parse_and_validate(yaml).unwrap_err();
        assert!(matches!(err, ServiceError::Schedule { .. }));
    }

    #[test]
    fn test_timeout_bounds() {
        let job = |minutes: &str| {
            format!(
                "name: timed\ngenerate:\n  run: \"true\"\n  timeout_minutes: {}\npublish:\n  artifacts: \"x_*.html\"\n",
                minutes
            )
        };

        let parsed = JobParser::parse_and_validate(&job("30")).unwrap();
        assert_eq!(parsed.generate.timeout_minutes, Some(30));
        assert!(JobParser::parse_and_validate(&job("1440")).is_ok());

        for bad in ["0", "1441", "18446744073709551615"] {
            let err = JobParser::parse_and_validate(&job(bad)).unwrap_err();
            assert!(
                err.to_string().contains("timeout_minutes"),
                "{}: {}",
                bad,
                err
            );
        }
    }

    #[test]
    fn test_rejects_undated_message() {
        let yaml = r#"
name: undated
generate:
  run: "true"
publish:
  artifacts: "x_*.html"
  message: "Update charts"
"#;
        let err = JobParser::parse_and_validate(yaml).unwrap_err();
        assert!(err.to_string().contains("{date}"));
    }

    #[test]
    fn test_rejects_escaping_artifact_pattern() {
        let yaml = r#"
name: escape
generate:
  run: "true"
publish:
  artifacts: "../x_*.html"
"#;
        assert!(JobParser::parse_and_validate(yaml).is_err());
    }

    #[test]
    fn test_rejects_option_like_branch() {
        let yaml = r#"
name: option branch
generate:
  run: "true"
publish:
  branch: "--force"
  artifacts: "x_*.html"
"#;
        assert!(JobParser::parse_and_validate(yaml).is_err());
    }

    #[test]
    fn test_package_names() {
        assert!(is_valid_package_name("yfinance"));
        assert!(is_valid_package_name("plotly"));
        assert!(is_valid_package_name("requests[socks]"));
        assert!(is_valid_package_name("ruamel.yaml"));
        assert!(!is_valid_package_name("pandas==2.0"));
        assert!(!is_valid_package_name("pandas; rm -rf /"));
        assert!(!is_valid_package_name("--upgrade"));
        assert!(!is_valid_package_name(""));
    }

    #[test]
    fn test_from_file_resolves_workspace() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("chartpub.yml");
        fs::write(&path, CHART_JOB.to_string() + "workspace: site\n").unwrap();

        let job = JobParser::from_file(&path).unwrap();
        assert_eq!(job.workspace, temp.path().join("site"));
    }
}
