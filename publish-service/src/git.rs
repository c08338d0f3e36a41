// Git Plumbing
// Checkout, staging, commit and compare-and-swap push against the publishing branch

use crate::job::CommitIdentity;
use crate::{ServiceError, ServiceResult};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Raw result of one git invocation
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }

    /// Last meaningful line of stderr (or stdout), for error messages
    fn summary(&self) -> String {
        self.stderr
            .lines()
            .chain(self.stdout.lines())
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .map(String::from)
            .unwrap_or_else(|| match self.exit_code {
                Some(code) => format!("exit status {}", code),
                None => "terminated by signal".to_string(),
            })
    }
}

/// Result of a commit attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult {
    Created(String),
    /// The index matched the branch tip
    NothingToCommit,
}

/// A working copy bound to one remote publishing branch
pub struct GitRepo {
    workdir: PathBuf,
    remote: String,
    branch: String,
    identity: CommitIdentity,
    auth_header: Option<String>,
}

impl fmt::Debug for GitRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitRepo")
            .field("workdir", &self.workdir)
            .field("remote", &self.remote)
            .field("branch", &self.branch)
            .field("identity", &self.identity)
            .field("auth", &self.auth_header.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl GitRepo {
    pub fn new(
        workdir: impl Into<PathBuf>,
        remote: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            workdir: workdir.into(),
            remote: remote.into(),
            branch: branch.into(),
            identity: CommitIdentity::default(),
            auth_header: None,
        }
    }

    pub fn with_identity(mut self, identity: CommitIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Authenticate fetches and pushes with a short-lived repository token.
    ///
    /// The token only ever travels as a `-c http.extraheader` argument.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.auth_header = token.filter(|t| !t.is_empty()).map(|token| {
            let basic = BASE64.encode(format!("x-access-token:{}", token));
            format!("http.extraheader=AUTHORIZATION: basic {}", basic)
        });
        self
    }

    /// Remote-tracking ref of the publishing branch
    pub fn tracking_ref(&self) -> String {
        format!("refs/remotes/{}/{}", self.remote, self.branch)
    }

    async fn run(&self, config: &[String], args: &[&str]) -> ServiceResult<GitOutput> {
        let command = args.first().copied().unwrap_or("git");
        tracing::debug!(command, workdir = %self.workdir.display(), "git");

        let mut cmd = Command::new("git");
        for pair in config {
            cmd.arg("-c").arg(pair);
        }
        let output = cmd
            .args(args)
            .current_dir(&self.workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            // Artifact names are file names, never pathspec magic
            .env("GIT_LITERAL_PATHSPECS", "1")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ServiceError::git(command, e.to_string()))?;

        Ok(GitOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn run_ok(&self, args: &[&str]) -> ServiceResult<String> {
        let output = self.run(&[], args).await?;
        if !output.success {
            let command = args.first().copied().unwrap_or("git");
            return Err(ServiceError::git(command, output.summary()));
        }
        Ok(output.stdout.trim().to_string())
    }

    /// `-c` pairs for commands that talk to the remote
    fn remote_config(&self) -> Vec<String> {
        self.auth_header.iter().cloned().collect()
    }

    fn identity_config(&self) -> Vec<String> {
        vec![
            format!("user.name={}", self.identity.name),
            format!("user.email={}", self.identity.email),
            "commit.gpgsign=false".to_string(),
        ]
    }

    /// Fetch the publishing branch into its remote-tracking ref.
    ///
    /// Fails when the branch does not exist on the remote; it is never created.
    pub async fn fetch(&self) -> ServiceResult<()> {
        let refspec = format!("+refs/heads/{}:{}", self.branch, self.tracking_ref());
        let output = self
            .run(
                &self.remote_config(),
                &["fetch", "--quiet", "--no-tags", &self.remote, &refspec],
            )
            .await?;
        if !output.success {
            return Err(ServiceError::git("fetch", output.summary()));
        }
        Ok(())
    }

    /// Reset the local branch, index and tracked files to the remote tip.
    ///
    /// Commits left over from an unpublished run stay reachable via the reflog.
    pub async fn checkout_remote_tip(&self) -> ServiceResult<String> {
        self.fetch().await?;
        let tracking = self.tracking_ref();
        self.run_ok(&["checkout", "--quiet", "--force", "-B", &self.branch, &tracking])
            .await?;
        self.head().await
    }

    pub async fn head(&self) -> ServiceResult<String> {
        self.rev_parse("HEAD").await
    }

    pub async fn rev_parse(&self, rev: &str) -> ServiceResult<String> {
        self.run_ok(&["rev-parse", "--verify", "--quiet", rev]).await
    }

    /// Stage exactly the given workspace-relative paths
    pub async fn stage(&self, paths: &[String]) -> ServiceResult<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run_ok(&args).await?;
        Ok(())
    }

    /// Paths among `paths` whose staged content differs from HEAD.
    ///
    /// Names come back relative to the working directory, like `paths`,
    /// even when it is a subdirectory of the checkout.
    pub async fn staged_changes(&self, paths: &[String]) -> ServiceResult<Vec<String>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = vec!["diff", "--cached", "--name-only", "--relative", "-z", "--"];
        args.extend(paths.iter().map(String::as_str));

        let output = self.run(&[], &args).await?;
        if !output.success {
            return Err(ServiceError::git("diff", output.summary()));
        }
        Ok(output
            .stdout
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect())
    }

    /// Commit only `paths`, ignoring anything else that might be staged
    pub async fn commit(&self, message: &str, paths: &[String]) -> ServiceResult<CommitResult> {
        let mut args = vec!["commit", "--quiet", "-m", message, "--"];
        args.extend(paths.iter().map(String::as_str));

        let output = self.run(&self.identity_config(), &args).await?;
        if output.success {
            return Ok(CommitResult::Created(self.head().await?));
        }

        let combined = output.combined();
        if combined.contains("nothing to commit") || combined.contains("no changes added to commit")
        {
            return Ok(CommitResult::NothingToCommit);
        }
        Err(ServiceError::git("commit", output.summary()))
    }

    /// Push HEAD to the publishing branch only if the remote tip is still `expected_tip`
    pub async fn push(&self, expected_tip: &str) -> ServiceResult<()> {
        let lease = format!("--force-with-lease=refs/heads/{}:{}", self.branch, expected_tip);
        let destination = format!("HEAD:refs/heads/{}", self.branch);
        let output = self
            .run(
                &self.remote_config(),
                &["push", "--porcelain", &lease, &self.remote, &destination],
            )
            .await?;

        if output.success {
            return Ok(());
        }
        if is_rejection(&output.combined()) {
            return Err(ServiceError::PushRejected(output.summary()));
        }
        Err(ServiceError::PushFailed(output.summary()))
    }

    /// Replay local commits on top of the freshly fetched remote tip.
    ///
    /// Returns the remote tip the rebase landed on. On conflict the rebase
    /// is aborted and the local branch is left as it was.
    pub async fn rebase_onto_remote(&self) -> ServiceResult<String> {
        self.fetch().await?;
        let tracking = self.tracking_ref();

        let output = self
            .run(&self.identity_config(), &["rebase", "--quiet", &tracking])
            .await?;
        if !output.success {
            let _ = self.run(&[], &["rebase", "--abort"]).await;
            return Err(ServiceError::RebaseConflict(output.summary()));
        }

        self.rev_parse(&tracking).await
    }
}

/// Whether a failed push lost a race rather than hitting auth or network trouble
fn is_rejection(output: &str) -> bool {
    output.lines().any(|line| {
        (line.contains("[rejected]") && !line.contains("[remote rejected]"))
            || line.contains("stale info")
            || line.contains("non-fast-forward")
            || line.contains("fetch first")
    })
}
