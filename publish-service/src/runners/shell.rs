// Shell Runner
// Executes provisioning and generator commands through the system shell

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// System shell executable and the flag that makes it run a script string
fn shell_command() -> (&'static str, &'static str) {
    if cfg!(target_os = "windows") {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    }
}

/// Configuration for shell execution
#[derive(Debug, Clone, Default)]
pub struct ShellConfig {
    /// Kill the process after this long (None = no timeout)
    pub timeout: Option<Duration>,
}

impl ShellConfig {
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

/// Output collected during script execution
#[derive(Debug, Clone, Default)]
pub struct ShellOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Exit code (None when killed, timed out or never spawned)
    pub exit_code: Option<i32>,
    /// The process was killed by the timeout
    pub timed_out: bool,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Human readable reason for a failed command, None on success
    pub fn failure_reason(&self) -> Option<String> {
        if self.success() {
            return None;
        }
        let detail = last_line(&self.stderr).or_else(|| last_line(&self.stdout));
        let status = if self.timed_out {
            "timed out".to_string()
        } else {
            match self.exit_code {
                Some(code) => format!("exited with status {}", code),
                None => "was terminated".to_string(),
            }
        };
        Some(match detail {
            Some(detail) => format!("{}: {}", status, detail),
            None => status,
        })
    }
}

/// Callback for handling output lines in real-time
pub type OutputCallback = Box<dyn Fn(&str, bool) + Send + Sync>;

/// Shell runner for executing scripts
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }

    /// Execute a script and collect its output
    pub async fn run_script(
        &self,
        script: &str,
        env: &HashMap<String, String>,
        working_dir: &Path,
        config: &ShellConfig,
    ) -> ShellOutput {
        self.run_with_shell(script, env, working_dir, config, None)
            .await
    }

    /// Execute a script with real-time output streaming
    pub async fn run_script_streaming(
        &self,
        script: &str,
        env: &HashMap<String, String>,
        working_dir: &Path,
        config: &ShellConfig,
        on_output: OutputCallback,
    ) -> ShellOutput {
        self.run_with_shell(
            script,
            env,
            working_dir,
            config,
            Some(on_output),
        )
        .await
    }

    async fn run_with_shell(
        &self,
        script: &str,
        env: &HashMap<String, String>,
        working_dir: &Path,
        config: &ShellConfig,
        on_output: Option<OutputCallback>,
    ) -> ShellOutput {
        let (shell_cmd, shell_flag) = shell_command();

        let mut cmd = Command::new(shell_cmd);
        cmd.arg(shell_flag);
        cmd.arg(script);
        cmd.current_dir(working_dir);
        cmd.envs(env);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ShellOutput {
                    stderr: format!("Failed to spawn shell process '{}': {}", shell_cmd, e),
                    ..ShellOutput::default()
                };
            }
        };

        let on_output = on_output.map(Arc::new);
        let stdout_handle = child
            .stdout
            .take()
            .map(|out| collect_lines(out, on_output.clone(), false));
        let stderr_handle = child
            .stderr
            .take()
            .map(|err| collect_lines(err, on_output, true));

        // Wait for completion with optional timeout
        let (wait_result, timed_out) = match config.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait()).await {
                Ok(result) => (result, false),
                Err(_) => {
                    let _ = child.kill().await;
                    (child.wait().await, true)
                }
            },
            None => (child.wait().await, false),
        };

        let exit_code = if timed_out {
            None
        } else {
            wait_result.ok().and_then(|s| s.code())
        };

        let stdout = join_lines(stdout_handle).await;
        let mut stderr = join_lines(stderr_handle).await;
        if timed_out {
            if !stderr.is_empty() {
                stderr.push('\n');
            }
            stderr.push_str(&format!(
                "Process timed out after {:?}",
                config.timeout.unwrap_or_default()
            ));
        }

        ShellOutput {
            stdout,
            stderr,
            exit_code,
            timed_out,
        }
    }
}

fn collect_lines<R>(
    reader: R,
    on_output: Option<Arc<OutputCallback>>,
    is_error: bool,
) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        let mut output = String::new();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(callback) = &on_output {
                callback(&line, is_error);
            }
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(&line);
        }
        output
    })
}

async fn join_lines(handle: Option<JoinHandle<String>>) -> String {
    match handle {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

fn last_line(text: &str) -> Option<String> {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(String::from)
}
