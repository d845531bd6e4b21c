//! Claude and Codex CLI spawning.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::config::{
    CLAUDE_TIMEOUT_ENV_VAR, CODEX_TIMEOUT_ENV_VAR, DEFAULT_CLAUDE_TIMEOUT_SECS,
    DEFAULT_CODEX_TIMEOUT_SECS, timeout_from_env,
};
use crate::error::{ClaudeError, CodexError};

/// Runs the provider CLIs. Mocked in tests so no subprocess is spawned.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CliExecutor: Send + Sync {
    /// Run Claude and return the text of its reply.
    async fn run_claude(&self, prompt: &str) -> Result<String, ClaudeError>;

    /// Run Codex and return the text of its reply.
    async fn run_codex(&self, prompt: &str) -> Result<String, CodexError>;
}

/// Executor that spawns the real CLIs with per-provider timeouts.
#[derive(Debug, Clone, Copy)]
pub struct CliRunner {
    claude_timeout: Duration,
    codex_timeout: Duration,
}

impl CliRunner {
    pub fn new(claude_timeout: Duration, codex_timeout: Duration) -> Self {
        Self {
            claude_timeout,
            codex_timeout,
        }
    }

    /// Timeouts from `GITSCRIBE_CLAUDE_TIMEOUT` / `GITSCRIBE_CODEX_TIMEOUT`,
    /// 300 seconds each by default.
    pub fn from_env() -> Self {
        Self::new(
            timeout_from_env(CLAUDE_TIMEOUT_ENV_VAR, DEFAULT_CLAUDE_TIMEOUT_SECS),
            timeout_from_env(CODEX_TIMEOUT_ENV_VAR, DEFAULT_CODEX_TIMEOUT_SECS),
        )
    }
}

#[async_trait]
impl CliExecutor for CliRunner {
    async fn run_claude(&self, prompt: &str) -> Result<String, ClaudeError> {
        run_claude(prompt, self.claude_timeout).await
    }

    async fn run_codex(&self, prompt: &str) -> Result<String, CodexError> {
        run_codex(prompt, self.codex_timeout).await
    }
}

/// Claude CLI JSON envelope when using --output-format json
#[derive(serde::Deserialize)]
struct ClaudeCliResponse {
    result: String,
    #[serde(default)]
    is_error: bool,
}

/// Run `claude -p <prompt> --output-format json` and unwrap the envelope.
///
/// The child is killed if the returned future is dropped, so an interrupted
/// workflow does not leave a provider process running.
pub async fn run_claude(prompt: &str, timeout_duration: Duration) -> Result<String, ClaudeError> {
    if which::which("claude").is_err() {
        return Err(ClaudeError::NotInstalled);
    }

    let timeout_secs = timeout_duration.as_secs();
    debug!("Running claude (timeout {timeout_secs}s)");

    let output = timeout(
        timeout_duration,
        Command::new("claude")
            .arg("-p")
            .arg(prompt)
            .arg("--output-format")
            .arg("json")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| ClaudeError::Timeout(timeout_secs))?
    .map_err(ClaudeError::SpawnFailed)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let code = output.status.code().unwrap_or(-1);
        return Err(ClaudeError::NonZeroExit { code, stderr });
    }

    parse_claude_output(&String::from_utf8_lossy(&output.stdout))
}

/// Extract the reply text from Claude's stdout.
///
/// Falls back to the raw output when it is not a JSON envelope.
fn parse_claude_output(stdout: &str) -> Result<String, ClaudeError> {
    let text = match serde_json::from_str::<ClaudeCliResponse>(stdout) {
        Ok(envelope) if envelope.is_error => {
            return Err(ClaudeError::ExecutionFailed(envelope.result));
        }
        Ok(envelope) => envelope.result,
        Err(_) => stdout.to_string(),
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(ClaudeError::EmptyResponse);
    }
    Ok(text.to_string())
}

/// Run `codex exec <prompt>` and return its stdout.
pub async fn run_codex(prompt: &str, timeout_duration: Duration) -> Result<String, CodexError> {
    if which::which("codex").is_err() {
        return Err(CodexError::NotInstalled);
    }

    let timeout_secs = timeout_duration.as_secs();
    debug!("Running codex (timeout {timeout_secs}s)");

    let output = timeout(
        timeout_duration,
        Command::new("codex")
            .arg("exec")
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| CodexError::Timeout(timeout_secs))?
    .map_err(CodexError::SpawnFailed)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let code = output.status.code().unwrap_or(-1);
        return Err(CodexError::NonZeroExit { code, stderr });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = stdout.trim();
    if text.is_empty() {
        return Err(CodexError::EmptyResponse);
    }
    Ok(text.to_string())
}
