//! Provider selection and fallback orchestration.

use std::fmt;
use std::sync::Mutex;

use tracing::{info, warn};

use crate::error::{ClaudeError, CodexError, GenerationError};

use super::retry::retry_with_backoff;
use super::subprocess::CliExecutor;

/// Supported AI providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Provider {
    #[default]
    Claude,
    Codex,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Claude => "Claude",
            Provider::Codex => "Codex",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary + fallback selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSelection {
    pub primary: Provider,
    pub fallback: Provider,
}

impl ProviderSelection {
    pub fn from_primary(primary: Provider) -> Self {
        let fallback = match primary {
            Provider::Claude => Provider::Codex,
            Provider::Codex => Provider::Claude,
        };
        Self { primary, fallback }
    }

    fn swapped(self) -> Self {
        Self {
            primary: self.fallback,
            fallback: self.primary,
        }
    }
}

impl Default for ProviderSelection {
    fn default() -> Self {
        ProviderSelection::from_primary(Provider::Claude)
    }
}

/// Provider-specific error wrapper.
#[derive(Debug)]
pub enum LlmProviderError {
    Claude(ClaudeError),
    Codex(CodexError),
}

impl LlmProviderError {
    /// One-line description suitable for a terminal notice.
    pub fn summary(&self) -> String {
        match self {
            LlmProviderError::Claude(err) => match err {
                ClaudeError::NotInstalled => "Claude CLI not found".to_string(),
                ClaudeError::ExecutionFailed(_) => "Claude CLI reported an error".to_string(),
                ClaudeError::SpawnFailed(_) => "Failed to start Claude CLI".to_string(),
                ClaudeError::Timeout(secs) => format!("Claude timed out after {}s", secs),
                ClaudeError::NonZeroExit { code, .. } => {
                    format!("Claude CLI exited with code {}", code)
                }
                ClaudeError::EmptyResponse => "Claude returned an empty message".to_string(),
                ClaudeError::RetriesExhausted(_) => "Claude failed after retries".to_string(),
            },
            LlmProviderError::Codex(err) => match err {
                CodexError::NotInstalled => "Codex CLI not found".to_string(),
                CodexError::SpawnFailed(_) => "Failed to start Codex CLI".to_string(),
                CodexError::Timeout(secs) => format!("Codex timed out after {}s", secs),
                CodexError::NonZeroExit { code, .. } => {
                    format!("Codex CLI exited with code {}", code)
                }
                CodexError::EmptyResponse => "Codex returned an empty message".to_string(),
                CodexError::RetriesExhausted(_) => "Codex failed after retries".to_string(),
            },
        }
    }
}

impl fmt::Display for LlmProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

impl std::error::Error for LlmProviderError {}

impl From<ClaudeError> for LlmProviderError {
    fn from(err: ClaudeError) -> Self {
        LlmProviderError::Claude(err)
    }
}

impl From<CodexError> for LlmProviderError {
    fn from(err: CodexError) -> Self {
        LlmProviderError::Codex(err)
    }
}

/// Successful completion and the provider that produced it.
#[derive(Debug)]
pub struct Completion {
    pub text: String,
    pub provider: Provider,
    pub primary_error: Option<LlmProviderError>,
}

/// Routes a prompt to the primary provider, then the fallback.
///
/// Sticky: once the fallback answers where the primary failed, it becomes
/// the primary for the rest of the run.
pub struct ProviderRouter<E> {
    executor: E,
    selection: Mutex<ProviderSelection>,
}

impl<E: CliExecutor> ProviderRouter<E> {
    pub fn new(executor: E, selection: ProviderSelection) -> Self {
        Self {
            executor,
            selection: Mutex::new(selection),
        }
    }

    pub fn selection(&self) -> ProviderSelection {
        *self.selection.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn complete(&self, prompt: &str) -> Result<Completion, GenerationError> {
        let ProviderSelection { primary, fallback } = self.selection();

        let primary_error = match self.run(primary, prompt).await {
            Ok(text) => {
                return Ok(Completion {
                    text,
                    provider: primary,
                    primary_error: None,
                });
            }
            Err(e) => e,
        };
        warn!("{primary} failed ({primary_error}), falling back to {fallback}");

        match self.run(fallback, prompt).await {
            Ok(text) => {
                info!("{fallback} will be used for the rest of this run");
                let mut selection = self.selection.lock().unwrap_or_else(|e| e.into_inner());
                *selection = selection.swapped();
                Ok(Completion {
                    text,
                    provider: fallback,
                    primary_error: Some(primary_error),
                })
            }
            Err(fallback_error) => Err(GenerationError::AllProvidersFailed {
                primary: primary.to_string(),
                primary_error: primary_error.summary(),
                fallback: fallback.to_string(),
                fallback_error: fallback_error.summary(),
            }),
        }
    }

    async fn run(&self, provider: Provider, prompt: &str) -> Result<String, LlmProviderError> {
        match provider {
            Provider::Claude => retry_with_backoff(
                || self.executor.run_claude(prompt),
                |e| !matches!(e, ClaudeError::NotInstalled),
                |e| ClaudeError::RetriesExhausted(Box::new(e)),
            )
            .await
            .map_err(LlmProviderError::from),
            Provider::Codex => retry_with_backoff(
                || self.executor.run_codex(prompt),
                |e| !matches!(e, CodexError::NotInstalled),
                |e| CodexError::RetriesExhausted(Box::new(e)),
            )
            .await
            .map_err(LlmProviderError::from),
        }
    }
}
