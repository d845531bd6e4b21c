//! Error types for gitscribe modules using thiserror.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::workflow::acceptance::InvalidTransition;

/// Errors from repository operations (the git gateway).
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Failed to open repository: {0}")]
    OpenRepository(#[source] git2::Error),

    #[error("Bare repositories are not supported")]
    BareRepository,

    #[error("Failed to read the index: {0}")]
    Index(#[source] git2::Error),

    #[error("Failed to compute diff: {0}")]
    Diff(#[source] git2::Error),

    #[error("Failed to read repository status: {0}")]
    Status(#[source] git2::Error),

    #[error("Failed to unstage {count} path(s): {source}")]
    Unstage {
        count: usize,
        #[source]
        source: git2::Error,
    },

    #[error("Failed to create commit: {0}")]
    Commit(#[source] git2::Error),

    #[error("Git config error (missing user.name or user.email): {0}")]
    Config(#[source] git2::Error),

    #[error("Nothing staged to commit")]
    NothingToCommit,

    #[error("Repository task failed to complete: {0}")]
    TaskFailed(String),

    #[error("Interrupted before the index was written")]
    Interrupted,
}

/// Errors from Claude CLI operations.
#[derive(Error, Debug)]
pub enum ClaudeError {
    #[error("Claude Code CLI not found. Install with: npm install -g @anthropic-ai/claude-code")]
    NotInstalled,

    #[error("Claude Code CLI failed to execute: {0}")]
    ExecutionFailed(String),

    #[error("Failed to spawn Claude process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Claude process timed out after {0} seconds")]
    Timeout(u64),

    #[error("Claude CLI exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Claude returned an empty message")]
    EmptyResponse,

    #[error("All retry attempts failed: {0}")]
    RetriesExhausted(#[source] Box<ClaudeError>),
}

/// Errors from Codex CLI operations.
#[derive(Error, Debug)]
pub enum CodexError {
    #[error(
        "Codex CLI not found. Install with: npm install -g @openai/codex (then run `codex` or set CODEX_API_KEY)"
    )]
    NotInstalled,

    #[error("Failed to spawn Codex process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Codex process timed out after {0} seconds")]
    Timeout(u64),

    #[error("Codex CLI exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Codex returned an empty message")]
    EmptyResponse,

    #[error("All retry attempts failed: {0}")]
    RetriesExhausted(#[source] Box<CodexError>),
}

/// Errors from AI message generation.
///
/// Always recoverable from the workflow's point of view: the user falls back
/// to writing the message by hand.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Both AI providers failed. {primary} error: {primary_error}. {fallback} error: {fallback_error}.")]
    AllProvidersFailed {
        primary: String,
        primary_error: String,
        fallback: String,
        fallback_error: String,
    },

    #[error("AI response could not be turned into a commit message: {0}")]
    Unusable(String),
}

/// Errors from interactive prompts.
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Prompt cancelled by user")]
    Cancelled,

    #[error("Terminal prompt failed: {0}")]
    Terminal(String),
}

impl From<dialoguer::Error> for PromptError {
    fn from(err: dialoguer::Error) -> Self {
        match err {
            dialoguer::Error::IO(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                PromptError::Cancelled
            }
            other => PromptError::Terminal(other.to_string()),
        }
    }
}

/// Errors from restoring the staging area.
///
/// Restoration is best effort: these are reported as warnings and never turn
/// an otherwise clean exit into a failure.
#[derive(Error, Debug)]
pub enum RestorationError {
    #[error(
        "Restoration impossible: could not read the current staging area ({0}). Staging area left untouched."
    )]
    Impossible(#[source] GatewayError),

    #[error("Restoration timed out after {}s; the staging area may be inconsistent", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("Restoration was cancelled before the unstage call completed")]
    Cancelled,

    #[error("Failed to unstage paths: {0}")]
    Gateway(#[source] GatewayError),
}

impl RestorationError {
    /// Whether the restoration ran out of time rather than failing outright.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RestorationError::Timeout(_) | RestorationError::Cancelled)
    }
}

/// The workflow step an error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Snapshot,
    AutoStage,
    DescribeRepository,
    AcquireMessage,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Snapshot => "snapshot staging area",
            Phase::AutoStage => "auto-stage changes",
            Phase::DescribeRepository => "read repository state",
            Phase::AcquireMessage => "acquire commit message",
        };
        f.write_str(name)
    }
}

/// Errors that abort the commit workflow.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Failed to {phase}: {source}")]
    Gateway {
        phase: Phase,
        #[source]
        source: GatewayError,
    },

    #[error(
        "Auto-staging was incomplete: {failed} path(s) failed ({first_path}: {first_error}). Refusing to build a message from a partial change set."
    )]
    PartialStaging {
        failed: usize,
        first_path: String,
        first_error: String,
    },

    #[error("Failed to {phase}: {source}")]
    Prompt {
        phase: Phase,
        #[source]
        source: PromptError,
    },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

impl WorkflowError {
    pub fn gateway(phase: Phase) -> impl FnOnce(GatewayError) -> Self {
        move |source| WorkflowError::Gateway { phase, source }
    }

    pub fn prompt(phase: Phase) -> impl FnOnce(PromptError) -> Self {
        move |source| WorkflowError::Prompt { phase, source }
    }

    /// Whether this error stands for the user backing out of a prompt.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            WorkflowError::Prompt {
                source: PromptError::Cancelled,
                ..
            }
        )
    }
}
