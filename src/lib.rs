//! gitscribe - A CLI tool that writes conventional commit messages with AI.
//!
//! # Overview
//!
//! gitscribe snapshots the staging area, auto-stages worktree changes, asks
//! Claude Code CLI (or Codex CLI) for a Conventional Commits message, lets the
//! user accept, edit or reject it, and commits. Any run that ends without a
//! commit, including one interrupted with Ctrl-C, puts the staging area back
//! the way it was.

pub mod config;
pub mod error;
pub mod git;
pub mod interact;
pub mod llm;
pub mod message;
pub mod staging;
pub mod workflow;

// Re-export commonly used types
pub use error::{
    ClaudeError, CodexError, GatewayError, GenerationError, Phase, PromptError, RestorationError,
    WorkflowError,
};
pub use git::{Git2Gateway, RepositoryGateway, RepositoryState, StageScope};
pub use message::{CommitMessageDraft, ConventionalValidator, MessageValidator};
pub use staging::{RestorationPlan, StagingSnapshot, StagingStateManager};
pub use workflow::{ExitOutcome, Orchestrator, RestorationStatus, RunOptions, RunReport};
