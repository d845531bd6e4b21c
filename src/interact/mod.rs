//! User decision points and the interactive field collector.

pub mod terminal;

use async_trait::async_trait;

use crate::error::PromptError;
use crate::message::{CommitMessageDraft, ValidationReport};

pub use terminal::TerminalInteraction;

/// What to do with an AI-generated message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiAcceptanceDecision {
    AcceptAndCommit,
    AcceptAndEdit,
    Reject,
}

/// Where to go after rejecting an AI message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectFollowUp {
    NewAiMessage,
    WriteManually,
}

/// What to do after the commit itself failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitFailureDecision {
    Retry,
    EditMessage,
    Cancel,
}

/// What to do with a message that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationAction {
    Edit,
    ProceedAnyway,
}

/// Every question the commit workflow asks the user.
///
/// A prompt the user backs out of returns [`PromptError::Cancelled`], which
/// the workflow treats like an interrupt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Interaction: Send + Sync {
    /// Show an AI-generated draft and ask what to do with it.
    async fn choose_ai_decision(
        &self,
        draft: &CommitMessageDraft,
    ) -> Result<AiAcceptanceDecision, PromptError>;

    /// Ask whether to regenerate or write the message by hand.
    async fn choose_reject_followup(&self) -> Result<RejectFollowUp, PromptError>;

    /// Show why the commit failed and ask how to continue.
    async fn choose_failure_decision(
        &self,
        error: &str,
    ) -> Result<CommitFailureDecision, PromptError>;

    /// Show validation errors and ask whether to edit or commit anyway.
    async fn choose_validation_action(
        &self,
        report: &ValidationReport,
    ) -> Result<ValidationAction, PromptError>;

    /// Ask whether to create a commit with no staged changes.
    async fn confirm_empty_commit(&self) -> Result<bool, PromptError>;

    /// Preview a hand-written or edited message and ask for confirmation.
    async fn confirm_commit(&self, draft: &CommitMessageDraft) -> Result<bool, PromptError>;

    /// Collect every draft field, pre-filled from `prefill` when given.
    async fn collect_fields(
        &self,
        prefill: Option<CommitMessageDraft>,
        include_signoff: bool,
    ) -> Result<CommitMessageDraft, PromptError>;

    /// Print an informational line.
    fn notify(&self, message: &str);
}
