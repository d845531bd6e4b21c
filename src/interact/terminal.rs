//! [`Interaction`] on a terminal via dialoguer.

use async_trait::async_trait;
use dialoguer::{Confirm, Input, Select};

use crate::error::PromptError;
use crate::message::validate::COMMIT_TYPES;
use crate::message::{CommitMessageDraft, ValidationReport};

use super::{
    AiAcceptanceDecision, CommitFailureDecision, Interaction, RejectFollowUp, ValidationAction,
};

/// Prompts on the controlling terminal.
///
/// dialoguer blocks on stdin, so each prompt runs on the blocking pool. The
/// workflow races the returned future against its cancellation token; a
/// prompt abandoned that way is left to die with the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalInteraction;

impl TerminalInteraction {
    pub fn new() -> Self {
        Self
    }
}

async fn blocking<T, F>(prompt: F) -> Result<T, PromptError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PromptError> + Send + 'static,
{
    tokio::task::spawn_blocking(prompt)
        .await
        .map_err(|e| PromptError::Terminal(e.to_string()))?
}

/// Show a menu; Esc or `q` counts as cancelling.
fn select(prompt: &str, items: &[&str], default: usize) -> Result<usize, PromptError> {
    Select::new()
        .with_prompt(prompt)
        .items(items)
        .default(default)
        .interact_opt()?
        .ok_or(PromptError::Cancelled)
}

fn text_field(prompt: &str, initial: &str, allow_empty: bool) -> Result<String, PromptError> {
    let value: String = Input::new()
        .with_prompt(prompt)
        .with_initial_text(initial)
        .allow_empty(allow_empty)
        .interact_text()?;
    Ok(value.trim().to_string())
}

fn preview(draft: &CommitMessageDraft) {
    println!();
    println!("Commit message:");
    println!("────────────────────────────────────────");
    println!("{}", draft.render(None));
    println!("────────────────────────────────────────");
}

/// Body and footer are typed on one line; a literal `\n` starts a new one.
fn decode_multiline(value: &str) -> String {
    value
        .split("\\n")
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

fn encode_multiline(value: &str) -> String {
    value.lines().collect::<Vec<_>>().join("\\n")
}

/// Menu entries for the type prompt and the entry selected by default.
///
/// A pre-filled type outside the known list is offered as the last entry and
/// pre-selected, so editing never swaps it out behind the user's back.
fn type_choices(prefilled: &str) -> (Vec<&str>, usize) {
    let mut items = COMMIT_TYPES.to_vec();
    if prefilled.is_empty() {
        return (items, 0);
    }
    let index = match items.iter().position(|t| *t == prefilled) {
        Some(index) => index,
        None => {
            items.push(prefilled);
            items.len() - 1
        }
    };
    (items, index)
}

fn collect(
    prefill: Option<CommitMessageDraft>,
    include_signoff: bool,
) -> Result<CommitMessageDraft, PromptError> {
    let prefill = prefill.unwrap_or_else(|| CommitMessageDraft::blank(include_signoff));

    let (types, type_index) = type_choices(&prefill.commit_type);
    let commit_type = types[select("Type", &types, type_index)?].to_string();

    let scope = text_field("Scope (optional)", &prefill.scope, true)?;
    let subject = text_field("Subject", &prefill.subject, false)?;
    let breaking = Confirm::new()
        .with_prompt("Breaking change?")
        .default(prefill.breaking)
        .interact()?;
    let body = text_field(
        "Body (optional, \\n for new lines)",
        &encode_multiline(&prefill.body),
        true,
    )?;
    let footer = text_field(
        "Footer (optional, e.g. Refs: #42)",
        &encode_multiline(&prefill.footer),
        true,
    )?;

    Ok(CommitMessageDraft {
        commit_type,
        scope,
        subject,
        body: decode_multiline(&body),
        footer: decode_multiline(&footer),
        breaking,
        include_signoff,
    })
}

#[async_trait]
impl Interaction for TerminalInteraction {
    async fn choose_ai_decision(
        &self,
        draft: &CommitMessageDraft,
    ) -> Result<AiAcceptanceDecision, PromptError> {
        let draft = draft.clone();
        blocking(move || {
            preview(&draft);
            let choice = select(
                "Use this message?",
                &["Accept and commit", "Accept and edit", "Reject"],
                0,
            )?;
            Ok(match choice {
                0 => AiAcceptanceDecision::AcceptAndCommit,
                1 => AiAcceptanceDecision::AcceptAndEdit,
                _ => AiAcceptanceDecision::Reject,
            })
        })
        .await
    }

    async fn choose_reject_followup(&self) -> Result<RejectFollowUp, PromptError> {
        blocking(|| {
            let choice = select(
                "What next?",
                &["Generate a new message", "Write the message manually"],
                0,
            )?;
            Ok(match choice {
                0 => RejectFollowUp::NewAiMessage,
                _ => RejectFollowUp::WriteManually,
            })
        })
        .await
    }

    async fn choose_failure_decision(
        &self,
        error: &str,
    ) -> Result<CommitFailureDecision, PromptError> {
        let error = error.to_string();
        blocking(move || {
            eprintln!("Commit failed: {error}");
            let choice = select(
                "How do you want to continue?",
                &["Retry", "Edit message", "Cancel"],
                0,
            )?;
            Ok(match choice {
                0 => CommitFailureDecision::Retry,
                1 => CommitFailureDecision::EditMessage,
                _ => CommitFailureDecision::Cancel,
            })
        })
        .await
    }

    async fn choose_validation_action(
        &self,
        report: &ValidationReport,
    ) -> Result<ValidationAction, PromptError> {
        let report = report.clone();
        blocking(move || {
            eprintln!("The commit message has problems:");
            for error in &report.errors {
                eprintln!("  - {error}");
            }
            let choice = select(
                "What do you want to do?",
                &["Edit the message", "Commit anyway"],
                0,
            )?;
            Ok(match choice {
                0 => ValidationAction::Edit,
                _ => ValidationAction::ProceedAnyway,
            })
        })
        .await
    }

    async fn confirm_empty_commit(&self) -> Result<bool, PromptError> {
        blocking(|| {
            Ok(Confirm::new()
                .with_prompt("No changes are staged. Create an empty commit?")
                .default(false)
                .interact()?)
        })
        .await
    }

    async fn confirm_commit(&self, draft: &CommitMessageDraft) -> Result<bool, PromptError> {
        let draft = draft.clone();
        blocking(move || {
            preview(&draft);
            Ok(Confirm::new()
                .with_prompt("Commit with this message?")
                .default(true)
                .interact()?)
        })
        .await
    }

    async fn collect_fields(
        &self,
        prefill: Option<CommitMessageDraft>,
        include_signoff: bool,
    ) -> Result<CommitMessageDraft, PromptError> {
        blocking(move || collect(prefill, include_signoff)).await
    }

    fn notify(&self, message: &str) {
        println!("{message}");
    }
}
