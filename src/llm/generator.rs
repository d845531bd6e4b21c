//! AI commit message generation.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::GenerationError;
use crate::git::RepositoryState;
use crate::message::CommitMessageDraft;

use super::prompt::build_commit_prompt;
use super::provider::{ProviderRouter, ProviderSelection};
use super::subprocess::{CliExecutor, CliRunner};

/// Produces commit message text for a repository state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageGenerator: Send + Sync {
    async fn generate(&self, state: &RepositoryState) -> Result<String, GenerationError>;
}

/// Generator backed by the provider CLIs.
pub struct AiGenerator<E = CliRunner> {
    router: ProviderRouter<E>,
}

impl AiGenerator<CliRunner> {
    /// Generator using the real CLIs with timeouts from the environment.
    pub fn from_env(selection: ProviderSelection) -> Self {
        Self::new(CliRunner::from_env(), selection)
    }
}

impl<E: CliExecutor> AiGenerator<E> {
    pub fn new(executor: E, selection: ProviderSelection) -> Self {
        Self {
            router: ProviderRouter::new(executor, selection),
        }
    }
}

#[async_trait]
impl<E: CliExecutor> MessageGenerator for AiGenerator<E> {
    async fn generate(&self, state: &RepositoryState) -> Result<String, GenerationError> {
        let prompt = build_commit_prompt(state);
        debug!("Commit prompt is {} chars", prompt.len());

        let completion = self.router.complete(&prompt).await?;
        let text = completion.text.trim();

        // Reject replies with no usable first line before they reach the user.
        if CommitMessageDraft::parse(text, false).is_none() {
            return Err(GenerationError::Unusable(
                text.chars().take(200).collect(),
            ));
        }

        info!("Commit message generated by {}", completion.provider);
        Ok(text.to_string())
    }
}
