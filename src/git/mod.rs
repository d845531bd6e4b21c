//! Repository gateway: the staging, diff and commit primitives the workflow
//! is built on.

pub mod changes;
pub mod gateway;
pub mod staging;

use std::collections::BTreeSet;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::GatewayError;
use crate::message::CommitMessageDraft;

pub use changes::{ChangeStatus, FileChange, RepositoryState};
pub use gateway::Git2Gateway;
pub use staging::{AutoStagingResult, FailureCategory, StagingFailure};

/// Which worktree changes auto-staging picks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageScope {
    /// Tracked files only (`git add -u`).
    #[default]
    ModifiedOnly,
    /// Tracked files plus untracked, non-ignored files (`git add -A`).
    ModifiedAndUntracked,
}

/// Version-control operations the commit workflow needs.
///
/// Implementations may block. Read-only calls are abandoned when the
/// workflow's cancellation token fires; staging calls receive the token and
/// are always awaited to completion.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RepositoryGateway: Send + Sync {
    /// Working directory root of the repository.
    fn repo_root(&self) -> PathBuf;

    /// Paths currently staged relative to HEAD.
    async fn capture_staged_paths(&self) -> Result<BTreeSet<String>, GatewayError>;

    /// Stage modifications and deletions of tracked files.
    ///
    /// Must not write the index once `cancel` has fired, and must only
    /// return after any index write it started has finished.
    async fn stage_modified(
        &self,
        cancel: &CancellationToken,
    ) -> Result<AutoStagingResult, GatewayError>;

    /// Stage tracked changes and untracked files, under the same rules as
    /// [`RepositoryGateway::stage_modified`].
    async fn stage_modified_and_untracked(
        &self,
        cancel: &CancellationToken,
    ) -> Result<AutoStagingResult, GatewayError>;

    /// Reset the given paths in the index to HEAD.
    async fn unstage(&self, paths: &[String]) -> Result<(), GatewayError>;

    /// Describe staged and unstaged changes for message generation.
    async fn repository_state(&self, scope: StageScope) -> Result<RepositoryState, GatewayError>;

    /// Commit the index with the rendered draft. Returns the short commit id.
    async fn commit(
        &self,
        draft: &CommitMessageDraft,
        allow_empty: bool,
    ) -> Result<String, GatewayError>;
}
