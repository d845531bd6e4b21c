//! [`RepositoryGateway`] backed by libgit2.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use git2::{ErrorCode, Repository};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::GatewayError;
use crate::message::CommitMessageDraft;

use super::changes::{collect_state, staged_paths};
use super::staging::{stage_worktree_changes, unstage_paths};
use super::{AutoStagingResult, RepositoryGateway, RepositoryState, StageScope};

/// Gateway that reopens the repository for every call on a blocking thread.
///
/// `git2::Repository` is not `Sync`, and libgit2 calls block, so each
/// operation runs inside `spawn_blocking` with its own handle.
#[derive(Debug, Clone)]
pub struct Git2Gateway {
    root: PathBuf,
}

impl Git2Gateway {
    /// Discover the repository containing `path`.
    pub fn discover(path: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let repo = Repository::discover(path).map_err(GatewayError::OpenRepository)?;
        let root = repo
            .workdir()
            .ok_or(GatewayError::BareRepository)?
            .to_path_buf();
        Ok(Self { root })
    }

    async fn with_repo<T, F>(&self, op: F) -> Result<T, GatewayError>
    where
        T: Send + 'static,
        F: FnOnce(&Repository) -> Result<T, GatewayError> + Send + 'static,
    {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let repo = Repository::open(&root).map_err(GatewayError::OpenRepository)?;
            op(&repo)
        })
        .await
        .map_err(|e| GatewayError::TaskFailed(e.to_string()))?
    }
}

#[async_trait]
impl RepositoryGateway for Git2Gateway {
    fn repo_root(&self) -> PathBuf {
        self.root.clone()
    }

    async fn capture_staged_paths(&self) -> Result<BTreeSet<String>, GatewayError> {
        self.with_repo(staged_paths).await
    }

    async fn stage_modified(
        &self,
        cancel: &CancellationToken,
    ) -> Result<AutoStagingResult, GatewayError> {
        let cancel = cancel.clone();
        self.with_repo(move |repo| stage_worktree_changes(repo, false, &cancel))
            .await
    }

    async fn stage_modified_and_untracked(
        &self,
        cancel: &CancellationToken,
    ) -> Result<AutoStagingResult, GatewayError> {
        let cancel = cancel.clone();
        self.with_repo(move |repo| stage_worktree_changes(repo, true, &cancel))
            .await
    }

    async fn unstage(&self, paths: &[String]) -> Result<(), GatewayError> {
        let paths = paths.to_vec();
        self.with_repo(move |repo| unstage_paths(repo, &paths))
            .await
    }

    async fn repository_state(&self, scope: StageScope) -> Result<RepositoryState, GatewayError> {
        self.with_repo(move |repo| collect_state(repo, scope)).await
    }

    async fn commit(
        &self,
        draft: &CommitMessageDraft,
        allow_empty: bool,
    ) -> Result<String, GatewayError> {
        let draft = draft.clone();
        self.with_repo(move |repo| create_commit(repo, &draft, allow_empty))
            .await
    }
}

/// Commit the current index on HEAD.
///
/// Refuses to create a commit whose tree equals its parent's unless
/// `allow_empty` is set.
pub fn create_commit(
    repo: &Repository,
    draft: &CommitMessageDraft,
    allow_empty: bool,
) -> Result<String, GatewayError> {
    let mut index = repo.index().map_err(GatewayError::Index)?;
    let tree_id = index.write_tree().map_err(GatewayError::Commit)?;
    let tree = repo.find_tree(tree_id).map_err(GatewayError::Commit)?;

    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit().map_err(GatewayError::Commit)?),
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => None,
        Err(e) => return Err(GatewayError::Commit(e)),
    };

    if !allow_empty {
        let unchanged = match &parent {
            Some(parent) => parent.tree_id() == tree_id,
            None => tree.is_empty(),
        };
        if unchanged {
            return Err(GatewayError::NothingToCommit);
        }
    }

    let sig = repo.signature().map_err(GatewayError::Config)?;
    let identity = format!(
        "{} <{}>",
        sig.name().unwrap_or_default(),
        sig.email().unwrap_or_default()
    );
    let message = draft.render(Some(&identity));
    debug!("Committing with message:\n{message}");

    let parents: Vec<&git2::Commit> = parent.iter().collect();
    let oid = repo
        .commit(Some("HEAD"), &sig, &sig, &message, &tree, &parents)
        .map_err(GatewayError::Commit)?;

    let short = oid.to_string().chars().take(7).collect::<String>();
    info!("Created commit {short}");
    Ok(short)
}
