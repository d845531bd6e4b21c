//! Index writes: auto-staging worktree changes and unstaging paths.

use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use git2::{ErrorCode, ObjectType, Repository, StatusOptions};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::GatewayError;

/// Why a single path could not be staged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    PermissionDenied,
    NotFound,
    Conflict,
    Locked,
    Other,
}

impl FailureCategory {
    fn from_git(err: &git2::Error) -> Self {
        match err.code() {
            ErrorCode::NotFound => FailureCategory::NotFound,
            ErrorCode::Conflict | ErrorCode::Unmerged | ErrorCode::MergeConflict => {
                FailureCategory::Conflict
            }
            ErrorCode::Locked => FailureCategory::Locked,
            _ if err.message().to_lowercase().contains("permission denied") => {
                FailureCategory::PermissionDenied
            }
            _ => FailureCategory::Other,
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCategory::PermissionDenied => write!(f, "permission denied"),
            FailureCategory::NotFound => write!(f, "not found"),
            FailureCategory::Conflict => write!(f, "conflict"),
            FailureCategory::Locked => write!(f, "locked"),
            FailureCategory::Other => write!(f, "other"),
        }
    }
}

/// A path auto-staging could not add to the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingFailure {
    pub path: String,
    pub error: String,
    pub category: FailureCategory,
}

/// Outcome of one auto-staging pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoStagingResult {
    pub staged_paths: Vec<String>,
    pub failures: Vec<StagingFailure>,
    pub all_succeeded: bool,
    pub duration: Duration,
}

impl AutoStagingResult {
    pub fn new(
        staged_paths: Vec<String>,
        failures: Vec<StagingFailure>,
        duration: Duration,
    ) -> Self {
        let all_succeeded = failures.is_empty();
        Self {
            staged_paths,
            failures,
            all_succeeded,
            duration,
        }
    }
}

/// Stage tracked worktree changes, optionally with untracked files.
///
/// Each path is staged individually so a single bad path is reported in
/// `failures` instead of hiding which paths made it into the index. The index
/// is written once at the end; failing to write it is a gateway error.
///
/// `cancel` is checked before every path and right before the write. Once it
/// fires the in-memory index is discarded, so an interrupted run never
/// leaves paths staged behind the caller's back.
pub fn stage_worktree_changes(
    repo: &Repository,
    include_untracked: bool,
    cancel: &CancellationToken,
) -> Result<AutoStagingResult, GatewayError> {
    let started = Instant::now();

    let mut opts = StatusOptions::new();
    opts.include_untracked(include_untracked)
        .recurse_untracked_dirs(include_untracked)
        .include_ignored(false);
    let statuses = repo.statuses(Some(&mut opts)).map_err(GatewayError::Status)?;
    let mut index = repo.index().map_err(GatewayError::Index)?;

    let mut staged = Vec::new();
    let mut failures = Vec::new();

    for entry in statuses.iter() {
        if cancel.is_cancelled() {
            debug!("Auto-staging interrupted after {} path(s)", staged.len());
            return Err(GatewayError::Interrupted);
        }
        let status = entry.status();
        let Some(path) = entry.path() else {
            continue;
        };

        if status.is_conflicted() {
            failures.push(StagingFailure {
                path: path.to_string(),
                error: "unresolved merge conflict".to_string(),
                category: FailureCategory::Conflict,
            });
            continue;
        }

        let result = if status.is_wt_deleted() {
            index.remove_path(Path::new(path))
        } else if status.is_wt_modified() || status.is_wt_typechange() {
            index.add_path(Path::new(path))
        } else if status.is_wt_new() && include_untracked {
            index.add_path(Path::new(path))
        } else {
            continue;
        };

        match result {
            Ok(()) => staged.push(path.to_string()),
            Err(e) => {
                warn!("Failed to stage {path}: {e}");
                failures.push(StagingFailure {
                    path: path.to_string(),
                    error: e.message().to_string(),
                    category: FailureCategory::from_git(&e),
                });
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(GatewayError::Interrupted);
    }
    index.write().map_err(GatewayError::Index)?;

    let result = AutoStagingResult::new(staged, failures, started.elapsed());
    debug!(
        "Auto-staged {} path(s), {} failure(s) in {:?}",
        result.staged_paths.len(),
        result.failures.len(),
        result.duration
    );
    Ok(result)
}

/// Reset the given paths in the index back to HEAD.
///
/// On an unborn branch the entries are removed from the index instead.
pub fn unstage_paths(repo: &Repository, paths: &[String]) -> Result<(), GatewayError> {
    if paths.is_empty() {
        return Ok(());
    }

    let unstage_err = |source: git2::Error| GatewayError::Unstage {
        count: paths.len(),
        source,
    };

    let head = match repo.head() {
        Ok(head) => Some(head.peel(ObjectType::Commit).map_err(unstage_err)?),
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => None,
        Err(e) => return Err(unstage_err(e)),
    };

    repo.reset_default(head.as_ref(), paths.iter().map(String::as_str))
        .map_err(unstage_err)?;
    Ok(())
}
