//! Staged and unstaged change collection using git2.

use std::collections::BTreeSet;
use std::fmt;

use git2::{Delta, Diff, DiffFindOptions, DiffOptions, ErrorCode, Patch, Repository, Tree};
use tracing::{debug, warn};

use crate::error::GatewayError;

use super::StageScope;

/// Per-file diff text beyond this size is omitted from the repository state.
pub const MAX_FILE_DIFF_LENGTH: usize = 8_000;

/// Status of a changed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    Unmerged,
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeStatus::Added => write!(f, "added"),
            ChangeStatus::Modified => write!(f, "modified"),
            ChangeStatus::Deleted => write!(f, "deleted"),
            ChangeStatus::Renamed => write!(f, "renamed"),
            ChangeStatus::Copied => write!(f, "copied"),
            ChangeStatus::Unmerged => write!(f, "unmerged"),
        }
    }
}

/// One changed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub status: ChangeStatus,
    /// Source path for renames and copies.
    pub old_path: Option<String>,
    /// Unified diff, only for staged text changes under the size limit.
    pub diff: Option<String>,
}

/// What the repository looks like right before a message is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryState {
    pub staged_changes: Vec<FileChange>,
    pub unstaged_changes: Vec<FileChange>,
}

impl RepositoryState {
    /// True when nothing is staged, i.e. a commit would be empty.
    pub fn is_empty(&self) -> bool {
        self.staged_changes.is_empty()
    }
}

/// Resolve the HEAD tree, distinguishing empty-repo errors from real failures.
///
/// Returns `Ok(None)` for repos with no commits (unborn branch / not found),
/// `Ok(Some(tree))` for repos with a valid HEAD, or `Err(GatewayError::Diff)`
/// for real errors (corrupt HEAD, permission issues, missing objects).
pub(crate) fn resolve_head_tree(repo: &Repository) -> Result<Option<Tree<'_>>, GatewayError> {
    let head_ref = match repo.head() {
        Ok(r) => r,
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            return Ok(None);
        }
        Err(e) => return Err(GatewayError::Diff(e)),
    };

    let tree = head_ref.peel_to_tree().map_err(GatewayError::Diff)?;
    Ok(Some(tree))
}

/// Paths currently in the index that differ from HEAD.
///
/// Both sides of a rename are reported so that unstaging either restores it.
pub fn staged_paths(repo: &Repository) -> Result<BTreeSet<String>, GatewayError> {
    let head_tree = resolve_head_tree(repo)?;
    let diff = repo
        .diff_tree_to_index(head_tree.as_ref(), None, None)
        .map_err(GatewayError::Diff)?;

    let mut paths = BTreeSet::new();
    for delta in diff.deltas() {
        for file in [delta.new_file(), delta.old_file()] {
            if let Some(path) = file.path() {
                paths.insert(path.to_string_lossy().to_string());
            }
        }
    }
    Ok(paths)
}

/// Collect staged changes (with diffs) and unstaged changes (without).
///
/// Untracked files are listed as unstaged additions only for
/// [`StageScope::ModifiedAndUntracked`].
pub fn collect_state(
    repo: &Repository,
    scope: StageScope,
) -> Result<RepositoryState, GatewayError> {
    let head_tree = resolve_head_tree(repo)?;

    let mut staged = repo
        .diff_tree_to_index(head_tree.as_ref(), None, None)
        .map_err(GatewayError::Diff)?;
    staged
        .find_similar(Some(DiffFindOptions::new().renames(true).copies(true)))
        .map_err(GatewayError::Diff)?;

    let include_untracked = scope == StageScope::ModifiedAndUntracked;
    let mut opts = DiffOptions::new();
    opts.include_untracked(include_untracked)
        .recurse_untracked_dirs(include_untracked);
    let unstaged = repo
        .diff_index_to_workdir(None, Some(&mut opts))
        .map_err(GatewayError::Diff)?;

    let state = RepositoryState {
        staged_changes: collect_changes(&staged, true),
        unstaged_changes: collect_changes(&unstaged, false),
    };
    debug!(
        "Repository state: {} staged, {} unstaged",
        state.staged_changes.len(),
        state.unstaged_changes.len()
    );
    Ok(state)
}

fn map_status(delta: Delta) -> Option<ChangeStatus> {
    match delta {
        Delta::Added | Delta::Untracked => Some(ChangeStatus::Added),
        Delta::Modified | Delta::Typechange => Some(ChangeStatus::Modified),
        Delta::Deleted => Some(ChangeStatus::Deleted),
        Delta::Renamed => Some(ChangeStatus::Renamed),
        Delta::Copied => Some(ChangeStatus::Copied),
        Delta::Conflicted => Some(ChangeStatus::Unmerged),
        Delta::Unmodified | Delta::Ignored | Delta::Unreadable => None,
    }
}

fn collect_changes(diff: &Diff<'_>, with_text: bool) -> Vec<FileChange> {
    let mut changes = Vec::new();

    for (idx, delta) in diff.deltas().enumerate() {
        let Some(status) = map_status(delta.status()) else {
            continue;
        };

        let new_path = delta
            .new_file()
            .path()
            .map(|p| p.to_string_lossy().to_string());
        let old_path = delta
            .old_file()
            .path()
            .map(|p| p.to_string_lossy().to_string());

        let (path, old_path) = match status {
            ChangeStatus::Renamed | ChangeStatus::Copied => {
                (new_path.clone().or_else(|| old_path.clone()), old_path)
            }
            _ => (new_path.or(old_path), None),
        };
        let Some(path) = path.filter(|p| !p.is_empty()) else {
            continue;
        };

        let diff_text = if with_text {
            patch_text(diff, idx, &path)
        } else {
            None
        };

        changes.push(FileChange {
            path,
            status,
            old_path,
            diff: diff_text,
        });
    }

    changes.sort_by(|a, b| a.path.cmp(&b.path));
    changes
}

/// Unified diff for one delta, or `None` for binary or oversized files.
fn patch_text(diff: &Diff<'_>, idx: usize, path: &str) -> Option<String> {
    let mut patch = match Patch::from_diff(diff, idx) {
        Ok(Some(patch)) => patch,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to build patch for {path}: {e}");
            return None;
        }
    };

    if patch.delta().flags().is_binary() {
        return None;
    }

    let buf = match patch.to_buf() {
        Ok(buf) => buf,
        Err(e) => {
            warn!("Failed to render patch for {path}: {e}");
            return None;
        }
    };

    let text = buf.as_str()?;
    if text.len() > MAX_FILE_DIFF_LENGTH {
        debug!("Omitting diff for {path}: {} chars", text.len());
        return None;
    }
    Some(text.to_string())
}
