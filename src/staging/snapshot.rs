//! Staging snapshots and the restoration plans computed between them.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::warn;

/// Immutable record of which paths were staged at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingSnapshot {
    staged_paths: BTreeSet<String>,
    captured_at: DateTime<Utc>,
    repo_root: PathBuf,
}

impl StagingSnapshot {
    pub fn new(staged_paths: BTreeSet<String>, repo_root: impl Into<PathBuf>) -> Self {
        Self {
            staged_paths,
            captured_at: Utc::now(),
            repo_root: repo_root.into(),
        }
    }

    pub fn staged_paths(&self) -> &BTreeSet<String> {
        &self.staged_paths
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn contains(&self, path: &str) -> bool {
        self.staged_paths.contains(path)
    }
}

/// Paths to unstage to get from `observed` back to `baseline`.
///
/// Every path in the plan is staged in `observed`; the constructor prunes any
/// path that is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorationPlan {
    paths_to_unstage: Vec<String>,
    baseline: StagingSnapshot,
    observed: StagingSnapshot,
}

impl RestorationPlan {
    /// Compute `observed − baseline`.
    pub fn between(baseline: StagingSnapshot, observed: StagingSnapshot) -> Self {
        let paths_to_unstage = observed
            .staged_paths
            .difference(&baseline.staged_paths)
            .cloned()
            .collect();
        Self {
            paths_to_unstage,
            baseline,
            observed,
        }
    }

    /// Build a plan from an explicit path list, dropping paths that are not
    /// staged in `observed`.
    pub fn new(
        paths_to_unstage: Vec<String>,
        baseline: StagingSnapshot,
        observed: StagingSnapshot,
    ) -> Self {
        let (kept, dropped): (Vec<String>, Vec<String>) = paths_to_unstage
            .into_iter()
            .partition(|p| observed.contains(p));
        if !dropped.is_empty() {
            warn!(
                "Dropping {} path(s) from restoration plan that were not staged: {}",
                dropped.len(),
                dropped.join(", ")
            );
        }
        Self {
            paths_to_unstage: kept,
            baseline,
            observed,
        }
    }

    pub fn paths_to_unstage(&self) -> &[String] {
        &self.paths_to_unstage
    }

    pub fn baseline(&self) -> &StagingSnapshot {
        &self.baseline
    }

    pub fn observed(&self) -> &StagingSnapshot {
        &self.observed
    }

    pub fn is_empty(&self) -> bool {
        self.paths_to_unstage.is_empty()
    }

    /// Split the plan into paths still staged in `current` and paths that no
    /// longer are.
    pub fn partition_current(&self, current: &BTreeSet<String>) -> (Vec<String>, Vec<String>) {
        self.paths_to_unstage
            .iter()
            .cloned()
            .partition(|p| current.contains(p))
    }
}

/// Pure set difference between two snapshots.
pub fn plan_restoration(baseline: &StagingSnapshot, observed: &StagingSnapshot) -> RestorationPlan {
    RestorationPlan::between(baseline.clone(), observed.clone())
}
