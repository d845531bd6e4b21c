//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use git2::{Oid, Repository, Signature};
use tokio_util::sync::CancellationToken;

use gitscribe::error::{GatewayError, GenerationError, PromptError};
use gitscribe::git::{
    AutoStagingResult, ChangeStatus, FailureCategory, FileChange, RepositoryGateway,
    RepositoryState, StageScope, StagingFailure,
};
use gitscribe::interact::{
    AiAcceptanceDecision, CommitFailureDecision, Interaction, RejectFollowUp, ValidationAction,
};
use gitscribe::llm::MessageGenerator;
use gitscribe::message::{CommitMessageDraft, ValidationReport};

/// A test git repository builder for integration tests.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
}

impl TestRepo {
    /// Create a new empty git repository in a temp directory with an identity.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let repo = Repository::init(dir.path()).expect("Failed to init git repo");
        let mut config = repo.config().expect("Failed to open config");
        config
            .set_str("user.name", "Test User")
            .expect("Failed to set user.name");
        config
            .set_str("user.email", "test@example.com")
            .expect("Failed to set user.email");
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Add `name` to the index as `git add` would.
    pub fn stage(&self, name: &str) {
        let mut index = self.repo.index().expect("Failed to get index");
        index.add_path(Path::new(name)).expect("Failed to add file");
        index.write().expect("Failed to write index");
    }

    /// Write, stage and commit the given files. Returns the commit OID.
    pub fn commit_files(&self, files: &[(&str, &str)], message: &str) -> Oid {
        for (name, content) in files {
            self.write(name, content);
            self.stage(name);
        }

        let sig = Signature::now("Test User", "test@example.com")
            .expect("Failed to create signature");
        let mut index = self.repo.index().expect("Failed to get index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to create commit")
    }

    /// Paths staged relative to HEAD, read straight from libgit2.
    pub fn staged(&self) -> BTreeSet<String> {
        gitscribe::git::changes::staged_paths(&self.repo).expect("Failed to read staged paths")
    }

    pub fn head_message(&self) -> String {
        self.repo
            .head()
            .expect("No HEAD")
            .peel_to_commit()
            .expect("HEAD is not a commit")
            .message()
            .unwrap_or_default()
            .to_string()
    }

    pub fn commit_count(&self) -> usize {
        let mut walk = self.repo.revwalk().expect("Failed to create revwalk");
        if walk.push_head().is_err() {
            return 0;
        }
        walk.count()
    }
}

/// Changes the working directory until dropped. Tests using it must be `#[serial]`.
pub struct CwdGuard {
    original: PathBuf,
}

impl CwdGuard {
    pub fn set(path: &Path) -> Self {
        let original = std::env::current_dir().expect("Failed to get current directory");
        std::env::set_current_dir(path).expect("Failed to set current directory");
        Self { original }
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

pub fn set(paths: &[&str]) -> BTreeSet<String> {
    paths.iter().map(|p| p.to_string()).collect()
}

pub fn draft(commit_type: &str, subject: &str) -> CommitMessageDraft {
    CommitMessageDraft {
        commit_type: commit_type.to_string(),
        subject: subject.to_string(),
        include_signoff: true,
        ..Default::default()
    }
}

/// Gateway operation a [`FakeGateway`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Capture,
    Stage,
    RepositoryState,
}

/// In-memory gateway recording every call.
///
/// `index` is what is staged relative to HEAD; `worktree` is what
/// auto-staging would pick up. A commit empties the index.
#[derive(Default)]
pub struct FakeGateway {
    /// Operation that returns a gateway error.
    pub fail_at: Mutex<Option<FailAt>>,
    /// Auto-staging sleeps this long, then writes the index regardless of
    /// the token, like a write that was already in flight.
    pub stage_delay: Mutex<Duration>,
    pub stage_calls: AtomicU32,
    pub index: Mutex<BTreeSet<String>>,
    pub worktree: Mutex<Vec<String>>,
    pub untracked: Mutex<Vec<String>>,
    /// Paths whose staging fails.
    pub failing: Mutex<BTreeSet<String>>,
    /// The first `commit_failures` commits fail.
    pub commit_failures: AtomicU32,
    pub unstage_delay: Mutex<Duration>,
    pub unstage_calls: Mutex<Vec<Vec<String>>>,
    pub commits: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn new(staged: &[&str], worktree: &[&str]) -> Self {
        Self {
            index: Mutex::new(set(staged)),
            worktree: Mutex::new(worktree.iter().map(|p| p.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn with_untracked(self, paths: &[&str]) -> Self {
        *self.untracked.lock().unwrap() = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_failing(self, paths: &[&str]) -> Self {
        *self.failing.lock().unwrap() = set(paths);
        self
    }

    pub fn failing_at(self, at: FailAt) -> Self {
        *self.fail_at.lock().unwrap() = Some(at);
        self
    }

    pub fn with_stage_delay(self, delay: Duration) -> Self {
        *self.stage_delay.lock().unwrap() = delay;
        self
    }

    pub fn stage_calls(&self) -> u32 {
        self.stage_calls.load(Ordering::SeqCst)
    }

    fn check(&self, at: FailAt) -> Result<(), GatewayError> {
        if *self.fail_at.lock().unwrap() == Some(at) {
            return Err(GatewayError::TaskFailed(format!("{at:?} failed: index.lock exists")));
        }
        Ok(())
    }

    pub fn with_unstage_delay(self, delay: Duration) -> Self {
        *self.unstage_delay.lock().unwrap() = delay;
        self
    }

    pub fn with_commit_failures(self, count: u32) -> Self {
        self.commit_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn staged(&self) -> BTreeSet<String> {
        self.index.lock().unwrap().clone()
    }

    pub fn unstage_calls(&self) -> Vec<Vec<String>> {
        self.unstage_calls.lock().unwrap().clone()
    }

    pub fn commits(&self) -> Vec<String> {
        self.commits.lock().unwrap().clone()
    }

    async fn stage(&self, paths: Vec<String>) -> Result<AutoStagingResult, GatewayError> {
        self.stage_calls.fetch_add(1, Ordering::SeqCst);
        self.check(FailAt::Stage)?;
        let delay = *self.stage_delay.lock().unwrap();
        tokio::time::sleep(delay).await;

        let failing = self.failing.lock().unwrap().clone();
        let mut index = self.index.lock().unwrap();
        let mut staged = Vec::new();
        let mut failures = Vec::new();
        for path in paths {
            if failing.contains(&path) {
                failures.push(StagingFailure {
                    path,
                    error: "permission denied".to_string(),
                    category: FailureCategory::PermissionDenied,
                });
            } else {
                index.insert(path.clone());
                staged.push(path);
            }
        }
        Ok(AutoStagingResult::new(staged, failures, Duration::from_millis(1)))
    }
}

#[async_trait]
impl RepositoryGateway for FakeGateway {
    fn repo_root(&self) -> PathBuf {
        PathBuf::from("/fake/repo")
    }

    async fn capture_staged_paths(&self) -> Result<BTreeSet<String>, GatewayError> {
        self.check(FailAt::Capture)?;
        Ok(self.staged())
    }

    async fn stage_modified(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<AutoStagingResult, GatewayError> {
        let paths = self.worktree.lock().unwrap().clone();
        self.stage(paths).await
    }

    async fn stage_modified_and_untracked(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<AutoStagingResult, GatewayError> {
        let mut paths = self.worktree.lock().unwrap().clone();
        paths.extend(self.untracked.lock().unwrap().iter().cloned());
        self.stage(paths).await
    }

    async fn unstage(&self, paths: &[String]) -> Result<(), GatewayError> {
        self.unstage_calls.lock().unwrap().push(paths.to_vec());
        let delay = *self.unstage_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        let mut index = self.index.lock().unwrap();
        for path in paths {
            index.remove(path);
        }
        Ok(())
    }

    async fn repository_state(&self, _scope: StageScope) -> Result<RepositoryState, GatewayError> {
        self.check(FailAt::RepositoryState)?;
        let staged_changes = self
            .staged()
            .into_iter()
            .map(|path| FileChange {
                diff: Some(format!("+changes in {path}\n")),
                path,
                status: ChangeStatus::Modified,
                old_path: None,
            })
            .collect();
        Ok(RepositoryState {
            staged_changes,
            unstaged_changes: Vec::new(),
        })
    }

    async fn commit(
        &self,
        draft: &CommitMessageDraft,
        allow_empty: bool,
    ) -> Result<String, GatewayError> {
        let pending = self.commit_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.commit_failures.store(pending - 1, Ordering::SeqCst);
            return Err(GatewayError::TaskFailed("pre-commit hook failed".to_string()));
        }
        let mut index = self.index.lock().unwrap();
        if index.is_empty() && !allow_empty {
            return Err(GatewayError::NothingToCommit);
        }
        index.clear();
        self.commits
            .lock()
            .unwrap()
            .push(draft.render(Some("Test User <test@example.com>")));
        Ok("abc1234".to_string())
    }
}

/// Generator returning scripted replies, or never returning when `hang` is set.
#[derive(Default)]
pub struct ScriptedGenerator {
    pub replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    pub calls: AtomicU32,
    pub hang: bool,
}

impl ScriptedGenerator {
    pub fn replying(replies: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    /// Same reply for every call.
    pub fn always(text: &str, times: usize) -> Self {
        Self::replying((0..times).map(|_| Ok(text.to_string())).collect())
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageGenerator for ScriptedGenerator {
    async fn generate(&self, _state: &RepositoryState) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::Unusable("no scripted reply".to_string())))
    }
}

/// One scripted answer to a user prompt.
#[derive(Debug, Clone)]
pub enum Answer {
    Ai(AiAcceptanceDecision),
    Followup(RejectFollowUp),
    Failure(CommitFailureDecision),
    Validation(ValidationAction),
    Confirm(bool),
    Fields(CommitMessageDraft),
    /// The user backs out of the prompt.
    Cancel,
    /// The prompt never returns.
    Hang,
}

/// Interaction answering from a script and recording what it was shown.
#[derive(Default)]
pub struct ScriptedInteraction {
    pub answers: Mutex<VecDeque<Answer>>,
    /// `prefill` passed to each `collect_fields` call.
    pub prefills: Mutex<Vec<Option<CommitMessageDraft>>>,
    pub presented: Mutex<Vec<CommitMessageDraft>>,
    pub validation_errors: Mutex<Vec<ValidationReport>>,
    pub notices: Mutex<Vec<String>>,
}

impl ScriptedInteraction {
    pub fn new(answers: Vec<Answer>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            ..Default::default()
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.lock().unwrap().len()
    }

    pub fn prefills(&self) -> Vec<Option<CommitMessageDraft>> {
        self.prefills.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }

    async fn next(&self, prompt: &str) -> Result<Answer, PromptError> {
        let answer = self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted answer for {prompt}"));
        match answer {
            Answer::Cancel => Err(PromptError::Cancelled),
            Answer::Hang => std::future::pending().await,
            other => Ok(other),
        }
    }
}

#[async_trait]
impl Interaction for ScriptedInteraction {
    async fn choose_ai_decision(
        &self,
        draft: &CommitMessageDraft,
    ) -> Result<AiAcceptanceDecision, PromptError> {
        self.presented.lock().unwrap().push(draft.clone());
        match self.next("choose_ai_decision").await? {
            Answer::Ai(decision) => Ok(decision),
            other => panic!("choose_ai_decision got {other:?}"),
        }
    }

    async fn choose_reject_followup(&self) -> Result<RejectFollowUp, PromptError> {
        match self.next("choose_reject_followup").await? {
            Answer::Followup(followup) => Ok(followup),
            other => panic!("choose_reject_followup got {other:?}"),
        }
    }

    async fn choose_failure_decision(
        &self,
        _error: &str,
    ) -> Result<CommitFailureDecision, PromptError> {
        match self.next("choose_failure_decision").await? {
            Answer::Failure(decision) => Ok(decision),
            other => panic!("choose_failure_decision got {other:?}"),
        }
    }

    async fn choose_validation_action(
        &self,
        report: &ValidationReport,
    ) -> Result<ValidationAction, PromptError> {
        self.validation_errors.lock().unwrap().push(report.clone());
        match self.next("choose_validation_action").await? {
            Answer::Validation(action) => Ok(action),
            other => panic!("choose_validation_action got {other:?}"),
        }
    }

    async fn confirm_empty_commit(&self) -> Result<bool, PromptError> {
        match self.next("confirm_empty_commit").await? {
            Answer::Confirm(yes) => Ok(yes),
            other => panic!("confirm_empty_commit got {other:?}"),
        }
    }

    async fn confirm_commit(&self, _draft: &CommitMessageDraft) -> Result<bool, PromptError> {
        match self.next("confirm_commit").await? {
            Answer::Confirm(yes) => Ok(yes),
            other => panic!("confirm_commit got {other:?}"),
        }
    }

    async fn collect_fields(
        &self,
        prefill: Option<CommitMessageDraft>,
        include_signoff: bool,
    ) -> Result<CommitMessageDraft, PromptError> {
        self.prefills.lock().unwrap().push(prefill);
        match self.next("collect_fields").await? {
            Answer::Fields(mut draft) => {
                draft.include_signoff = include_signoff;
                Ok(draft)
            }
            other => panic!("collect_fields got {other:?}"),
        }
    }

    fn notify(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}
