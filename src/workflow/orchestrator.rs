//! The commit workflow: snapshot, auto-stage, acquire a message, commit, and
//! restore the staging area on every exit that did not commit.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Deadlines;
use crate::error::{GatewayError, Phase, PromptError, WorkflowError};
use crate::git::{AutoStagingResult, RepositoryGateway, StageScope};
use crate::interact::{
    AiAcceptanceDecision, CommitFailureDecision, Interaction, RejectFollowUp, ValidationAction,
};
use crate::llm::{AiGenerator, MessageGenerator, ProviderSelection};
use crate::message::{CommitMessageDraft, MessageValidator};
use crate::staging::StagingStateManager;

use super::acceptance::{
    AcceptanceMachine, AcceptanceState, Event, MAX_AI_ATTEMPTS, Resolution, ValidationEditMode,
};
use super::cleanup::{CleanupScope, RestorationStatus};
use super::interrupt::INTERRUPTED_EXIT_CODE;

/// Options for one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub stage_scope: StageScope,
    /// Go straight to manual entry.
    pub skip_ai: bool,
    /// Leave the `Signed-off-by:` trailer off.
    pub omit_signoff: bool,
    pub provider: ProviderSelection,
    pub validation_edit: ValidationEditMode,
}

/// How a run ended.
#[derive(Debug)]
pub enum ExitOutcome {
    Committed { commit_id: String },
    AbortedByUser,
    AbortedByError(WorkflowError),
    Interrupted,
}

impl ExitOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            ExitOutcome::Committed { .. } => 0,
            ExitOutcome::AbortedByUser | ExitOutcome::AbortedByError(_) => 1,
            ExitOutcome::Interrupted => INTERRUPTED_EXIT_CODE,
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub outcome: ExitOutcome,
    pub restoration: RestorationStatus,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }
}

/// Why a run stopped before the state machine finished.
enum Halt {
    Interrupted,
    Failed(WorkflowError),
}

impl From<WorkflowError> for Halt {
    fn from(err: WorkflowError) -> Self {
        Halt::Failed(err)
    }
}

/// Drives one commit run against its collaborators.
pub struct Orchestrator {
    gateway: Arc<dyn RepositoryGateway>,
    interaction: Arc<dyn Interaction>,
    validator: Arc<dyn MessageValidator>,
    generator: Option<Arc<dyn MessageGenerator>>,
    deadlines: Deadlines,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn RepositoryGateway>,
        interaction: Arc<dyn Interaction>,
        validator: Arc<dyn MessageValidator>,
    ) -> Self {
        Self {
            gateway,
            interaction,
            validator,
            generator: None,
            deadlines: Deadlines::default(),
        }
    }

    /// Use `generator` instead of the provider CLIs named in [`RunOptions`].
    pub fn with_generator(mut self, generator: Arc<dyn MessageGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_deadlines(mut self, deadlines: Deadlines) -> Self {
        self.deadlines = deadlines;
        self
    }

    /// Run the workflow until it commits, aborts or `cancel` fires.
    ///
    /// Never returns before the cleanup scope has finished, and the cleanup
    /// scope never outlives the restore deadline.
    pub async fn run(&self, options: RunOptions, cancel: CancellationToken) -> RunReport {
        let manager = StagingStateManager::new(self.gateway.clone());

        let baseline = match until_cancelled(&cancel, manager.capture()).await {
            Some(Ok(snapshot)) => snapshot,
            Some(Err(source)) => {
                return RunReport {
                    outcome: ExitOutcome::AbortedByError(WorkflowError::gateway(Phase::Snapshot)(
                        source,
                    )),
                    restoration: RestorationStatus::NotNeeded,
                };
            }
            None => {
                return RunReport {
                    outcome: ExitOutcome::Interrupted,
                    restoration: RestorationStatus::NotNeeded,
                };
            }
        };
        debug!(
            "Baseline: {} staged path(s) at {}",
            baseline.staged_paths().len(),
            baseline.captured_at()
        );

        let scope = CleanupScope::new(&manager, baseline, self.deadlines.restore);
        let outcome = match self.drive(&options, &scope, &cancel).await {
            Ok(outcome) => outcome,
            Err(Halt::Interrupted) => ExitOutcome::Interrupted,
            Err(Halt::Failed(err)) if err.is_cancellation() => ExitOutcome::Interrupted,
            Err(Halt::Failed(err)) => ExitOutcome::AbortedByError(err),
        };

        let restoration = scope.finish().await;
        info!("Run finished: {:?}, {}", outcome, restoration);
        RunReport {
            outcome,
            restoration,
        }
    }

    async fn drive(
        &self,
        options: &RunOptions,
        scope: &CleanupScope<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExitOutcome, Halt> {
        let staging = self
            .auto_stage(options.stage_scope, cancel)
            .await?
            .map_err(WorkflowError::gateway(Phase::AutoStage))?;

        if !staging.all_succeeded {
            let (first_path, first_error) = staging
                .failures
                .first()
                .map(|f| (f.path.clone(), f.error.clone()))
                .unwrap_or_default();
            return Err(WorkflowError::PartialStaging {
                failed: staging.failures.len(),
                first_path,
                first_error,
            }
            .into());
        }
        debug!(
            "Auto-staged {} path(s) in {:?}",
            staging.staged_paths.len(),
            staging.duration
        );

        let state = step(cancel, self.gateway.repository_state(options.stage_scope))
            .await?
            .map_err(WorkflowError::gateway(Phase::DescribeRepository))?;

        let allow_empty = state.is_empty();
        if allow_empty {
            let confirmed = step(cancel, self.interaction.confirm_empty_commit())
                .await?
                .map_err(WorkflowError::prompt(Phase::DescribeRepository))?;
            if !confirmed {
                self.interaction.notify("Nothing to commit.");
                return Ok(ExitOutcome::AbortedByUser);
            }
        }

        let machine = AcceptanceMachine::new(options.validation_edit);
        // With nothing staged there is nothing for the AI to describe.
        let mut current = machine.initial(options.skip_ai || allow_empty);
        let generator = self.generator(options);
        let include_signoff = !options.omit_signoff;

        loop {
            debug!("Acceptance state: {}", current.name());
            let event = match &current {
                AcceptanceState::GeneratePrompt { retry_count } => {
                    self.interaction.notify(&format!(
                        "Generating commit message (attempt {} of {})...",
                        retry_count + 1,
                        MAX_AI_ATTEMPTS
                    ));
                    match step(cancel, generator.generate(&state)).await? {
                        Ok(text) => match CommitMessageDraft::parse(&text, include_signoff) {
                            Some(draft) => Event::Generated(draft),
                            None => Event::GenerationFailed(
                                "the reply contained no commit message text".to_string(),
                            ),
                        },
                        Err(e) => {
                            warn!("Generation failed: {e}");
                            Event::GenerationFailed(e.to_string())
                        }
                    }
                }

                AcceptanceState::Present { draft, retry_count } => {
                    let decision = self
                        .prompt(cancel, self.interaction.choose_ai_decision(draft))
                        .await?;
                    match decision {
                        AiAcceptanceDecision::AcceptAndCommit => Event::Accepted,
                        AiAcceptanceDecision::AcceptAndEdit => Event::AcceptedForEdit,
                        AiAcceptanceDecision::Reject if machine.can_regenerate(*retry_count) => {
                            match self
                                .prompt(cancel, self.interaction.choose_reject_followup())
                                .await?
                            {
                                RejectFollowUp::NewAiMessage => Event::RejectedForNewAi,
                                RejectFollowUp::WriteManually => Event::RejectedForManual,
                            }
                        }
                        AiAcceptanceDecision::Reject => Event::RejectedForNewAi,
                    }
                }

                AcceptanceState::EditingPrefilled { draft } => {
                    let fields = self
                        .interaction
                        .collect_fields(Some(draft.clone()), include_signoff);
                    Event::FieldsCollected(self.prompt(cancel, fields).await?)
                }

                AcceptanceState::ManualEntry { notice } => {
                    if let Some(notice) = notice {
                        self.interaction.notify(notice);
                    }
                    let fields = self.interaction.collect_fields(None, include_signoff);
                    Event::FieldsCollected(self.prompt(cancel, fields).await?)
                }

                AcceptanceState::Validating { draft, confirm } => {
                    let report = self.validator.validate(draft);
                    if !report.is_ok() {
                        let action = self
                            .prompt(cancel, self.interaction.choose_validation_action(&report))
                            .await?;
                        match action {
                            ValidationAction::Edit => Event::ValidationFailedEdit,
                            ValidationAction::ProceedAnyway => Event::ValidationFailedProceed,
                        }
                    } else if *confirm
                        && !self
                            .prompt(cancel, self.interaction.confirm_commit(draft))
                            .await?
                    {
                        Event::CommitDeclined
                    } else {
                        Event::ValidationPassed
                    }
                }

                AcceptanceState::Committing { draft } => {
                    if cancel.is_cancelled() {
                        return Err(Halt::Interrupted);
                    }
                    // Not raced against the token: once started, the commit is
                    // allowed to land so the committed flag matches the repository.
                    match self.gateway.commit(draft, allow_empty).await {
                        Ok(commit_id) => {
                            scope.mark_committed();
                            Event::CommitSucceeded(commit_id)
                        }
                        Err(e) => {
                            warn!("Commit failed: {e}");
                            Event::CommitFailed(e.to_string())
                        }
                    }
                }

                AcceptanceState::FailureChoice { error, .. } => {
                    let decision = self
                        .prompt(cancel, self.interaction.choose_failure_decision(error))
                        .await?;
                    match decision {
                        CommitFailureDecision::Retry => Event::FailureRetry,
                        CommitFailureDecision::EditMessage => Event::FailureEdit,
                        CommitFailureDecision::Cancel => Event::FailureCancel,
                    }
                }

                AcceptanceState::Done(Resolution::Committed { commit_id }) => {
                    return Ok(ExitOutcome::Committed {
                        commit_id: commit_id.clone(),
                    });
                }
                AcceptanceState::Done(Resolution::Cancelled) => {
                    return Ok(ExitOutcome::AbortedByUser);
                }
            };

            current = machine
                .transition(current, event)
                .map_err(WorkflowError::from)?;
        }
    }

    /// Auto-stage under the token without abandoning an in-flight index write.
    ///
    /// On cancellation the gateway stops adding paths and skips its write;
    /// waiting for it (bounded by the restore deadline) keeps that write from
    /// landing after restoration has read the index.
    async fn auto_stage(
        &self,
        scope: StageScope,
        cancel: &CancellationToken,
    ) -> Result<Result<AutoStagingResult, GatewayError>, Halt> {
        let staging = async {
            match scope {
                StageScope::ModifiedOnly => self.gateway.stage_modified(cancel).await,
                StageScope::ModifiedAndUntracked => {
                    self.gateway.stage_modified_and_untracked(cancel).await
                }
            }
        };
        tokio::pin!(staging);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                if tokio::time::timeout(self.deadlines.restore, &mut staging).await.is_err() {
                    warn!("Auto-staging did not stop within {:?}", self.deadlines.restore);
                }
                Err(Halt::Interrupted)
            }
            result = &mut staging => Ok(result),
        }
    }

    fn generator(&self, options: &RunOptions) -> Arc<dyn MessageGenerator> {
        match &self.generator {
            Some(generator) => generator.clone(),
            None => Arc::new(AiGenerator::from_env(options.provider)),
        }
    }

    /// Await an interactive prompt under the token.
    async fn prompt<T, F>(&self, cancel: &CancellationToken, fut: F) -> Result<T, Halt>
    where
        F: Future<Output = Result<T, PromptError>>,
    {
        Ok(step(cancel, fut)
            .await?
            .map_err(WorkflowError::prompt(Phase::AcquireMessage))?)
    }
}

async fn until_cancelled<T, F>(cancel: &CancellationToken, fut: F) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        value = fut => Some(value),
    }
}

async fn step<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, Halt>
where
    F: Future<Output = T>,
{
    until_cancelled(cancel, fut).await.ok_or(Halt::Interrupted)
}
