//! The message acceptance state machine.
//!
//! States carry everything the next step needs, the AI retry count included.
//! [`AcceptanceMachine::transition`] is pure; the orchestrator performs the
//! side effect each state asks for and feeds the result back as an [`Event`].

use thiserror::Error;

use crate::message::CommitMessageDraft;

/// Generation calls allowed per run before manual entry is forced.
pub const MAX_AI_ATTEMPTS: u32 = 3;

/// Where "edit" leads after a message fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationEditMode {
    /// Edit the failing draft with every field pre-filled.
    #[default]
    Prefilled,
    /// Start over from blank manual entry.
    Blank,
}

/// How the state machine ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Committed { commit_id: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptanceState {
    GeneratePrompt {
        retry_count: u32,
    },
    Present {
        draft: CommitMessageDraft,
        retry_count: u32,
    },
    EditingPrefilled {
        draft: CommitMessageDraft,
    },
    ManualEntry {
        notice: Option<String>,
    },
    /// `confirm` asks for a final preview before committing; set for
    /// messages the user typed.
    Validating {
        draft: CommitMessageDraft,
        confirm: bool,
    },
    Committing {
        draft: CommitMessageDraft,
    },
    FailureChoice {
        draft: CommitMessageDraft,
        error: String,
    },
    Done(Resolution),
}

impl AcceptanceState {
    pub fn name(&self) -> &'static str {
        match self {
            AcceptanceState::GeneratePrompt { .. } => "GeneratePrompt",
            AcceptanceState::Present { .. } => "Present",
            AcceptanceState::EditingPrefilled { .. } => "EditingPrefilled",
            AcceptanceState::ManualEntry { .. } => "ManualEntry",
            AcceptanceState::Validating { .. } => "Validating",
            AcceptanceState::Committing { .. } => "Committing",
            AcceptanceState::FailureChoice { .. } => "FailureChoice",
            AcceptanceState::Done(_) => "Done",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, AcceptanceState::Done(_))
    }
}

/// Result of the step performed in the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Generated(CommitMessageDraft),
    GenerationFailed(String),
    Accepted,
    AcceptedForEdit,
    RejectedForNewAi,
    RejectedForManual,
    FieldsCollected(CommitMessageDraft),
    ValidationPassed,
    ValidationFailedEdit,
    ValidationFailedProceed,
    CommitDeclined,
    CommitSucceeded(String),
    CommitFailed(String),
    FailureRetry,
    FailureEdit,
    FailureCancel,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Generated(_) => "Generated",
            Event::GenerationFailed(_) => "GenerationFailed",
            Event::Accepted => "Accepted",
            Event::AcceptedForEdit => "AcceptedForEdit",
            Event::RejectedForNewAi => "RejectedForNewAi",
            Event::RejectedForManual => "RejectedForManual",
            Event::FieldsCollected(_) => "FieldsCollected",
            Event::ValidationPassed => "ValidationPassed",
            Event::ValidationFailedEdit => "ValidationFailedEdit",
            Event::ValidationFailedProceed => "ValidationFailedProceed",
            Event::CommitDeclined => "CommitDeclined",
            Event::CommitSucceeded(_) => "CommitSucceeded",
            Event::CommitFailed(_) => "CommitFailed",
            Event::FailureRetry => "FailureRetry",
            Event::FailureEdit => "FailureEdit",
            Event::FailureCancel => "FailureCancel",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Event {event} is not valid in state {state}")]
pub struct InvalidTransition {
    pub state: &'static str,
    pub event: &'static str,
}

/// Transition rules, parameterized by the run's options.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptanceMachine {
    edit_mode: ValidationEditMode,
}

impl AcceptanceMachine {
    pub fn new(edit_mode: ValidationEditMode) -> Self {
        Self { edit_mode }
    }

    pub fn initial(&self, skip_ai: bool) -> AcceptanceState {
        if skip_ai {
            AcceptanceState::ManualEntry { notice: None }
        } else {
            AcceptanceState::GeneratePrompt { retry_count: 0 }
        }
    }

    /// Whether rejecting a message at `retry_count` may still ask for another.
    pub fn can_regenerate(&self, retry_count: u32) -> bool {
        retry_count + 1 < MAX_AI_ATTEMPTS
    }

    pub fn transition(
        &self,
        state: AcceptanceState,
        event: Event,
    ) -> Result<AcceptanceState, InvalidTransition> {
        use AcceptanceState as S;

        let next = match (state, event) {
            (S::GeneratePrompt { retry_count }, Event::Generated(draft)) => {
                S::Present { draft, retry_count }
            }
            (S::GeneratePrompt { .. }, Event::GenerationFailed(reason)) => S::ManualEntry {
                notice: Some(format!(
                    "AI generation failed: {reason}. Write the message manually."
                )),
            },

            (S::Present { draft, .. }, Event::Accepted) => S::Validating {
                draft,
                confirm: false,
            },
            (S::Present { draft, .. }, Event::AcceptedForEdit) => S::EditingPrefilled { draft },
            (S::Present { retry_count, .. }, Event::RejectedForNewAi) => {
                if self.can_regenerate(retry_count) {
                    S::GeneratePrompt {
                        retry_count: retry_count + 1,
                    }
                } else {
                    S::ManualEntry {
                        notice: Some(format!(
                            "Reached the limit of {MAX_AI_ATTEMPTS} AI attempts. Write the message manually."
                        )),
                    }
                }
            }
            (S::Present { .. }, Event::RejectedForManual) => S::ManualEntry { notice: None },

            (S::EditingPrefilled { .. } | S::ManualEntry { .. }, Event::FieldsCollected(draft)) => {
                S::Validating {
                    draft,
                    confirm: true,
                }
            }

            (
                S::Validating { draft, .. },
                Event::ValidationPassed | Event::ValidationFailedProceed,
            ) => {
                S::Committing { draft }
            }
            (S::Validating { draft, .. }, Event::ValidationFailedEdit) => match self.edit_mode {
                ValidationEditMode::Prefilled => S::EditingPrefilled { draft },
                ValidationEditMode::Blank => S::ManualEntry { notice: None },
            },
            (S::Validating { .. }, Event::CommitDeclined) => S::Done(Resolution::Cancelled),

            (S::Committing { .. }, Event::CommitSucceeded(commit_id)) => {
                S::Done(Resolution::Committed { commit_id })
            }
            (S::Committing { draft }, Event::CommitFailed(error)) => {
                S::FailureChoice { draft, error }
            }

            (S::FailureChoice { draft, .. }, Event::FailureRetry) => S::Committing { draft },
            (S::FailureChoice { draft, .. }, Event::FailureEdit) => S::EditingPrefilled { draft },
            (S::FailureChoice { .. }, Event::FailureCancel) => S::Done(Resolution::Cancelled),

            (state, event) => {
                return Err(InvalidTransition {
                    state: state.name(),
                    event: event.name(),
                });
            }
        };
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(subject: &str) -> CommitMessageDraft {
        CommitMessageDraft {
            commit_type: "feat".into(),
            subject: subject.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_initial_state() {
        let machine = AcceptanceMachine::default();
        assert_eq!(
            machine.initial(false),
            AcceptanceState::GeneratePrompt { retry_count: 0 }
        );
        assert_eq!(
            machine.initial(true),
            AcceptanceState::ManualEntry { notice: None }
        );
    }

    #[test]
    fn test_accept_and_commit_path() {
        let machine = AcceptanceMachine::default();
        let s = machine.initial(false);
        let s = machine.transition(s, Event::Generated(draft("a"))).unwrap();
        let s = machine.transition(s, Event::Accepted).unwrap();
        assert_eq!(
            s,
            AcceptanceState::Validating {
                draft: draft("a"),
                confirm: false
            }
        );
        let s = machine.transition(s, Event::ValidationPassed).unwrap();
        let s = machine
            .transition(s, Event::CommitSucceeded("abc1234".into()))
            .unwrap();
        assert_eq!(
            s,
            AcceptanceState::Done(Resolution::Committed {
                commit_id: "abc1234".into()
            })
        );
    }

    #[test]
    fn test_reject_loop_is_bounded() {
        let machine = AcceptanceMachine::default();
        let mut state = machine.initial(false);
        let mut generations = 0;

        while let AcceptanceState::GeneratePrompt { .. } = state {
            generations += 1;
            state = machine
                .transition(state, Event::Generated(draft("try")))
                .unwrap();
            state = machine.transition(state, Event::RejectedForNewAi).unwrap();
        }

        assert_eq!(generations, MAX_AI_ATTEMPTS);
        assert!(matches!(
            state,
            AcceptanceState::ManualEntry { notice: Some(ref n) } if n.contains("limit")
        ));
    }

    #[test]
    fn test_retry_count_threaded_through_states() {
        let machine = AcceptanceMachine::default();
        let s = machine
            .transition(
                AcceptanceState::GeneratePrompt { retry_count: 1 },
                Event::Generated(draft("x")),
            )
            .unwrap();
        assert!(matches!(s, AcceptanceState::Present { retry_count: 1, .. }));
        let s = machine.transition(s, Event::RejectedForNewAi).unwrap();
        assert_eq!(s, AcceptanceState::GeneratePrompt { retry_count: 2 });
        assert!(!machine.can_regenerate(2));
    }

    #[test]
    fn test_generation_failure_goes_to_manual_with_notice() {
        let machine = AcceptanceMachine::default();
        let s = machine
            .transition(
                machine.initial(false),
                Event::GenerationFailed("Claude CLI not found".into()),
            )
            .unwrap();
        match s {
            AcceptanceState::ManualEntry { notice: Some(n) } => {
                assert!(n.contains("Claude CLI not found"))
            }
            other => panic!("expected ManualEntry with notice, got {other:?}"),
        }
    }

    #[test]
    fn test_validation_edit_respects_mode() {
        let failing = AcceptanceState::Validating {
            draft: draft("x"),
            confirm: false,
        };

        let prefilled = AcceptanceMachine::new(ValidationEditMode::Prefilled);
        assert_eq!(
            prefilled
                .transition(failing.clone(), Event::ValidationFailedEdit)
                .unwrap(),
            AcceptanceState::EditingPrefilled { draft: draft("x") }
        );

        let blank = AcceptanceMachine::new(ValidationEditMode::Blank);
        assert_eq!(
            blank.transition(failing, Event::ValidationFailedEdit).unwrap(),
            AcceptanceState::ManualEntry { notice: None }
        );
    }

    #[test]
    fn test_commit_failure_choices() {
        let machine = AcceptanceMachine::default();
        let failed = machine
            .transition(
                AcceptanceState::Committing { draft: draft("x") },
                Event::CommitFailed("hook rejected".into()),
            )
            .unwrap();
        assert!(matches!(failed, AcceptanceState::FailureChoice { .. }));

        assert_eq!(
            machine
                .transition(failed.clone(), Event::FailureRetry)
                .unwrap(),
            AcceptanceState::Committing { draft: draft("x") }
        );
        assert_eq!(
            machine.transition(failed.clone(), Event::FailureEdit).unwrap(),
            AcceptanceState::EditingPrefilled { draft: draft("x") }
        );
        assert_eq!(
            machine.transition(failed, Event::FailureCancel).unwrap(),
            AcceptanceState::Done(Resolution::Cancelled)
        );
    }

    #[test]
    fn test_edited_messages_are_confirmed() {
        let machine = AcceptanceMachine::default();
        let s = machine
            .transition(
                AcceptanceState::EditingPrefilled { draft: draft("x") },
                Event::FieldsCollected(draft("y")),
            )
            .unwrap();
        assert_eq!(
            s,
            AcceptanceState::Validating {
                draft: draft("y"),
                confirm: true
            }
        );
        assert_eq!(
            machine.transition(s, Event::CommitDeclined).unwrap(),
            AcceptanceState::Done(Resolution::Cancelled)
        );
    }

    #[test]
    fn test_invalid_transition_is_an_error() {
        let machine = AcceptanceMachine::default();
        let err = machine
            .transition(AcceptanceState::Done(Resolution::Cancelled), Event::Accepted)
            .unwrap_err();
        assert_eq!(err.state, "Done");
        assert_eq!(err.event, "Accepted");
    }
}
