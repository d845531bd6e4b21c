//! Conventional-commit format checks.
//!
//! The workflow only looks at pass/fail and shows the errors; the rules live
//! behind [`MessageValidator`] so they can be swapped without touching it.

use std::fmt;
use std::sync::LazyLock;

use regex_lite::Regex;

use super::draft::CommitMessageDraft;

/// Default maximum header length (`type(scope): subject`).
pub const DEFAULT_MAX_HEADER_LENGTH: usize = 72;

/// Maximum length of any body or footer line.
pub const MAX_BODY_LINE_LENGTH: usize = 100;

/// Commit types accepted by [`ConventionalValidator`].
pub const COMMIT_TYPES: &[&str] = &[
    "feat", "fix", "docs", "style", "refactor", "perf", "test", "build", "ci", "chore", "revert",
];

static SCOPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9._/-]*$").expect("scope regex is valid"));

/// Draft field a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Type,
    Scope,
    Subject,
    Body,
    Footer,
    Header,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Type => "type",
            Field::Scope => "scope",
            Field::Subject => "subject",
            Field::Body => "body",
            Field::Footer => "footer",
            Field::Header => "header",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, field: Field, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }
}

pub trait MessageValidator: Send + Sync {
    fn validate(&self, draft: &CommitMessageDraft) -> ValidationReport;
}

/// Conventional Commits rules with a configurable header limit.
#[derive(Debug, Clone)]
pub struct ConventionalValidator {
    max_header_length: usize,
}

impl ConventionalValidator {
    pub fn new(max_header_length: usize) -> Self {
        Self { max_header_length }
    }
}

impl Default for ConventionalValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HEADER_LENGTH)
    }
}

impl MessageValidator for ConventionalValidator {
    fn validate(&self, draft: &CommitMessageDraft) -> ValidationReport {
        let mut report = ValidationReport::default();

        let commit_type = draft.commit_type.trim();
        if commit_type.is_empty() {
            report.push(Field::Type, "type is required");
        } else if !COMMIT_TYPES.contains(&commit_type) {
            report.push(
                Field::Type,
                format!(
                    "unknown type '{commit_type}', expected one of: {}",
                    COMMIT_TYPES.join(", ")
                ),
            );
        }

        let scope = draft.scope.trim();
        if !scope.is_empty() && !SCOPE_RE.is_match(scope) {
            report.push(
                Field::Scope,
                format!("scope '{scope}' must be lowercase letters, digits, '.', '_', '/' or '-'"),
            );
        }

        let subject = draft.subject.trim();
        if subject.is_empty() {
            report.push(Field::Subject, "subject is required");
        } else if subject.ends_with('.') {
            report.push(Field::Subject, "subject must not end with a period");
        }

        let header_len = draft.header().chars().count();
        if header_len > self.max_header_length {
            report.push(
                Field::Header,
                format!(
                    "header is {header_len} characters, maximum is {}",
                    self.max_header_length
                ),
            );
        }

        for (field, text) in [(Field::Body, &draft.body), (Field::Footer, &draft.footer)] {
            if let Some(line) = text
                .lines()
                .find(|l| l.chars().count() > MAX_BODY_LINE_LENGTH)
            {
                report.push(
                    field,
                    format!(
                        "line exceeds {MAX_BODY_LINE_LENGTH} characters: '{}...'",
                        line.chars().take(30).collect::<String>()
                    ),
                );
            }
        }

        report
    }
}
