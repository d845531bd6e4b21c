//! Commit message drafts and their validation.

pub mod draft;
pub mod validate;

pub use draft::CommitMessageDraft;
pub use validate::{
    ConventionalValidator, Field, FieldError, MessageValidator, ValidationReport,
};
