//! Errors raised while turning wire values into domain values.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Text that does not parse as the identifier kind it was meant to be.
    #[error("{kind} '{value}' is not a valid identifier")]
    InvalidId { kind: &'static str, value: String },

    #[error("unknown task status '{0}' (expected TODO, IN_PROGRESS or DONE)")]
    UnknownTaskStatus(String),
}

impl DomainError {
    pub fn invalid_id(kind: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidId {
            kind,
            value: value.into(),
        }
    }
}
