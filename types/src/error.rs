//! Validation errors for the fundamental types.

use thiserror::Error;

/// Raised when a value cannot be constructed because it would break an invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("identifier must not be empty")]
    EmptyIdentifier,

    #[error("identifier is {got} bytes, at most {max} allowed")]
    IdentifierTooLong { max: usize, got: usize },

    #[error("identifier must not contain NUL bytes")]
    IdentifierContainsNul,

    #[error("a proposal needs between {min} and {max} options, got {got}")]
    OptionCount { min: usize, max: usize, got: usize },

    #[error("option labels must not be empty")]
    EmptyOptionLabel,

    #[error("deadline {deadline} must be after creation time {created_at}")]
    DeadlineBeforeCreation { created_at: u64, deadline: u64 },

    #[error("participant {0} cannot delegate to themselves")]
    SelfDelegation(String),
}

/// Raised when a [`crate::VoteAction`] cannot be applied to the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("no active vote to remove")]
    NoActiveVote,

    #[error("no active delegation to remove")]
    NoActiveDelegation,

    #[error("action belongs to {actual}, expected {expected}")]
    WrongParticipant { expected: String, actual: String },
}
