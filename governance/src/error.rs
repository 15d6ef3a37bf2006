use liquid_types::{ActionError, OptionId, ProposalId, ValidationError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GovernanceError {
    #[error("proposal {0} not found")]
    ProposalNotFound(ProposalId),

    #[error("participant {participant} delegates to {target}, who is not a participant of this proposal")]
    InvalidDelegationTarget { participant: String, target: String },

    #[error("participant {0} is already registered")]
    ParticipantExists(String),

    #[error("participant {0} is not a member of the proposal's organization")]
    NotAMember(String),

    #[error("participant {participant} voted for option {option}, which the proposal does not offer")]
    InvalidOption { participant: String, option: OptionId },

    #[error("proposal {0} has already been resolved")]
    AlreadyResolved(ProposalId),

    #[error("proposal {0} is already resolving")]
    ConcurrentResolutionInProgress(ProposalId),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("proposal {proposal} is still open until {deadline}")]
    ProposalStillOpen { proposal: ProposalId, deadline: u64 },

    #[error("voting on proposal {0} has closed")]
    VotingClosed(ProposalId),

    #[error("too many actions, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("delegation chain of {length} exceeds the maximum of {max}")]
    ChainTooLong { length: u32, max: u32 },

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl GovernanceError {
    /// Stable, machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProposalNotFound(_) => "ProposalNotFound",
            Self::InvalidDelegationTarget { .. } => "InvalidDelegationTarget",
            Self::ParticipantExists(_) => "ParticipantExists",
            Self::NotAMember(_) => "NotAMember",
            Self::InvalidOption { .. } => "InvalidOption",
            Self::AlreadyResolved(_) => "AlreadyResolved",
            Self::ConcurrentResolutionInProgress(_) => "ConcurrentResolutionInProgress",
            Self::StoreUnavailable(_) => "StoreUnavailable",
            Self::ProposalStillOpen { .. } => "ProposalStillOpen",
            Self::VotingClosed(_) => "VotingClosed",
            Self::RateLimited { .. } => "RateLimited",
            Self::ChainTooLong { .. } => "ChainTooLong",
            Self::Action(_) => "InvalidAction",
            Self::Validation(_) => "ValidationFailed",
        }
    }

    /// Whether the same request may succeed if simply retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentResolutionInProgress(_)
                | Self::StoreUnavailable(_)
                | Self::RateLimited { .. }
        )
    }

    /// Malformed snapshot input. A resolution hitting one of these is
    /// rejected as a whole and recorded with an `error` audit.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidDelegationTarget { .. } | Self::NotAMember(_) | Self::InvalidOption { .. }
        )
    }
}
