//! The participant action model.
//!
//! A participant holds at most one [`ParticipantAction`] per proposal: either a
//! direct vote or a delegation, never both. Every incoming [`VoteAction`]
//! supersedes whatever was there through [`ParticipantAction::transition`].

use serde::{Deserialize, Serialize};

use crate::{ActionError, OptionId, ParticipantId, Timestamp, ValidationError};

/// A delegation edge `from → to`. Cannot be constructed with `from == to`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDelegation")]
pub struct Delegation {
    from: ParticipantId,
    to: ParticipantId,
}

#[derive(Deserialize)]
struct RawDelegation {
    from: ParticipantId,
    to: ParticipantId,
}

impl TryFrom<RawDelegation> for Delegation {
    type Error = ValidationError;

    fn try_from(raw: RawDelegation) -> Result<Self, Self::Error> {
        Self::new(raw.from, raw.to)
    }
}

impl Delegation {
    pub fn new(from: ParticipantId, to: ParticipantId) -> Result<Self, ValidationError> {
        if from == to {
            return Err(ValidationError::SelfDelegation(from.to_string()));
        }
        Ok(Self { from, to })
    }

    pub fn from(&self) -> &ParticipantId {
        &self.from
    }

    pub fn to(&self) -> &ParticipantId {
        &self.to
    }
}

/// A request to change a participant's standing on a proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteAction {
    Vote {
        participant: ParticipantId,
        option: OptionId,
    },
    RemoveVote {
        participant: ParticipantId,
    },
    Delegate(Delegation),
    RemoveDelegation {
        participant: ParticipantId,
    },
}

impl VoteAction {
    /// The participant whose standing this action changes.
    pub fn participant(&self) -> &ParticipantId {
        match self {
            Self::Vote { participant, .. }
            | Self::RemoveVote { participant }
            | Self::RemoveDelegation { participant } => participant,
            Self::Delegate(d) => d.from(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Vote { .. } => "vote",
            Self::RemoveVote { .. } => "remove_vote",
            Self::Delegate(_) => "delegate",
            Self::RemoveDelegation { .. } => "remove_delegation",
        }
    }
}

/// A participant's active standing on one proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantAction {
    Vote(OptionId),
    Delegate(ParticipantId),
}

impl ParticipantAction {
    /// Apply `action` on top of `current` and return the new standing.
    ///
    /// `Vote` and `Delegate` replace anything that was there. The remove
    /// actions only clear the matching kind.
    pub fn transition(
        current: Option<&ParticipantAction>,
        action: &VoteAction,
    ) -> Result<Option<ParticipantAction>, ActionError> {
        match action {
            VoteAction::Vote { option, .. } => Ok(Some(ParticipantAction::Vote(*option))),
            VoteAction::Delegate(d) => Ok(Some(ParticipantAction::Delegate(d.to().clone()))),
            VoteAction::RemoveVote { .. } => match current {
                Some(ParticipantAction::Vote(_)) => Ok(None),
                _ => Err(ActionError::NoActiveVote),
            },
            VoteAction::RemoveDelegation { .. } => match current {
                Some(ParticipantAction::Delegate(_)) => Ok(None),
                _ => Err(ActionError::NoActiveDelegation),
            },
        }
    }

    pub fn delegate_target(&self) -> Option<&ParticipantId> {
        match self {
            Self::Delegate(target) => Some(target),
            Self::Vote(_) => None,
        }
    }
}

/// One line of a proposal's append-only action log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub seq: u64,
    pub action: VoteAction,
    pub recorded_at: Timestamp,
}
