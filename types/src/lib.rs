//! Fundamental types for liquid-democracy voting.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! identifiers, timestamps, proposals, and the participant action model.

pub mod action;
pub mod error;
pub mod ids;
pub mod proposal;
pub mod time;

pub use action::{ActionLogEntry, Delegation, ParticipantAction, VoteAction};
pub use error::{ActionError, ValidationError};
pub use ids::{OptionId, OrganizationId, ParticipantId, ProposalId, MAX_ID_BYTES};
pub use proposal::{Participant, Proposal, MAX_OPTIONS, MIN_OPTIONS};
pub use time::{Clock, SystemClock, Timestamp};
