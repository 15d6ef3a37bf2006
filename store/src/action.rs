//! Vote/delegation storage trait.
//!
//! Holds each participant's current standing per proposal plus an
//! append-only log of every accepted action.

use std::collections::BTreeMap;

use liquid_types::{ActionLogEntry, ParticipantAction, ParticipantId, ProposalId, Timestamp, VoteAction};

use crate::StoreError;

pub trait ActionStore {
    fn get_action(
        &self,
        proposal: ProposalId,
        participant: &ParticipantId,
    ) -> Result<Option<ParticipantAction>, StoreError>;

    /// Point-in-time copy of every current standing on `proposal`.
    fn current_actions(
        &self,
        proposal: ProposalId,
    ) -> Result<BTreeMap<ParticipantId, ParticipantAction>, StoreError>;

    /// Replace `action.participant()`'s standing with `standing` (`None`
    /// clears it) and append `action` to the log, atomically. Returns the
    /// log sequence number assigned.
    fn record_action(
        &self,
        proposal: ProposalId,
        action: &VoteAction,
        standing: Option<&ParticipantAction>,
        recorded_at: Timestamp,
    ) -> Result<u64, StoreError>;

    /// The full action log of `proposal`, in sequence order.
    fn action_log(&self, proposal: ProposalId) -> Result<Vec<ActionLogEntry>, StoreError>;
}
