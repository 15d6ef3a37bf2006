//! Participant (organization membership) storage trait.

use std::collections::BTreeSet;

use liquid_types::{OrganizationId, Participant, ParticipantId};

use crate::StoreError;

pub trait ParticipantStore {
    /// Register a participant. Identifiers are immutable: re-registering an
    /// existing id fails with [`StoreError::Duplicate`].
    fn put_participant(&self, participant: &Participant) -> Result<(), StoreError>;

    fn get_participant(&self, id: &ParticipantId) -> Result<Option<Participant>, StoreError>;

    /// Every participant of `organization`.
    fn members_of(&self, organization: &OrganizationId) -> Result<BTreeSet<ParticipantId>, StoreError>;
}
