//! LMDB implementation of ParticipantStore.
//!
//! `participants` maps id → record; `members` holds one empty-valued key
//! `organization ++ 0x00 ++ participant` per membership, so listing an
//! organization is a prefix scan.

use std::collections::BTreeSet;

use liquid_store::{ParticipantStore, StoreError};
use liquid_types::{OrganizationId, Participant, ParticipantId};

use crate::codec::{decode, encode, member_key, organization_prefix};
use crate::{LmdbEnvironment, LmdbError};

impl ParticipantStore for LmdbEnvironment {
    fn put_participant(&self, participant: &Participant) -> Result<(), StoreError> {
        let key = participant.id.as_str().as_bytes();
        let value = encode(participant)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .participants_db
            .get(&wtxn, key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(format!("participant {}", participant.id)));
        }
        self.participants_db
            .put(&mut wtxn, key, &value)
            .map_err(LmdbError::from)?;
        self.members_db
            .put(&mut wtxn, &member_key(&participant.organization, &participant.id), &[])
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_participant(&self, id: &ParticipantId) -> Result<Option<Participant>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .participants_db
            .get(&rtxn, id.as_str().as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn members_of(&self, organization: &OrganizationId) -> Result<BTreeSet<ParticipantId>, StoreError> {
        let prefix = organization_prefix(organization);
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut members = BTreeSet::new();
        for entry in self
            .members_db
            .prefix_iter(&rtxn, &prefix)
            .map_err(LmdbError::from)?
        {
            let (key, _) = entry.map_err(LmdbError::from)?;
            let raw = std::str::from_utf8(&key[prefix.len()..])
                .map_err(|e| LmdbError::Serialization(e.to_string()))?;
            let id = ParticipantId::new(raw).map_err(|e| LmdbError::Serialization(e.to_string()))?;
            members.insert(id);
        }
        Ok(members)
    }
}
