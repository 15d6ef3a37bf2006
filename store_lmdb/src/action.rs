//! LMDB implementation of ActionStore.
//!
//! Current standings live under `proposal_be ++ participant`; the log lives
//! under `proposal_be ++ seq_be`. Both are written in one transaction.

use std::collections::BTreeMap;

use heed::RoTxn;
use liquid_store::{ActionStore, StoreError};
use liquid_types::{ActionLogEntry, ParticipantAction, ParticipantId, ProposalId, Timestamp, VoteAction};

use crate::codec::{decode, encode, proposal_participant_key, proposal_seq_key, seq_of};
use crate::{LmdbEnvironment, LmdbError};

impl LmdbEnvironment {
    /// Sequence number the next log entry of `proposal` should get.
    fn next_log_seq(&self, txn: &RoTxn, proposal: ProposalId) -> Result<u64, LmdbError> {
        let prefix = proposal.to_be_bytes();
        let mut iter = self.action_log_db.rev_prefix_iter(txn, &prefix)?;
        match iter.next() {
            Some(entry) => {
                let (key, _) = entry?;
                Ok(seq_of(key)? + 1)
            }
            None => Ok(1),
        }
    }
}

impl ActionStore for LmdbEnvironment {
    fn get_action(
        &self,
        proposal: ProposalId,
        participant: &ParticipantId,
    ) -> Result<Option<ParticipantAction>, StoreError> {
        let key = proposal_participant_key(proposal, participant);
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self.actions_db.get(&rtxn, &key).map_err(LmdbError::from)? {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn current_actions(
        &self,
        proposal: ProposalId,
    ) -> Result<BTreeMap<ParticipantId, ParticipantAction>, StoreError> {
        let prefix = proposal.to_be_bytes();
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut actions = BTreeMap::new();
        for entry in self
            .actions_db
            .prefix_iter(&rtxn, &prefix)
            .map_err(LmdbError::from)?
        {
            let (key, value) = entry.map_err(LmdbError::from)?;
            let raw = std::str::from_utf8(&key[prefix.len()..])
                .map_err(|e| LmdbError::Serialization(e.to_string()))?;
            let participant =
                ParticipantId::new(raw).map_err(|e| LmdbError::Serialization(e.to_string()))?;
            actions.insert(participant, decode(value)?);
        }
        Ok(actions)
    }

    fn record_action(
        &self,
        proposal: ProposalId,
        action: &VoteAction,
        standing: Option<&ParticipantAction>,
        recorded_at: Timestamp,
    ) -> Result<u64, StoreError> {
        let key = proposal_participant_key(proposal, action.participant());
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;

        match standing {
            Some(standing) => self
                .actions_db
                .put(&mut wtxn, &key, &encode(standing)?)
                .map_err(LmdbError::from)?,
            None => {
                self.actions_db
                    .delete(&mut wtxn, &key)
                    .map_err(LmdbError::from)?;
            }
        }

        let seq = self.next_log_seq(&wtxn, proposal)?;
        let entry = ActionLogEntry {
            seq,
            action: action.clone(),
            recorded_at,
        };
        self.action_log_db
            .put(&mut wtxn, &proposal_seq_key(proposal, seq), &encode(&entry)?)
            .map_err(LmdbError::from)?;

        wtxn.commit().map_err(LmdbError::from)?;
        Ok(seq)
    }

    fn action_log(&self, proposal: ProposalId) -> Result<Vec<ActionLogEntry>, StoreError> {
        let prefix = proposal.to_be_bytes();
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut log = Vec::new();
        for entry in self
            .action_log_db
            .prefix_iter(&rtxn, &prefix)
            .map_err(LmdbError::from)?
        {
            let (_, value) = entry.map_err(LmdbError::from)?;
            log.push(decode(value)?);
        }
        Ok(log)
    }
}
