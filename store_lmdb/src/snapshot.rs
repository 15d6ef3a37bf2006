//! LMDB implementation of SnapshotStore.

use std::collections::BTreeMap;

use liquid_store::{BackupSnapshot, SnapshotStore, SnapshotTrigger, StoreError};
use liquid_types::{ParticipantAction, ParticipantId, ProposalId, Timestamp};

use crate::codec::{decode, encode, proposal_seq_key, seq_of};
use crate::{LmdbEnvironment, LmdbError};

impl SnapshotStore for LmdbEnvironment {
    fn append_snapshot(
        &self,
        proposal: ProposalId,
        trigger: SnapshotTrigger,
        taken_at: Timestamp,
        actions: &BTreeMap<ParticipantId, ParticipantAction>,
    ) -> Result<BackupSnapshot, StoreError> {
        let prefix = proposal.to_be_bytes();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;

        let sequence = {
            let mut iter = self
                .snapshots_db
                .rev_prefix_iter(&wtxn, &prefix)
                .map_err(LmdbError::from)?;
            match iter.next() {
                Some(entry) => {
                    let (key, _) = entry.map_err(LmdbError::from)?;
                    seq_of(key)? + 1
                }
                None => 1,
            }
        };

        let snapshot = BackupSnapshot {
            proposal,
            sequence,
            trigger,
            taken_at,
            actions: actions.clone(),
        };
        self.snapshots_db
            .put(&mut wtxn, &proposal_seq_key(proposal, sequence), &encode(&snapshot)?)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(snapshot)
    }

    fn list_snapshots(&self, proposal: ProposalId) -> Result<Vec<BackupSnapshot>, StoreError> {
        let prefix = proposal.to_be_bytes();
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut snapshots = Vec::new();
        for entry in self
            .snapshots_db
            .prefix_iter(&rtxn, &prefix)
            .map_err(LmdbError::from)?
        {
            let (_, value) = entry.map_err(LmdbError::from)?;
            snapshots.push(decode(value)?);
        }
        Ok(snapshots)
    }
}
