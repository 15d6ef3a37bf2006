//! LMDB implementation of ProposalStore.

use liquid_store::{ProposalStore, StoreError};
use liquid_types::{Proposal, ProposalId};

use crate::codec::{decode, encode};
use crate::{LmdbEnvironment, LmdbError};

impl ProposalStore for LmdbEnvironment {
    fn put_proposal(&self, proposal: &Proposal) -> Result<(), StoreError> {
        let key = proposal.id().to_be_bytes();
        let value = encode(proposal)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .proposals_db
            .get(&wtxn, &key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(format!("proposal {}", proposal.id())));
        }
        self.proposals_db
            .put(&mut wtxn, &key, &value)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_proposal(&self, id: ProposalId) -> Result<Option<Proposal>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .proposals_db
            .get(&rtxn, &id.to_be_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn list_proposals(&self) -> Result<Vec<Proposal>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut proposals = Vec::new();
        for entry in self.proposals_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_, value) = entry.map_err(LmdbError::from)?;
            proposals.push(decode(value)?);
        }
        Ok(proposals)
    }

    fn next_proposal_id(&self) -> Result<ProposalId, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let last = self.proposals_db.last(&rtxn).map_err(LmdbError::from)?;
        match last {
            Some((key, _)) => {
                let bytes: [u8; 8] = key
                    .try_into()
                    .map_err(|_| LmdbError::Serialization("malformed proposal key".to_string()))?;
                Ok(ProposalId::new(ProposalId::from_be_bytes(bytes).as_u64() + 1))
            }
            None => Ok(ProposalId::new(1)),
        }
    }
}
