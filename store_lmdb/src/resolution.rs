//! LMDB implementation of ResolutionStore.
//!
//! The audit and the tally of a proposal are written in one write
//! transaction, and the "already resolved" check reads inside that same
//! transaction, so two committers can never both succeed.

use heed::RoTxn;
use liquid_governance::{AuditRecord, TallyResult};
use liquid_store::{ResolutionStore, StoreError};
use liquid_types::ProposalId;

use crate::codec::{decode, encode};
use crate::{LmdbEnvironment, LmdbError};

impl LmdbEnvironment {
    fn read_audit(&self, txn: &RoTxn, proposal: ProposalId) -> Result<Option<AuditRecord>, LmdbError> {
        match self.audits_db.get(txn, &proposal.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }
}

impl ResolutionStore for LmdbEnvironment {
    fn get_audit(&self, proposal: ProposalId) -> Result<Option<AuditRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.read_audit(&rtxn, proposal)?)
    }

    fn get_tally(&self, proposal: ProposalId) -> Result<Option<TallyResult>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .tallies_db
            .get(&rtxn, &proposal.to_be_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn commit_resolution(
        &self,
        audit: &AuditRecord,
        tally: &TallyResult,
        force: bool,
    ) -> Result<(), StoreError> {
        let key = audit.proposal.to_be_bytes();
        let audit_bytes = encode(audit)?;
        let tally_bytes = encode(tally)?;

        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if let Some(existing) = self.read_audit(&wtxn, audit.proposal)? {
            if existing.status.is_resolved() && !force {
                // Dropping the transaction aborts it.
                return Err(StoreError::Duplicate(format!("audit for proposal {}", audit.proposal)));
            }
        }
        self.audits_db
            .put(&mut wtxn, &key, &audit_bytes)
            .map_err(LmdbError::from)?;
        self.tallies_db
            .put(&mut wtxn, &key, &tally_bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;

        tracing::debug!(proposal = %audit.proposal, status = audit.status.as_str(), "resolution committed");
        Ok(())
    }

    fn record_failure(&self, audit: &AuditRecord) -> Result<bool, StoreError> {
        let key = audit.proposal.to_be_bytes();
        let audit_bytes = encode(audit)?;

        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if let Some(existing) = self.read_audit(&wtxn, audit.proposal)? {
            if existing.status.is_resolved() {
                return Ok(false);
            }
        }
        self.audits_db
            .put(&mut wtxn, &key, &audit_bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }
}
