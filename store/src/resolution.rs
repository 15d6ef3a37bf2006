//! Resolution output storage trait (audit records and tallies).

use liquid_governance::{AuditRecord, TallyResult};
use liquid_types::ProposalId;

use crate::StoreError;

pub trait ResolutionStore {
    fn get_audit(&self, proposal: ProposalId) -> Result<Option<AuditRecord>, StoreError>;

    fn get_tally(&self, proposal: ProposalId) -> Result<Option<TallyResult>, StoreError>;

    /// Write `audit` and `tally` for `audit.proposal` in one transaction.
    ///
    /// If a resolved audit already exists and `force` is false, nothing is
    /// written and [`StoreError::Duplicate`] is returned. The check and the
    /// write happen inside the same transaction.
    fn commit_resolution(
        &self,
        audit: &AuditRecord,
        tally: &TallyResult,
        force: bool,
    ) -> Result<(), StoreError>;

    /// Write an `error` audit. Never replaces a resolved audit; returns
    /// `false` when one is already present.
    fn record_failure(&self, audit: &AuditRecord) -> Result<bool, StoreError>;
}
