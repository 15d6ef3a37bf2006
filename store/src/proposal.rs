//! Proposal storage trait.

use liquid_types::{Proposal, ProposalId};

use crate::StoreError;

pub trait ProposalStore {
    /// Store a new proposal. Proposals are immutable: an existing id fails
    /// with [`StoreError::Duplicate`].
    fn put_proposal(&self, proposal: &Proposal) -> Result<(), StoreError>;

    fn get_proposal(&self, id: ProposalId) -> Result<Option<Proposal>, StoreError>;

    /// All proposals, ordered by id.
    fn list_proposals(&self) -> Result<Vec<Proposal>, StoreError>;

    /// Next unused proposal id.
    fn next_proposal_id(&self) -> Result<ProposalId, StoreError>;
}
