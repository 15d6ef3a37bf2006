//! Abstract storage traits for liquid-democracy voting.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.

pub mod action;
pub mod error;
pub mod meta;
pub mod participant;
pub mod proposal;
pub mod resolution;
pub mod snapshot;

pub use action::ActionStore;
pub use error::StoreError;
pub use meta::MetaStore;
pub use participant::ParticipantStore;
pub use proposal::ProposalStore;
pub use resolution::ResolutionStore;
pub use snapshot::{BackupSnapshot, SnapshotStore, SnapshotTrigger};

/// Everything the voting services need from a backend.
pub trait VoteStore:
    ParticipantStore + ProposalStore + ActionStore + ResolutionStore + SnapshotStore + Send + Sync
{
}

impl<T> VoteStore for T where
    T: ParticipantStore + ProposalStore + ActionStore + ResolutionStore + SnapshotStore + Send + Sync
{
}
