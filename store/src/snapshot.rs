//! Backup snapshot storage trait.

use std::collections::BTreeMap;

use liquid_types::{ParticipantAction, ParticipantId, ProposalId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// What caused a snapshot to be taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotTrigger {
    Hourly,
    PreCalculation,
    Manual,
}

impl SnapshotTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::PreCalculation => "pre_calculation",
            Self::Manual => "manual",
        }
    }
}

/// Write-once copy of a proposal's raw vote/delegation state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub proposal: ProposalId,
    /// Per-proposal sequence number, assigned by the store.
    pub sequence: u64,
    pub trigger: SnapshotTrigger,
    pub taken_at: Timestamp,
    pub actions: BTreeMap<ParticipantId, ParticipantAction>,
}

pub trait SnapshotStore {
    /// Append a snapshot under the next free sequence number. Existing
    /// snapshots are never touched.
    fn append_snapshot(
        &self,
        proposal: ProposalId,
        trigger: SnapshotTrigger,
        taken_at: Timestamp,
        actions: &BTreeMap<ParticipantId, ParticipantAction>,
    ) -> Result<BackupSnapshot, StoreError>;

    /// All snapshots of `proposal`, oldest first.
    fn list_snapshots(&self, proposal: ProposalId) -> Result<Vec<BackupSnapshot>, StoreError>;
}
