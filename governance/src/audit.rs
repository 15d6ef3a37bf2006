//! Immutable record of one resolution run.

use std::time::Duration;

use liquid_types::{ParticipantId, ProposalId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::{GovernanceError, Resolution, ResolutionResult, ResolutionStats};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditStatus {
    /// Tally committed and the pre-calculation snapshot was written.
    Completed,
    /// Tally committed, but the pre-calculation snapshot failed.
    Partial,
    /// The run was rejected; no tally exists.
    Error,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Error => "error",
        }
    }

    /// Whether a tally was committed alongside this audit.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Completed | Self::Partial)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub proposal: ProposalId,
    pub resolved_at: Timestamp,
    pub duration_ms: u64,
    pub status: AuditStatus,
    pub stats: ResolutionStats,
    /// Per-participant classification, sorted by participant.
    pub classifications: Vec<(ParticipantId, ResolutionResult)>,
    /// Error kind and message for `Error` audits.
    pub error: Option<String>,
    /// Whether this run overwrote an earlier resolution.
    pub forced: bool,
    /// For `Error` audits: whether re-running unchanged may succeed.
    pub retryable: bool,
}

impl AuditRecord {
    pub fn resolved(
        proposal: ProposalId,
        resolved_at: Timestamp,
        elapsed: Duration,
        resolution: &Resolution,
        snapshot_written: bool,
        forced: bool,
    ) -> Self {
        Self {
            proposal,
            resolved_at,
            duration_ms: elapsed.as_millis() as u64,
            status: if snapshot_written {
                AuditStatus::Completed
            } else {
                AuditStatus::Partial
            },
            stats: resolution.stats().clone(),
            classifications: resolution
                .results()
                .iter()
                .map(|(p, r)| (p.clone(), r.clone()))
                .collect(),
            error: None,
            forced,
            retryable: false,
        }
    }

    pub fn failed(
        proposal: ProposalId,
        resolved_at: Timestamp,
        elapsed: Duration,
        error: &GovernanceError,
    ) -> Self {
        Self {
            proposal,
            resolved_at,
            duration_ms: elapsed.as_millis() as u64,
            status: AuditStatus::Error,
            stats: ResolutionStats::default(),
            classifications: Vec::new(),
            error: Some(format!("{}: {}", error.kind(), error)),
            forced: false,
            retryable: error.is_retryable(),
        }
    }

    /// A failed run that will fail the same way until the stored data is
    /// repaired. Scheduled runs leave these to an explicit admin resolve.
    pub fn awaits_operator(&self) -> bool {
        self.status == AuditStatus::Error && !self.retryable
    }
}
