//! Pre-built [`tracing::Span`] constructors for common node operations.
//!
//! Consistent span names and field sets make it easy to filter and
//! correlate one proposal's activity across submissions, backups and
//! resolution runs.

use liquid_store::SnapshotTrigger;
use liquid_types::{ParticipantId, ProposalId};
use tracing::{info_span, Span};

/// Span covering one vote/delegation submission.
pub fn action_span(proposal: ProposalId, participant: &ParticipantId, kind: &str) -> Span {
    info_span!("submit_action", proposal = %proposal, participant = %participant, kind = %kind)
}

/// Span covering a full resolution run of one proposal.
pub fn resolution_span(proposal: ProposalId, force: bool, trigger: &str) -> Span {
    info_span!("resolve", proposal = %proposal, force, trigger = %trigger)
}

/// Span covering one backup snapshot write.
pub fn snapshot_span(proposal: ProposalId, trigger: SnapshotTrigger) -> Span {
    info_span!("snapshot", proposal = %proposal, trigger = trigger.as_str())
}

/// Span covering one deadline sweep pass.
pub fn sweep_span() -> Span {
    info_span!("deadline_sweep")
}

/// Span covering a single admin RPC request.
pub fn rpc_span(action: &str) -> Span {
    info_span!("rpc", action = %action)
}
