//! End-to-end resolution of one proposal.
//!
//! A run takes a best-effort pre-calculation snapshot, reads a point-in-time
//! copy of the proposal's actions, validates it, resolves delegations,
//! tallies, and commits the audit and the tally in one store transaction.
//! Nothing is written for a run that fails part-way except, when possible,
//! an `Error` audit, which never replaces a successful one.

use std::sync::Arc;
use std::time::Instant;

use prometheus::IntGauge;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use liquid_governance::{
    ActionSnapshot, AuditRecord, DelegationResolver, GovernanceError, TallyEngine, TallyResult,
};
use liquid_store::{SnapshotTrigger, StoreError};
use liquid_types::{Clock, ProposalId, Timestamp};

use crate::backup::BackupCoordinator;
use crate::locks::InFlight;
use crate::store_call::{unavailable, BlockingStore};
use crate::{tracing_spans, NodeMetrics};

/// What asked for a resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveTrigger {
    /// The deadline sweeper found the proposal closed and unresolved.
    Deadline,
    /// An operator asked explicitly.
    Admin,
}

impl ResolveTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deadline => "deadline",
            Self::Admin => "admin",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRequest {
    /// Overwrite an existing resolution instead of rejecting the run.
    pub force: bool,
    pub trigger: ResolveTrigger,
}

impl ResolveRequest {
    pub fn deadline() -> Self {
        Self {
            force: false,
            trigger: ResolveTrigger::Deadline,
        }
    }

    pub fn admin(force: bool) -> Self {
        Self {
            force,
            trigger: ResolveTrigger::Admin,
        }
    }
}

/// The committed result of a successful run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub audit: AuditRecord,
    pub tally: TallyResult,
}

pub struct ResolutionCoordinator {
    store: BlockingStore,
    clock: Arc<dyn Clock>,
    backup: Arc<BackupCoordinator>,
    metrics: Arc<NodeMetrics>,
    in_flight: InFlight<ProposalId>,
}

/// Keeps the in-flight gauge honest even if a run is dropped mid-way.
struct GaugeGuard<'a>(&'a IntGauge);

impl<'a> GaugeGuard<'a> {
    fn new(gauge: &'a IntGauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.0.dec();
    }
}

impl ResolutionCoordinator {
    pub fn new(
        store: BlockingStore,
        clock: Arc<dyn Clock>,
        backup: Arc<BackupCoordinator>,
        metrics: Arc<NodeMetrics>,
    ) -> Self {
        Self {
            store,
            clock,
            backup,
            metrics,
            in_flight: InFlight::new(),
        }
    }

    /// Whether a run for `proposal` is currently executing.
    pub fn is_resolving(&self, proposal: ProposalId) -> bool {
        self.in_flight.contains(&proposal)
    }

    /// Resolve `proposal` and commit its audit and tally.
    ///
    /// At most one run per proposal executes at a time; a second trigger
    /// fails fast with [`GovernanceError::ConcurrentResolutionInProgress`].
    ///
    /// A commit that outlives the store timeout is rechecked once; if it
    /// landed the run succeeds, otherwise it fails as `StoreUnavailable`.
    pub async fn resolve(
        &self,
        proposal: ProposalId,
        request: ResolveRequest,
    ) -> Result<ResolutionOutcome, GovernanceError> {
        let Some(_claim) = self.in_flight.try_enter(proposal) else {
            self.metrics.resolutions_rejected.inc();
            tracing::info!(proposal = %proposal, trigger = request.trigger.as_str(), "resolution already in flight");
            return Err(GovernanceError::ConcurrentResolutionInProgress(proposal));
        };
        let _gauge = GaugeGuard::new(&self.metrics.resolutions_in_flight);

        let span = tracing_spans::resolution_span(proposal, request.force, request.trigger.as_str());
        let started = Instant::now();
        let result = self.run(proposal, request, started).instrument(span).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(outcome) => {
                self.metrics.resolutions_completed.inc();
                self.metrics.resolution_duration_ms.observe(elapsed_ms);
                let stats = &outcome.audit.stats;
                tracing::info!(
                    proposal = %proposal,
                    status = outcome.audit.status.as_str(),
                    forced = outcome.audit.forced,
                    participants = stats.participants,
                    direct_voters = stats.direct_voters,
                    delegators = stats.delegators,
                    cycles = stats.cycles,
                    orphaned_chains = stats.orphaned_chains,
                    longest_chain = stats.longest_chain,
                    total_cast = outcome.tally.total_cast,
                    outcome = ?outcome.tally.outcome,
                    duration_ms = outcome.audit.duration_ms,
                    "proposal resolved"
                );
            }
            Err(
                e @ (GovernanceError::AlreadyResolved(_)
                | GovernanceError::ProposalStillOpen { .. }
                | GovernanceError::ProposalNotFound(_)),
            ) => {
                self.metrics.resolutions_rejected.inc();
                tracing::info!(proposal = %proposal, kind = e.kind(), "resolution rejected");
            }
            Err(e) => {
                self.metrics.resolutions_failed.inc();
                self.metrics.resolution_duration_ms.observe(elapsed_ms);
                tracing::warn!(proposal = %proposal, kind = e.kind(), error = %e, "resolution failed");
            }
        }
        result
    }

    async fn run(
        &self,
        proposal_id: ProposalId,
        request: ResolveRequest,
        started: Instant,
    ) -> Result<ResolutionOutcome, GovernanceError> {
        let resolved_at = self.clock.now();
        let proposal = self
            .store
            .call("get_proposal", move |s| s.get_proposal(proposal_id))
            .await?
            .ok_or(GovernanceError::ProposalNotFound(proposal_id))?;

        if !proposal.is_closed(resolved_at) {
            return Err(GovernanceError::ProposalStillOpen {
                proposal: proposal_id,
                deadline: proposal.deadline().as_secs(),
            });
        }
        if !request.force {
            let existing = self
                .store
                .call("get_audit", move |s| s.get_audit(proposal_id))
                .await?;
            if existing.is_some_and(|audit| audit.status.is_resolved()) {
                return Err(GovernanceError::AlreadyResolved(proposal_id));
            }
        }

        let snapshot_written = self
            .backup
            .capture(proposal_id, SnapshotTrigger::PreCalculation)
            .await
            .is_some();

        // Actions first: membership only grows, so members read afterwards
        // cover every actor seen in the action read.
        let organization = proposal.organization().clone();
        let read = self
            .store
            .call("read_snapshot", move |s| {
                let actions = s.current_actions(proposal_id)?;
                let members = s.members_of(&organization)?;
                Ok((members, actions))
            })
            .await;
        let (members, actions) = match read {
            Ok(read) => read,
            Err(e) => return Err(self.fail(proposal_id, resolved_at, started, e).await),
        };
        tracing::debug!(participants = actions.len(), members = members.len(), "action snapshot read");

        let computed = ActionSnapshot::new(proposal, members, actions, resolved_at).and_then(|snapshot| {
            let resolution = DelegationResolver::resolve_snapshot(&snapshot);
            let tally = TallyEngine::tally(snapshot.proposal(), &resolution)?;
            Ok((resolution, tally))
        });
        let (resolution, tally) = match computed {
            Ok(computed) => computed,
            Err(e) => {
                if e.is_malformed_input() {
                    tracing::error!(proposal = %proposal_id, error = %e, "stored actions failed validation");
                }
                return Err(self.fail(proposal_id, resolved_at, started, e).await);
            }
        };

        let audit = AuditRecord::resolved(
            proposal_id,
            resolved_at,
            started.elapsed(),
            &resolution,
            snapshot_written,
            request.force,
        );
        let (to_commit, tally_to_commit) = (audit.clone(), tally.clone());
        let force = request.force;
        match self
            .store
            .run("commit_resolution", move |s| {
                s.commit_resolution(&to_commit, &tally_to_commit, force)
            })
            .await
        {
            Ok(()) => Ok(ResolutionOutcome { audit, tally }),
            // Someone committed between our check and our write.
            Err(StoreError::Duplicate(_)) => Err(GovernanceError::AlreadyResolved(proposal_id)),
            Err(e @ StoreError::Timeout { .. }) => {
                if self.landed(&audit).await {
                    tracing::info!(proposal = %proposal_id, "commit finished after its timeout");
                    Ok(ResolutionOutcome { audit, tally })
                } else {
                    Err(self.fail(proposal_id, resolved_at, started, unavailable(e)).await)
                }
            }
            Err(e) => Err(self.fail(proposal_id, resolved_at, started, unavailable(e)).await),
        }
    }

    /// Whether `audit` is what the store now holds. A timed-out commit keeps
    /// running on the blocking pool and may still land; a commit still in
    /// progress at this read is reported as failed.
    async fn landed(&self, audit: &AuditRecord) -> bool {
        let proposal = audit.proposal;
        match self.store.run("get_audit", move |s| s.get_audit(proposal)).await {
            Ok(stored) => stored.as_ref() == Some(audit),
            Err(e) => {
                tracing::debug!(proposal = %proposal, error = %e, "could not recheck timed-out commit");
                false
            }
        }
    }

    /// Record an `Error` audit for a run that got past its preconditions.
    /// Best-effort: the original error is returned either way.
    async fn fail(
        &self,
        proposal: ProposalId,
        resolved_at: Timestamp,
        started: Instant,
        error: GovernanceError,
    ) -> GovernanceError {
        let audit = AuditRecord::failed(proposal, resolved_at, started.elapsed(), &error);
        match self
            .store
            .run("record_failure", move |s| s.record_failure(&audit))
            .await
        {
            Ok(true) => tracing::debug!(proposal = %proposal, "error audit recorded"),
            Ok(false) => tracing::debug!(proposal = %proposal, "error audit skipped, proposal already resolved"),
            Err(e) => tracing::warn!(proposal = %proposal, error = %e, "could not record error audit"),
        }
        error
    }

    /// The latest audit of `proposal`, if it was ever resolved or attempted.
    pub async fn audit(&self, proposal: ProposalId) -> Result<Option<AuditRecord>, GovernanceError> {
        self.require_proposal(proposal).await?;
        self.store
            .call("get_audit", move |s| s.get_audit(proposal))
            .await
    }

    /// The committed tally of `proposal`, if resolved.
    pub async fn tally(&self, proposal: ProposalId) -> Result<Option<TallyResult>, GovernanceError> {
        self.require_proposal(proposal).await?;
        self.store
            .call("get_tally", move |s| s.get_tally(proposal))
            .await
    }

    async fn require_proposal(&self, proposal: ProposalId) -> Result<(), GovernanceError> {
        self.store
            .call("get_proposal", move |s| s.get_proposal(proposal))
            .await?
            .map(|_| ())
            .ok_or(GovernanceError::ProposalNotFound(proposal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_requests_never_force() {
        let request = ResolveRequest::deadline();
        assert!(!request.force);
        assert_eq!(request.trigger.as_str(), "deadline");
        assert!(ResolveRequest::admin(true).force);
    }

    #[test]
    fn gauge_guard_restores_gauge() {
        let metrics = NodeMetrics::new();
        {
            let _guard = GaugeGuard::new(&metrics.resolutions_in_flight);
            assert_eq!(metrics.resolutions_in_flight.get(), 1);
        }
        assert_eq!(metrics.resolutions_in_flight.get(), 0);
    }
}
