//! Best-effort backup snapshots of raw vote/delegation state.
//!
//! Snapshots are write-once copies kept for disaster recovery; resolution
//! never reads them. A failed snapshot is logged and counted but never
//! reported as an error to whatever triggered it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::Instrument;

use liquid_governance::GovernanceError;
use liquid_store::{BackupSnapshot, SnapshotTrigger};
use liquid_types::{Clock, ProposalId};

use crate::store_call::{unresolved_proposals, BlockingStore};
use crate::{tracing_spans, NodeMetrics};

pub struct BackupCoordinator {
    store: BlockingStore,
    clock: Arc<dyn Clock>,
    metrics: Arc<NodeMetrics>,
}

impl BackupCoordinator {
    pub fn new(store: BlockingStore, clock: Arc<dyn Clock>, metrics: Arc<NodeMetrics>) -> Self {
        Self {
            store,
            clock,
            metrics,
        }
    }

    /// Snapshot the current actions of `proposal`. Returns `None` on failure.
    pub async fn capture(&self, proposal: ProposalId, trigger: SnapshotTrigger) -> Option<BackupSnapshot> {
        let taken_at = self.clock.now();
        let result = self
            .store
            .run("append_snapshot", move |s| {
                let actions = s.current_actions(proposal)?;
                s.append_snapshot(proposal, trigger, taken_at, &actions)
            })
            .instrument(tracing_spans::snapshot_span(proposal, trigger))
            .await;

        match result {
            Ok(snapshot) => {
                self.metrics.snapshots_taken.inc();
                tracing::info!(
                    proposal = %proposal,
                    trigger = trigger.as_str(),
                    sequence = snapshot.sequence,
                    participants = snapshot.actions.len(),
                    "snapshot written"
                );
                Some(snapshot)
            }
            Err(e) => {
                self.metrics.snapshots_failed.inc();
                tracing::warn!(
                    proposal = %proposal,
                    trigger = trigger.as_str(),
                    error = %e,
                    "snapshot failed"
                );
                None
            }
        }
    }

    /// Operator-requested snapshot. Unlike [`capture`](Self::capture) the
    /// caller is told when nothing was written.
    pub async fn manual(&self, proposal: ProposalId) -> Result<BackupSnapshot, GovernanceError> {
        self.store
            .call("get_proposal", move |s| s.get_proposal(proposal))
            .await?
            .ok_or(GovernanceError::ProposalNotFound(proposal))?;
        self.capture(proposal, SnapshotTrigger::Manual)
            .await
            .ok_or_else(|| GovernanceError::StoreUnavailable(format!("snapshot of proposal {proposal} was not written")))
    }

    pub async fn list(&self, proposal: ProposalId) -> Result<Vec<BackupSnapshot>, GovernanceError> {
        self.store
            .call("get_proposal", move |s| s.get_proposal(proposal))
            .await?
            .ok_or(GovernanceError::ProposalNotFound(proposal))?;
        self.store
            .call("list_snapshots", move |s| s.list_snapshots(proposal))
            .await
    }

    /// Snapshot every proposal that has no committed tally yet. Returns the
    /// number of snapshots written.
    pub async fn capture_unresolved(&self, trigger: SnapshotTrigger) -> usize {
        let proposals = match self.store.run("unresolved_proposals", unresolved_proposals).await {
            Ok(proposals) => proposals,
            Err(e) => {
                tracing::warn!(error = %e, "backup pass could not list proposals");
                return 0;
            }
        };

        let mut written = 0;
        for proposal in &proposals {
            if self.capture(proposal.id(), trigger).await.is_some() {
                written += 1;
            }
        }
        tracing::debug!(proposals = proposals.len(), written, "backup pass finished");
        written
    }

    /// Hourly backup loop. Returns when `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>, every: Duration) {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // skip the immediate first tick
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("backup loop shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.capture_unresolved(SnapshotTrigger::Hourly).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liquid_nullables::{NullClock, NullStore};
    use liquid_store::{ActionStore, ProposalStore};
    use liquid_types::{OptionId, OrganizationId, ParticipantAction, ParticipantId, Proposal, Timestamp, VoteAction};

    fn setup() -> (Arc<NullStore>, BackupCoordinator, Arc<NodeMetrics>) {
        let store = Arc::new(NullStore::new());
        let proposal = Proposal::new(
            ProposalId::new(1),
            OrganizationId::new("acme").unwrap(),
            "lunch",
            vec!["a".into(), "b".into()],
            Timestamp::new(0),
            Timestamp::new(100),
        )
        .unwrap();
        store.put_proposal(&proposal).unwrap();
        let who = ParticipantId::new("alice").unwrap();
        store
            .record_action(
                ProposalId::new(1),
                &VoteAction::Vote { participant: who, option: OptionId::new(1) },
                Some(&ParticipantAction::Vote(OptionId::new(1))),
                Timestamp::new(5),
            )
            .unwrap();
        let metrics = Arc::new(NodeMetrics::new());
        let backup = BackupCoordinator::new(
            BlockingStore::new(store.clone(), Duration::from_secs(1)),
            Arc::new(NullClock::new(50)),
            metrics.clone(),
        );
        (store, backup, metrics)
    }

    #[tokio::test]
    async fn capture_copies_current_actions() {
        let (_store, backup, metrics) = setup();
        let snapshot = backup
            .capture(ProposalId::new(1), SnapshotTrigger::PreCalculation)
            .await
            .unwrap();
        assert_eq!(snapshot.sequence, 1);
        assert_eq!(snapshot.actions.len(), 1);
        assert_eq!(snapshot.taken_at, Timestamp::new(50));
        assert_eq!(metrics.snapshots_taken.get(), 1);
    }

    #[tokio::test]
    async fn failed_capture_is_swallowed_and_counted() {
        let (store, backup, metrics) = setup();
        store.fail_snapshots(true);
        assert!(backup.capture(ProposalId::new(1), SnapshotTrigger::Hourly).await.is_none());
        assert_eq!(metrics.snapshots_failed.get(), 1);
    }

    #[tokio::test]
    async fn manual_snapshot_reports_failure_and_missing_proposal() {
        let (store, backup, _) = setup();
        let err = backup.manual(ProposalId::new(9)).await.unwrap_err();
        assert_eq!(err, GovernanceError::ProposalNotFound(ProposalId::new(9)));

        store.fail_snapshots(true);
        assert_eq!(backup.manual(ProposalId::new(1)).await.unwrap_err().kind(), "StoreUnavailable");

        store.fail_snapshots(false);
        let snapshot = backup.manual(ProposalId::new(1)).await.unwrap();
        assert_eq!(snapshot.trigger, SnapshotTrigger::Manual);
        assert_eq!(backup.list(ProposalId::new(1)).await.unwrap(), vec![snapshot]);
    }

    #[tokio::test]
    async fn hourly_pass_covers_unresolved_proposals() {
        let (_store, backup, _) = setup();
        assert_eq!(backup.capture_unresolved(SnapshotTrigger::Hourly).await, 1);
        let listed = backup.list(ProposalId::new(1)).await.unwrap();
        assert_eq!(listed[0].trigger, SnapshotTrigger::Hourly);
    }

    #[tokio::test]
    async fn run_loop_stops_on_shutdown() {
        let (_store, backup, _) = setup();
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(Arc::new(backup).run(rx, Duration::from_secs(3600)));
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop should stop")
            .unwrap();
    }
}
