//! Periodic resolution of proposals whose deadline has passed.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::Instrument;

use liquid_governance::GovernanceError;
use liquid_types::Clock;

use crate::resolution::{ResolutionCoordinator, ResolveRequest};
use crate::store_call::BlockingStore;
use crate::tracing_spans;
use crate::voting::VotingService;

/// What one sweep pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Closed proposals without a committed tally that a scheduled run may retry.
    pub due: usize,
    pub resolved: usize,
    /// Already resolving or resolved elsewhere.
    pub skipped: usize,
    pub failed: usize,
    /// Closed proposals whose last run failed on bad data; only an admin
    /// resolve picks these up again.
    pub held: usize,
}

pub struct DeadlineSweeper {
    store: BlockingStore,
    clock: Arc<dyn Clock>,
    coordinator: Arc<ResolutionCoordinator>,
    voting: Arc<VotingService>,
}

impl DeadlineSweeper {
    pub fn new(
        store: BlockingStore,
        clock: Arc<dyn Clock>,
        coordinator: Arc<ResolutionCoordinator>,
        voting: Arc<VotingService>,
    ) -> Self {
        Self {
            store,
            clock,
            coordinator,
            voting,
        }
    }

    /// Resolve every due proposal, one task per proposal.
    pub async fn sweep_once(&self) -> Result<SweepReport, GovernanceError> {
        let now = self.clock.now();
        let (due, held) = self
            .store
            .call("due_proposals", move |s| {
                let mut due = Vec::new();
                let mut held = 0;
                for proposal in s.list_proposals()? {
                    if !proposal.is_closed(now) {
                        continue;
                    }
                    match s.get_audit(proposal.id())? {
                        Some(audit) if audit.status.is_resolved() => {}
                        Some(audit) if audit.awaits_operator() => held += 1,
                        _ => due.push(proposal.id()),
                    }
                }
                Ok((due, held))
            })
            .await?;

        let mut report = SweepReport {
            due: due.len(),
            held,
            ..SweepReport::default()
        };

        let mut tasks = JoinSet::new();
        for proposal in due {
            let coordinator = Arc::clone(&self.coordinator);
            tasks.spawn(async move {
                let result = coordinator.resolve(proposal, ResolveRequest::deadline()).await;
                (proposal, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(_))) => report.resolved += 1,
                Ok((
                    _,
                    Err(
                        GovernanceError::ConcurrentResolutionInProgress(_)
                        | GovernanceError::AlreadyResolved(_),
                    ),
                )) => report.skipped += 1,
                // Already logged by the coordinator.
                Ok((_, Err(_))) => report.failed += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(error = %e, "resolution task panicked");
                }
            }
        }

        self.voting.cleanup().await;
        Ok(report)
    }

    /// Sweep every `every` until `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>, every: Duration) {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("deadline sweeper shutting down");
                    break;
                }
                _ = interval.tick() => {
                    match self.sweep_once().instrument(tracing_spans::sweep_span()).await {
                        Ok(report) if report.due > 0 => tracing::info!(
                            due = report.due,
                            held = report.held,
                            resolved = report.resolved,
                            skipped = report.skipped,
                            failed = report.failed,
                            "deadline sweep finished"
                        ),
                        Ok(report) => tracing::trace!(held = report.held, "deadline sweep: nothing due"),
                        Err(e) => tracing::warn!(error = %e, "deadline sweep could not list proposals"),
                    }
                }
            }
        }
    }
}
