//! Bounded, off-runtime access to the vote store.
//!
//! Backends like LMDB block the calling thread, so every call runs on the
//! blocking pool and is abandoned after a timeout instead of hanging the
//! caller.

use std::sync::Arc;
use std::time::Duration;

use liquid_governance::GovernanceError;
use liquid_store::{StoreError, VoteStore};
use liquid_types::Proposal;

/// Shared handle to whichever backend the node runs on.
pub type SharedStore = Arc<dyn VoteStore>;

#[derive(Clone)]
pub struct BlockingStore {
    store: SharedStore,
    timeout: Duration,
}

impl BlockingStore {
    pub fn new(store: SharedStore, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `f` against the store on the blocking pool.
    ///
    /// A panicked task surfaces as [`StoreError::Backend`]. A timed-out call
    /// is not cancelled; its result is discarded.
    pub async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&dyn VoteStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || f(&*store));
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(StoreError::Backend(format!("{op}: {join_error}"))),
            Err(_) => {
                tracing::warn!(op, timeout_ms = self.timeout.as_millis() as u64, "store call timed out");
                Err(StoreError::Timeout {
                    op,
                    after_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }

    /// [`run`](Self::run), with every failure reported as
    /// [`GovernanceError::StoreUnavailable`].
    pub async fn call<T, F>(&self, op: &'static str, f: F) -> Result<T, GovernanceError>
    where
        F: FnOnce(&dyn VoteStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        self.run(op, f).await.map_err(unavailable)
    }
}

/// Proposals without a committed tally, in id order. A proposal whose only
/// audit is an `Error` one still counts as unresolved.
pub fn unresolved_proposals(store: &dyn VoteStore) -> Result<Vec<Proposal>, StoreError> {
    let mut unresolved = Vec::new();
    for proposal in store.list_proposals()? {
        let resolved = store
            .get_audit(proposal.id())?
            .is_some_and(|audit| audit.status.is_resolved());
        if !resolved {
            unresolved.push(proposal);
        }
    }
    Ok(unresolved)
}

pub(crate) fn unavailable(error: StoreError) -> GovernanceError {
    GovernanceError::StoreUnavailable(error.to_string())
}
