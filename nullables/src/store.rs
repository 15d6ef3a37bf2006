//! Nullable store: thread-safe in-memory storage for testing.
//!
//! All state sits behind one mutex so multi-record writes are atomic, the
//! same guarantee the LMDB backend gets from a single write transaction.
//! Outages, snapshot failures and slow calls can be switched on at runtime.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use liquid_governance::{AuditRecord, TallyResult};
use liquid_store::{
    ActionStore, BackupSnapshot, MetaStore, ParticipantStore, ProposalStore, ResolutionStore,
    SnapshotStore, SnapshotTrigger, StoreError,
};
use liquid_types::{
    ActionLogEntry, OrganizationId, Participant, ParticipantAction, ParticipantId, Proposal,
    ProposalId, Timestamp, VoteAction,
};

#[derive(Default)]
struct State {
    meta: HashMap<String, Vec<u8>>,
    participants: BTreeMap<ParticipantId, Participant>,
    proposals: BTreeMap<ProposalId, Proposal>,
    actions: BTreeMap<ProposalId, BTreeMap<ParticipantId, ParticipantAction>>,
    action_log: BTreeMap<ProposalId, Vec<ActionLogEntry>>,
    audits: BTreeMap<ProposalId, AuditRecord>,
    tallies: BTreeMap<ProposalId, TallyResult>,
    snapshots: BTreeMap<ProposalId, Vec<BackupSnapshot>>,
}

/// An in-memory implementation of every store trait.
#[derive(Default)]
pub struct NullStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
    snapshots_failing: AtomicBool,
    commits_failing: AtomicBool,
    latency_ms: AtomicU64,
    commit_lag_ms: AtomicU64,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with [`StoreError::Backend`] until switched off.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make only `append_snapshot` fail.
    pub fn fail_snapshots(&self, failing: bool) {
        self.snapshots_failing.store(failing, Ordering::SeqCst);
    }

    /// Make only `commit_resolution` fail.
    pub fn fail_commits(&self, failing: bool) {
        self.commits_failing.store(failing, Ordering::SeqCst);
    }

    /// Block `commit_resolution` for `lag` after its write is applied.
    pub fn set_commit_lag(&self, lag: Duration) {
        self.commit_lag_ms.store(lag.as_millis() as u64, Ordering::SeqCst);
    }

    /// Block every call for `latency` before it runs.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            std::thread::sleep(Duration::from_millis(latency));
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("null store unavailable".into()));
        }
        Ok(self.state.lock().unwrap())
    }
}

impl MetaStore for NullStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.state()?.meta.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.state()?.meta.get(key).cloned())
    }

    fn get_schema_version(&self) -> Result<u32, StoreError> {
        Ok(self
            .get_meta("schema_version")?
            .and_then(|v| v.try_into().ok())
            .map(u32::from_be_bytes)
            .unwrap_or(0))
    }

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError> {
        self.put_meta("schema_version", &version.to_be_bytes())
    }
}

impl ParticipantStore for NullStore {
    fn put_participant(&self, participant: &Participant) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if state.participants.contains_key(&participant.id) {
            return Err(StoreError::Duplicate(format!("participant {}", participant.id)));
        }
        state
            .participants
            .insert(participant.id.clone(), participant.clone());
        Ok(())
    }

    fn get_participant(&self, id: &ParticipantId) -> Result<Option<Participant>, StoreError> {
        Ok(self.state()?.participants.get(id).cloned())
    }

    fn members_of(&self, organization: &OrganizationId) -> Result<BTreeSet<ParticipantId>, StoreError> {
        Ok(self
            .state()?
            .participants
            .values()
            .filter(|p| &p.organization == organization)
            .map(|p| p.id.clone())
            .collect())
    }
}

impl ProposalStore for NullStore {
    fn put_proposal(&self, proposal: &Proposal) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if state.proposals.contains_key(&proposal.id()) {
            return Err(StoreError::Duplicate(format!("proposal {}", proposal.id())));
        }
        state.proposals.insert(proposal.id(), proposal.clone());
        Ok(())
    }

    fn get_proposal(&self, id: ProposalId) -> Result<Option<Proposal>, StoreError> {
        Ok(self.state()?.proposals.get(&id).cloned())
    }

    fn list_proposals(&self) -> Result<Vec<Proposal>, StoreError> {
        Ok(self.state()?.proposals.values().cloned().collect())
    }

    fn next_proposal_id(&self) -> Result<ProposalId, StoreError> {
        let state = self.state()?;
        let next = state
            .proposals
            .keys()
            .next_back()
            .map_or(1, |id| id.as_u64() + 1);
        Ok(ProposalId::new(next))
    }
}

impl ActionStore for NullStore {
    fn get_action(
        &self,
        proposal: ProposalId,
        participant: &ParticipantId,
    ) -> Result<Option<ParticipantAction>, StoreError> {
        Ok(self
            .state()?
            .actions
            .get(&proposal)
            .and_then(|m| m.get(participant))
            .cloned())
    }

    fn current_actions(
        &self,
        proposal: ProposalId,
    ) -> Result<BTreeMap<ParticipantId, ParticipantAction>, StoreError> {
        Ok(self
            .state()?
            .actions
            .get(&proposal)
            .cloned()
            .unwrap_or_default())
    }

    fn record_action(
        &self,
        proposal: ProposalId,
        action: &VoteAction,
        standing: Option<&ParticipantAction>,
        recorded_at: Timestamp,
    ) -> Result<u64, StoreError> {
        let mut state = self.state()?;
        let current = state.actions.entry(proposal).or_default();
        match standing {
            Some(standing) => {
                current.insert(action.participant().clone(), standing.clone());
            }
            None => {
                current.remove(action.participant());
            }
        }
        let log = state.action_log.entry(proposal).or_default();
        let seq = log.len() as u64 + 1;
        log.push(ActionLogEntry {
            seq,
            action: action.clone(),
            recorded_at,
        });
        Ok(seq)
    }

    fn action_log(&self, proposal: ProposalId) -> Result<Vec<ActionLogEntry>, StoreError> {
        Ok(self
            .state()?
            .action_log
            .get(&proposal)
            .cloned()
            .unwrap_or_default())
    }
}

impl ResolutionStore for NullStore {
    fn get_audit(&self, proposal: ProposalId) -> Result<Option<AuditRecord>, StoreError> {
        Ok(self.state()?.audits.get(&proposal).cloned())
    }

    fn get_tally(&self, proposal: ProposalId) -> Result<Option<TallyResult>, StoreError> {
        Ok(self.state()?.tallies.get(&proposal).cloned())
    }

    fn commit_resolution(
        &self,
        audit: &AuditRecord,
        tally: &TallyResult,
        force: bool,
    ) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if self.commits_failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("null store commit failed".into()));
        }
        let resolved = state
            .audits
            .get(&audit.proposal)
            .is_some_and(|a| a.status.is_resolved());
        if resolved && !force {
            return Err(StoreError::Duplicate(format!("audit for proposal {}", audit.proposal)));
        }
        state.audits.insert(audit.proposal, audit.clone());
        state.tallies.insert(audit.proposal, tally.clone());
        drop(state);
        let lag = self.commit_lag_ms.load(Ordering::SeqCst);
        if lag > 0 {
            std::thread::sleep(Duration::from_millis(lag));
        }
        Ok(())
    }

    fn record_failure(&self, audit: &AuditRecord) -> Result<bool, StoreError> {
        let mut state = self.state()?;
        if state
            .audits
            .get(&audit.proposal)
            .is_some_and(|a| a.status.is_resolved())
        {
            return Ok(false);
        }
        state.audits.insert(audit.proposal, audit.clone());
        Ok(true)
    }
}

impl SnapshotStore for NullStore {
    fn append_snapshot(
        &self,
        proposal: ProposalId,
        trigger: SnapshotTrigger,
        taken_at: Timestamp,
        actions: &BTreeMap<ParticipantId, ParticipantAction>,
    ) -> Result<BackupSnapshot, StoreError> {
        let mut state = self.state()?;
        if self.snapshots_failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("null store snapshot write failed".into()));
        }
        let list = state.snapshots.entry(proposal).or_default();
        let snapshot = BackupSnapshot {
            proposal,
            sequence: list.len() as u64 + 1,
            trigger,
            taken_at,
            actions: actions.clone(),
        };
        list.push(snapshot.clone());
        Ok(snapshot)
    }

    fn list_snapshots(&self, proposal: ProposalId) -> Result<Vec<BackupSnapshot>, StoreError> {
        Ok(self
            .state()?
            .snapshots
            .get(&proposal)
            .cloned()
            .unwrap_or_default())
    }
}
