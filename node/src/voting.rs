//! Participant registration, proposal creation and vote/delegation intake.
//!
//! Every submission is validated against the proposal and the submission
//! policy, then written as one atomic "new standing + log entry" store call.
//! Submissions by the same participant on the same proposal are serialized;
//! nothing else is.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::Instrument;

use liquid_governance::{ActionSpacing, GovernanceError, VotingPolicy};
use liquid_store::StoreError;
use liquid_types::{
    ActionLogEntry, Clock, OrganizationId, Participant, ParticipantAction, ParticipantId, Proposal,
    ProposalId, Timestamp, VoteAction,
};

use crate::locks::KeyedLocks;
use crate::store_call::{unavailable, BlockingStore};
use crate::{tracing_spans, NodeMetrics};

/// Outcome of an accepted submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReceipt {
    pub proposal: ProposalId,
    pub participant: ParticipantId,
    /// Position of the action in the proposal's log.
    pub seq: u64,
    /// The participant's standing after the action; `None` after a removal.
    pub standing: Option<ParticipantAction>,
    pub recorded_at: Timestamp,
}

pub struct VotingService {
    store: BlockingStore,
    clock: Arc<dyn Clock>,
    policy: VotingPolicy,
    spacing: Mutex<ActionSpacing>,
    locks: KeyedLocks<(ProposalId, ParticipantId)>,
    /// Serializes proposal id allocation.
    next_id: Mutex<()>,
    metrics: Arc<NodeMetrics>,
}

impl VotingService {
    pub fn new(
        store: BlockingStore,
        clock: Arc<dyn Clock>,
        policy: VotingPolicy,
        metrics: Arc<NodeMetrics>,
    ) -> Self {
        Self {
            store,
            clock,
            spacing: Mutex::new(ActionSpacing::new(policy.min_action_spacing_secs)),
            policy,
            locks: KeyedLocks::new(),
            next_id: Mutex::new(()),
            metrics,
        }
    }

    pub fn policy(&self) -> &VotingPolicy {
        &self.policy
    }

    /// Register `id` as a member of `organization`. Identifiers are permanent.
    pub async fn register_participant(
        &self,
        id: ParticipantId,
        organization: OrganizationId,
    ) -> Result<Participant, GovernanceError> {
        let participant = Participant {
            id,
            organization,
            joined_at: self.clock.now(),
        };
        let record = participant.clone();
        match self
            .store
            .run("put_participant", move |s| s.put_participant(&record))
            .await
        {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(GovernanceError::ParticipantExists(participant.id.to_string()))
            }
            Err(e) => return Err(unavailable(e)),
        }
        tracing::info!(participant = %participant.id, organization = %participant.organization, "participant registered");
        Ok(participant)
    }

    /// Create a proposal under the next free id, open from now until `deadline`.
    pub async fn create_proposal(
        &self,
        organization: OrganizationId,
        title: String,
        options: Vec<String>,
        deadline: Timestamp,
    ) -> Result<Proposal, GovernanceError> {
        let _guard = self.next_id.lock().await;
        let id = self
            .store
            .call("next_proposal_id", |s| s.next_proposal_id())
            .await?;
        let proposal = Proposal::new(id, organization, title, options, self.clock.now(), deadline)?;
        let record = proposal.clone();
        self.store
            .call("put_proposal", move |s| s.put_proposal(&record))
            .await?;
        tracing::info!(
            proposal = %proposal.id(),
            organization = %proposal.organization(),
            options = proposal.options().len(),
            deadline = %proposal.deadline(),
            "proposal created"
        );
        Ok(proposal)
    }

    pub async fn proposal(&self, id: ProposalId) -> Result<Proposal, GovernanceError> {
        self.store
            .call("get_proposal", move |s| s.get_proposal(id))
            .await?
            .ok_or(GovernanceError::ProposalNotFound(id))
    }

    pub async fn proposals(&self) -> Result<Vec<Proposal>, GovernanceError> {
        self.store.call("list_proposals", |s| s.list_proposals()).await
    }

    /// Every participant's current standing on `proposal`.
    pub async fn current_actions(
        &self,
        proposal: ProposalId,
    ) -> Result<BTreeMap<ParticipantId, ParticipantAction>, GovernanceError> {
        self.proposal(proposal).await?;
        self.store
            .call("current_actions", move |s| s.current_actions(proposal))
            .await
    }

    pub async fn action_log(&self, proposal: ProposalId) -> Result<Vec<ActionLogEntry>, GovernanceError> {
        self.proposal(proposal).await?;
        self.store
            .call("action_log", move |s| s.action_log(proposal))
            .await
    }

    /// Validate and record one vote/delegation action.
    pub async fn submit(
        &self,
        proposal: ProposalId,
        action: VoteAction,
    ) -> Result<ActionReceipt, GovernanceError> {
        let span = tracing_spans::action_span(proposal, action.participant(), action.kind());
        let result = self.submit_inner(proposal, action).instrument(span.clone()).await;
        let _enter = span.enter();
        match &result {
            Ok(receipt) => {
                self.metrics.actions_accepted.inc();
                tracing::debug!(seq = receipt.seq, "action recorded");
            }
            Err(e) => {
                self.metrics.actions_rejected.inc();
                tracing::debug!(error = %e, kind = e.kind(), "action rejected");
            }
        }
        result
    }

    async fn submit_inner(
        &self,
        proposal_id: ProposalId,
        action: VoteAction,
    ) -> Result<ActionReceipt, GovernanceError> {
        let participant = action.participant().clone();
        let _guard = self.locks.acquire(&(proposal_id, participant.clone())).await;

        let proposal = self.proposal(proposal_id).await?;
        let now = self.clock.now();
        if proposal.is_closed(now) {
            return Err(GovernanceError::VotingClosed(proposal_id));
        }
        if !self.is_member(&proposal, &participant).await? {
            return Err(GovernanceError::NotAMember(participant.to_string()));
        }

        match &action {
            VoteAction::Vote { option, .. } if !proposal.has_option(*option) => {
                return Err(GovernanceError::InvalidOption {
                    participant: participant.to_string(),
                    option: *option,
                });
            }
            VoteAction::Delegate(delegation) => {
                if !self.is_member(&proposal, delegation.to()).await? {
                    return Err(GovernanceError::InvalidDelegationTarget {
                        participant: participant.to_string(),
                        target: delegation.to().to_string(),
                    });
                }
                if self.policy.max_chain_length.is_some() {
                    let current = self
                        .store
                        .call("current_actions", move |s| s.current_actions(proposal_id))
                        .await?;
                    self.policy.check_chain_length(&current, delegation)?;
                }
            }
            _ => {}
        }

        self.spacing.lock().await.check(proposal_id, &participant, now)?;

        let who = participant.clone();
        let current = self
            .store
            .call("get_action", move |s| s.get_action(proposal_id, &who))
            .await?;
        let standing = ParticipantAction::transition(current.as_ref(), &action)?;

        let written = standing.clone();
        let seq = self
            .store
            .call("record_action", move |s| {
                s.record_action(proposal_id, &action, written.as_ref(), now)
            })
            .await?;
        self.spacing
            .lock()
            .await
            .record(proposal_id, participant.clone(), now);

        Ok(ActionReceipt {
            proposal: proposal_id,
            participant,
            seq,
            standing,
            recorded_at: now,
        })
    }

    async fn is_member(
        &self,
        proposal: &Proposal,
        participant: &ParticipantId,
    ) -> Result<bool, GovernanceError> {
        let id = participant.clone();
        let found = self
            .store
            .call("get_participant", move |s| s.get_participant(&id))
            .await?;
        Ok(found.is_some_and(|p| &p.organization == proposal.organization()))
    }

    /// Forget rate-limit entries and locks that can no longer matter.
    pub async fn cleanup(&self) {
        self.spacing.lock().await.cleanup(self.clock.now());
        self.locks.cleanup().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liquid_nullables::{NullClock, NullStore};
    use liquid_store::ActionStore;
    use liquid_types::{Delegation, OptionId};
    use std::time::Duration;

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::new(s).unwrap()
    }

    fn org() -> OrganizationId {
        OrganizationId::new("acme").unwrap()
    }

    struct Fixture {
        service: VotingService,
        clock: Arc<NullClock>,
        store: Arc<NullStore>,
        proposal: ProposalId,
    }

    async fn fixture(policy: VotingPolicy) -> Fixture {
        let store = Arc::new(NullStore::new());
        let clock = Arc::new(NullClock::new(1_000));
        let service = VotingService::new(
            BlockingStore::new(store.clone(), Duration::from_secs(1)),
            clock.clone(),
            policy,
            Arc::new(NodeMetrics::new()),
        );
        for who in ["a", "b", "c", "d"] {
            service.register_participant(pid(who), org()).await.unwrap();
        }
        service
            .register_participant(pid("outsider"), OrganizationId::new("other").unwrap())
            .await
            .unwrap();
        let proposal = service
            .create_proposal(org(), "lunch".into(), vec!["pizza".into(), "sushi".into()], Timestamp::new(5_000))
            .await
            .unwrap()
            .id();
        Fixture {
            service,
            clock,
            store,
            proposal,
        }
    }

    fn vote(who: &str, option: u16) -> VoteAction {
        VoteAction::Vote {
            participant: pid(who),
            option: OptionId::new(option),
        }
    }

    fn delegate(from: &str, to: &str) -> VoteAction {
        VoteAction::Delegate(Delegation::new(pid(from), pid(to)).unwrap())
    }

    #[tokio::test]
    async fn proposal_ids_are_allocated_in_order() {
        let f = fixture(VotingPolicy::default()).await;
        let second = f
            .service
            .create_proposal(org(), "dinner".into(), vec!["x".into(), "y".into()], Timestamp::new(5_000))
            .await
            .unwrap();
        assert_eq!(f.proposal, ProposalId::new(1));
        assert_eq!(second.id(), ProposalId::new(2));
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let f = fixture(VotingPolicy::default()).await;
        let err = f.service.register_participant(pid("a"), org()).await.unwrap_err();
        assert_eq!(err.kind(), "ParticipantExists");
    }

    #[tokio::test]
    async fn delegation_supersedes_vote() {
        let f = fixture(VotingPolicy::default()).await;
        f.service.submit(f.proposal, vote("a", 2)).await.unwrap();
        f.clock.advance(60);
        let receipt = f.service.submit(f.proposal, delegate("a", "b")).await.unwrap();
        assert_eq!(receipt.seq, 2);
        assert_eq!(receipt.standing, Some(ParticipantAction::Delegate(pid("b"))));

        let current = f.service.current_actions(f.proposal).await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(f.service.action_log(f.proposal).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rapid_second_action_is_rate_limited() {
        let f = fixture(VotingPolicy::default()).await;
        f.service.submit(f.proposal, vote("a", 1)).await.unwrap();
        f.clock.advance(10);
        let err = f.service.submit(f.proposal, vote("a", 2)).await.unwrap_err();
        assert_eq!(err, GovernanceError::RateLimited { retry_after_secs: 50 });
        // Other participants are unaffected.
        f.service.submit(f.proposal, vote("b", 2)).await.unwrap();
    }

    #[tokio::test]
    async fn outsiders_cannot_act_or_be_delegated_to() {
        let f = fixture(VotingPolicy::default()).await;
        let err = f.service.submit(f.proposal, vote("outsider", 1)).await.unwrap_err();
        assert_eq!(err.kind(), "NotAMember");
        let err = f.service.submit(f.proposal, delegate("a", "outsider")).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidDelegationTarget");
        let err = f.service.submit(f.proposal, delegate("a", "nobody")).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidDelegationTarget");
    }

    #[tokio::test]
    async fn unknown_option_is_rejected() {
        let f = fixture(VotingPolicy::default()).await;
        let err = f.service.submit(f.proposal, vote("a", 3)).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidOption");
    }

    #[tokio::test]
    async fn removing_what_is_not_there_is_rejected() {
        let f = fixture(VotingPolicy::default()).await;
        f.service.submit(f.proposal, vote("a", 1)).await.unwrap();
        f.clock.advance(60);
        let err = f
            .service
            .submit(f.proposal, VoteAction::RemoveDelegation { participant: pid("a") })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidAction");
        let receipt = f
            .service
            .submit(f.proposal, VoteAction::RemoveVote { participant: pid("a") })
            .await
            .unwrap();
        assert_eq!(receipt.standing, None);
    }

    #[tokio::test]
    async fn closed_proposal_refuses_actions() {
        let f = fixture(VotingPolicy::default()).await;
        f.clock.set(5_000);
        let err = f.service.submit(f.proposal, vote("a", 1)).await.unwrap_err();
        assert_eq!(err, GovernanceError::VotingClosed(f.proposal));
    }

    #[tokio::test]
    async fn chain_length_cap_applies_at_submission() {
        let f = fixture(VotingPolicy {
            max_chain_length: Some(2),
            ..VotingPolicy::default()
        })
        .await;
        f.service.submit(f.proposal, delegate("b", "c")).await.unwrap();
        f.service.submit(f.proposal, delegate("c", "d")).await.unwrap();
        let err = f.service.submit(f.proposal, delegate("a", "b")).await.unwrap_err();
        assert_eq!(err, GovernanceError::ChainTooLong { length: 3, max: 2 });
    }

    #[tokio::test]
    async fn chain_length_cap_holds_when_links_arrive_head_first() {
        let f = fixture(VotingPolicy {
            max_chain_length: Some(2),
            ..VotingPolicy::default()
        })
        .await;
        f.service.submit(f.proposal, delegate("a", "b")).await.unwrap();
        f.service.submit(f.proposal, delegate("b", "c")).await.unwrap();
        let err = f.service.submit(f.proposal, delegate("c", "d")).await.unwrap_err();
        assert_eq!(err, GovernanceError::ChainTooLong { length: 3, max: 2 });
        assert!(f.store.get_action(f.proposal, &pid("c")).unwrap().is_none());
    }

    #[tokio::test]
    async fn store_outage_surfaces_as_unavailable() {
        let f = fixture(VotingPolicy::default()).await;
        f.store.set_unavailable(true);
        let err = f.service.submit(f.proposal, vote("a", 1)).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.kind(), "StoreUnavailable");
    }

    #[tokio::test]
    async fn missing_proposal_is_not_found() {
        let f = fixture(VotingPolicy::default()).await;
        let err = f.service.submit(ProposalId::new(99), vote("a", 1)).await.unwrap_err();
        assert_eq!(err, GovernanceError::ProposalNotFound(ProposalId::new(99)));
    }
}
