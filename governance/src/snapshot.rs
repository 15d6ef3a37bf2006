//! Point-in-time copy of one proposal's actions.
//!
//! The resolver never reads the store. It is handed an [`ActionSnapshot`] by
//! value, so actions arriving after the snapshot was taken are simply not part
//! of the run.

use std::collections::{BTreeMap, BTreeSet};

use liquid_types::{ParticipantAction, ParticipantId, Proposal, Timestamp};
use serde::{Deserialize, Serialize};

use crate::GovernanceError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSnapshot {
    proposal: Proposal,
    members: BTreeSet<ParticipantId>,
    actions: BTreeMap<ParticipantId, ParticipantAction>,
    taken_at: Timestamp,
}

impl ActionSnapshot {
    /// Build and validate a snapshot.
    ///
    /// `members` is the proposal organization's participant set. Every actor,
    /// every delegation target and every voted option must be in scope;
    /// anything else rejects the whole snapshot.
    pub fn new(
        proposal: Proposal,
        members: BTreeSet<ParticipantId>,
        actions: BTreeMap<ParticipantId, ParticipantAction>,
        taken_at: Timestamp,
    ) -> Result<Self, GovernanceError> {
        for (participant, action) in &actions {
            if !members.contains(participant) {
                return Err(GovernanceError::NotAMember(participant.to_string()));
            }
            match action {
                ParticipantAction::Vote(option) => {
                    if !proposal.has_option(*option) {
                        return Err(GovernanceError::InvalidOption {
                            participant: participant.to_string(),
                            option: *option,
                        });
                    }
                }
                ParticipantAction::Delegate(target) => {
                    if target == participant || !members.contains(target) {
                        return Err(GovernanceError::InvalidDelegationTarget {
                            participant: participant.to_string(),
                            target: target.to_string(),
                        });
                    }
                }
            }
        }
        Ok(Self {
            proposal,
            members,
            actions,
            taken_at,
        })
    }

    pub fn proposal(&self) -> &Proposal {
        &self.proposal
    }

    pub fn members(&self) -> &BTreeSet<ParticipantId> {
        &self.members
    }

    pub fn actions(&self) -> &BTreeMap<ParticipantId, ParticipantAction> {
        &self.actions
    }

    pub fn taken_at(&self) -> Timestamp {
        self.taken_at
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liquid_types::{OptionId, OrganizationId, ProposalId};

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::new(s).unwrap()
    }

    fn proposal() -> Proposal {
        Proposal::new(
            ProposalId::new(7),
            OrganizationId::new("org").unwrap(),
            "budget",
            vec!["yes".into(), "no".into()],
            Timestamp::new(0),
            Timestamp::new(100),
        )
        .unwrap()
    }

    fn members(names: &[&str]) -> BTreeSet<ParticipantId> {
        names.iter().map(|n| pid(n)).collect()
    }

    #[test]
    fn delegation_outside_organization_is_rejected() {
        let mut actions = BTreeMap::new();
        actions.insert(pid("a"), ParticipantAction::Delegate(pid("outsider")));
        let err = ActionSnapshot::new(proposal(), members(&["a", "b"]), actions, Timestamp::new(100))
            .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidDelegationTarget { .. }));
    }

    #[test]
    fn stored_self_delegation_is_rejected() {
        let mut actions = BTreeMap::new();
        actions.insert(pid("a"), ParticipantAction::Delegate(pid("a")));
        let err = ActionSnapshot::new(proposal(), members(&["a"]), actions, Timestamp::new(100))
            .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidDelegationTarget { .. }));
    }

    #[test]
    fn unknown_option_is_rejected() {
        let mut actions = BTreeMap::new();
        actions.insert(pid("a"), ParticipantAction::Vote(OptionId::new(3)));
        let err = ActionSnapshot::new(proposal(), members(&["a"]), actions, Timestamp::new(100))
            .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidOption { .. }));
    }

    #[test]
    fn non_member_actor_is_rejected() {
        let mut actions = BTreeMap::new();
        actions.insert(pid("ghost"), ParticipantAction::Vote(OptionId::new(1)));
        let err = ActionSnapshot::new(proposal(), members(&["a"]), actions, Timestamp::new(100))
            .unwrap_err();
        assert_eq!(err, GovernanceError::NotAMember("ghost".into()));
    }

    #[test]
    fn empty_snapshot_is_valid() {
        let snap =
            ActionSnapshot::new(proposal(), members(&["a"]), BTreeMap::new(), Timestamp::new(100))
                .unwrap();
        assert!(snap.is_empty());
    }
}
