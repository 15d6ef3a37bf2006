//! Submission policy: rules enforced when actions arrive, never during resolution.
//!
//! The resolver is correct for any delegation graph. Spacing between actions
//! and chain-length caps are deployment choices applied at submission time.

use std::collections::{BTreeMap, HashMap, HashSet};

use liquid_types::{Delegation, ParticipantAction, ParticipantId, ProposalId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::GovernanceError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingPolicy {
    /// Minimum seconds between two actions of one participant on one proposal.
    pub min_action_spacing_secs: u64,
    /// Longest delegation chain a new delegation may create, in hops.
    pub max_chain_length: Option<u32>,
}

impl Default for VotingPolicy {
    fn default() -> Self {
        Self {
            min_action_spacing_secs: 60,
            max_chain_length: None,
        }
    }
}

impl VotingPolicy {
    /// Reject `delegation` if, on top of `current`, any chain passing through
    /// it would exceed `max_chain_length`. The longest such chain starts at
    /// the deepest participant already delegating into the delegator and runs
    /// forward past the delegate. Chains closing into a cycle are measured up
    /// to the repeated participant.
    pub fn check_chain_length(
        &self,
        current: &BTreeMap<ParticipantId, ParticipantAction>,
        delegation: &Delegation,
    ) -> Result<(), GovernanceError> {
        let Some(max) = self.max_chain_length else {
            return Ok(());
        };

        let upstream = upstream_depth(current, delegation.from());

        let mut seen = HashSet::new();
        seen.insert(delegation.from());
        let mut length = upstream + 1;
        let mut cursor = delegation.to();
        while length <= max && seen.insert(cursor) {
            match current.get(cursor).and_then(ParticipantAction::delegate_target) {
                Some(next) if next != delegation.from() => {
                    length += 1;
                    cursor = next;
                }
                _ => break,
            }
        }

        if length > max {
            return Err(GovernanceError::ChainTooLong { length, max });
        }
        Ok(())
    }
}

/// Hops on the longest existing chain ending at `target`. The delegator's own
/// outgoing edge is ignored since the new delegation replaces it, which
/// leaves the incoming edges a tree.
fn upstream_depth(current: &BTreeMap<ParticipantId, ParticipantAction>, target: &ParticipantId) -> u32 {
    let mut delegators: HashMap<&ParticipantId, Vec<&ParticipantId>> = HashMap::new();
    for (from, action) in current {
        if let Some(to) = action.delegate_target() {
            if from != target {
                delegators.entry(to).or_default().push(from);
            }
        }
    }

    let mut depth = 0u32;
    let mut seen = HashSet::from([target]);
    let mut frontier = vec![target];
    while !frontier.is_empty() {
        let next: Vec<&ParticipantId> = frontier
            .iter()
            .filter_map(|p| delegators.get(p))
            .flatten()
            .copied()
            .filter(|p| seen.insert(*p))
            .collect();
        if next.is_empty() {
            break;
        }
        depth += 1;
        frontier = next;
    }
    depth
}

/// Tracks the last action per (proposal, participant) to enforce spacing.
pub struct ActionSpacing {
    min_spacing_secs: u64,
    last_action: HashMap<(ProposalId, ParticipantId), Timestamp>,
}

impl ActionSpacing {
    pub fn new(min_spacing_secs: u64) -> Self {
        Self {
            min_spacing_secs,
            last_action: HashMap::new(),
        }
    }

    /// Check whether an action is allowed now, without recording it.
    pub fn check(
        &self,
        proposal: ProposalId,
        participant: &ParticipantId,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        match self.last_action.get(&(proposal, participant.clone())) {
            Some(last) if !last.has_expired(self.min_spacing_secs, now) => {
                let elapsed = last.elapsed_since(now);
                Err(GovernanceError::RateLimited {
                    retry_after_secs: self.min_spacing_secs - elapsed,
                })
            }
            _ => Ok(()),
        }
    }

    /// Record an accepted action.
    pub fn record(&mut self, proposal: ProposalId, participant: ParticipantId, now: Timestamp) {
        self.last_action.insert((proposal, participant), now);
    }

    /// Drop entries old enough that they can no longer block anything.
    pub fn cleanup(&mut self, now: Timestamp) {
        let spacing = self.min_spacing_secs;
        self.last_action.retain(|_, t| !t.has_expired(spacing, now));
    }

    pub fn len(&self) -> usize {
        self.last_action.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_action.is_empty()
    }
}

impl Default for ActionSpacing {
    fn default() -> Self {
        Self::new(VotingPolicy::default().min_action_spacing_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::new(s).unwrap()
    }

    fn chain(links: &[(&str, &str)]) -> BTreeMap<ParticipantId, ParticipantAction> {
        links
            .iter()
            .map(|(from, to)| (pid(from), ParticipantAction::Delegate(pid(to))))
            .collect()
    }

    #[test]
    fn first_action_always_allowed() {
        let spacing = ActionSpacing::new(60);
        assert!(spacing.check(ProposalId::new(1), &pid("a"), Timestamp::new(0)).is_ok());
    }

    #[test]
    fn second_action_blocked_within_spacing() {
        let mut spacing = ActionSpacing::new(60);
        spacing.record(ProposalId::new(1), pid("a"), Timestamp::new(100));
        let err = spacing
            .check(ProposalId::new(1), &pid("a"), Timestamp::new(130))
            .unwrap_err();
        assert_eq!(err, GovernanceError::RateLimited { retry_after_secs: 30 });
        assert!(spacing.check(ProposalId::new(1), &pid("a"), Timestamp::new(160)).is_ok());
    }

    #[test]
    fn spacing_is_per_proposal() {
        let mut spacing = ActionSpacing::new(60);
        spacing.record(ProposalId::new(1), pid("a"), Timestamp::new(100));
        assert!(spacing.check(ProposalId::new(2), &pid("a"), Timestamp::new(101)).is_ok());
        assert!(spacing.check(ProposalId::new(1), &pid("b"), Timestamp::new(101)).is_ok());
    }

    #[test]
    fn cleanup_drops_expired_entries() {
        let mut spacing = ActionSpacing::new(60);
        spacing.record(ProposalId::new(1), pid("a"), Timestamp::new(0));
        spacing.record(ProposalId::new(1), pid("b"), Timestamp::new(50));
        spacing.cleanup(Timestamp::new(70));
        assert_eq!(spacing.len(), 1);
    }

    #[test]
    fn chain_length_unlimited_by_default() {
        let policy = VotingPolicy::default();
        let current = chain(&[("b", "c"), ("c", "d"), ("d", "e")]);
        let d = Delegation::new(pid("a"), pid("b")).unwrap();
        assert!(policy.check_chain_length(&current, &d).is_ok());
    }

    #[test]
    fn chain_length_cap_enforced() {
        let policy = VotingPolicy {
            max_chain_length: Some(3),
            ..VotingPolicy::default()
        };
        let current = chain(&[("b", "c"), ("c", "d")]);
        let ok = Delegation::new(pid("a"), pid("b")).unwrap();
        assert!(policy.check_chain_length(&current, &ok).is_ok());

        let current = chain(&[("b", "c"), ("c", "d"), ("d", "e")]);
        let err = policy.check_chain_length(&current, &ok).unwrap_err();
        assert_eq!(err, GovernanceError::ChainTooLong { length: 4, max: 3 });
    }

    #[test]
    fn existing_delegators_count_towards_the_cap() {
        let policy = VotingPolicy {
            max_chain_length: Some(2),
            ..VotingPolicy::default()
        };
        let current = chain(&[("a", "b"), ("b", "c")]);
        let extend = Delegation::new(pid("c"), pid("d")).unwrap();
        let err = policy.check_chain_length(&current, &extend).unwrap_err();
        assert_eq!(err, GovernanceError::ChainTooLong { length: 3, max: 2 });

        // Two branches into c, the deeper one decides.
        let current = chain(&[("x", "c"), ("a", "b"), ("b", "c")]);
        let policy = VotingPolicy {
            max_chain_length: Some(3),
            ..VotingPolicy::default()
        };
        assert!(policy.check_chain_length(&current, &extend).is_ok());
    }

    #[test]
    fn redirecting_out_of_a_cycle_counts_the_cycle_once() {
        // a and c delegate to each other; c now redirects to d.
        let current = chain(&[("a", "c"), ("c", "a")]);
        let redirect = Delegation::new(pid("c"), pid("d")).unwrap();
        let policy = VotingPolicy {
            max_chain_length: Some(2),
            ..VotingPolicy::default()
        };
        assert!(policy.check_chain_length(&current, &redirect).is_ok());
        let policy = VotingPolicy {
            max_chain_length: Some(1),
            ..VotingPolicy::default()
        };
        let err = policy.check_chain_length(&current, &redirect).unwrap_err();
        assert_eq!(err, GovernanceError::ChainTooLong { length: 2, max: 1 });
    }

    #[test]
    fn closing_a_cycle_terminates() {
        let policy = VotingPolicy {
            max_chain_length: Some(10),
            ..VotingPolicy::default()
        };
        let current = chain(&[("b", "c"), ("c", "a")]);
        let d = Delegation::new(pid("a"), pid("b")).unwrap();
        assert!(policy.check_chain_length(&current, &d).is_ok());
    }
}
