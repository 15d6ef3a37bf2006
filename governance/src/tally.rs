//! Weighted tallies over a [`Resolution`].
//!
//! Every non-abstaining participant contributes exactly one unit to the option
//! their power resolved to, however long their chain.

use std::collections::BTreeMap;

use liquid_types::{OptionId, Proposal, ProposalId};
use serde::{Deserialize, Serialize};

use crate::{GovernanceError, Resolution};

/// Who won, if anyone. Ties are reported, never broken.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TallyOutcome {
    NoVotes,
    Winner(OptionId),
    Tie(Vec<OptionId>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyResult {
    pub proposal: ProposalId,
    /// One entry per proposal option, zeros included.
    pub totals: BTreeMap<OptionId, u64>,
    pub total_cast: u64,
    pub abstentions: u64,
    pub outcome: TallyOutcome,
}

impl TallyResult {
    pub fn total_for(&self, option: OptionId) -> u64 {
        self.totals.get(&option).copied().unwrap_or(0)
    }

    /// Options sharing the highest total; empty when nothing was cast.
    pub fn leaders(&self) -> Vec<OptionId> {
        match &self.outcome {
            TallyOutcome::NoVotes => Vec::new(),
            TallyOutcome::Winner(option) => vec![*option],
            TallyOutcome::Tie(options) => options.clone(),
        }
    }
}

pub struct TallyEngine;

impl TallyEngine {
    /// Count `resolution` against `proposal`'s options.
    ///
    /// Fails only if a result names an option the proposal does not offer,
    /// which a validated [`crate::ActionSnapshot`] rules out.
    pub fn tally(proposal: &Proposal, resolution: &Resolution) -> Result<TallyResult, GovernanceError> {
        let mut totals: BTreeMap<OptionId, u64> = proposal.option_ids().map(|o| (o, 0)).collect();
        let mut abstentions = 0u64;

        for (participant, result) in resolution.results() {
            match result.option() {
                Some(option) => match totals.get_mut(&option) {
                    Some(total) => *total += 1,
                    None => {
                        return Err(GovernanceError::InvalidOption {
                            participant: participant.to_string(),
                            option,
                        })
                    }
                },
                None => abstentions += 1,
            }
        }

        let total_cast: u64 = totals.values().sum();
        debug_assert_eq!(total_cast, resolution.contributing());

        let outcome = match totals.values().copied().max() {
            None | Some(0) => TallyOutcome::NoVotes,
            Some(top) => {
                let leaders: Vec<OptionId> = totals
                    .iter()
                    .filter(|(_, &count)| count == top)
                    .map(|(option, _)| *option)
                    .collect();
                if leaders.len() == 1 {
                    TallyOutcome::Winner(leaders[0])
                } else {
                    TallyOutcome::Tie(leaders)
                }
            }
        };

        Ok(TallyResult {
            proposal: proposal.id(),
            totals,
            total_cast,
            abstentions,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActionSnapshot, DelegationResolver};
    use liquid_types::{OrganizationId, ParticipantAction, ParticipantId, Timestamp};
    use std::collections::BTreeSet;

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::new(s).unwrap()
    }

    fn proposal() -> Proposal {
        Proposal::new(
            ProposalId::new(3),
            OrganizationId::new("org").unwrap(),
            "tally",
            vec!["one".into(), "two".into()],
            Timestamp::new(0),
            Timestamp::new(10),
        )
        .unwrap()
    }

    fn tally(actions: &[(&str, ParticipantAction)]) -> TallyResult {
        let members: BTreeSet<ParticipantId> = ["p1", "p2", "p3", "p4", "p5"].iter().map(|p| pid(p)).collect();
        let map = actions.iter().map(|(p, a)| (pid(p), a.clone())).collect();
        let snap = ActionSnapshot::new(proposal(), members, map, Timestamp::new(10)).unwrap();
        let res = DelegationResolver::resolve_snapshot(&snap);
        TallyEngine::tally(snap.proposal(), &res).unwrap()
    }

    fn vote(n: u16) -> ParticipantAction {
        ParticipantAction::Vote(OptionId::new(n))
    }

    fn delegate(to: &str) -> ParticipantAction {
        ParticipantAction::Delegate(pid(to))
    }

    #[test]
    fn five_participant_scenario() {
        let t = tally(&[
            ("p1", vote(1)),
            ("p2", delegate("p1")),
            ("p3", vote(2)),
            ("p4", delegate("p5")),
            ("p5", delegate("p4")),
        ]);
        assert_eq!(t.total_for(OptionId::new(1)), 2);
        assert_eq!(t.total_for(OptionId::new(2)), 1);
        assert_eq!(t.abstentions, 2);
        assert_eq!(t.total_cast, 3);
        assert_eq!(t.outcome, TallyOutcome::Winner(OptionId::new(1)));
    }

    #[test]
    fn zero_participants_yields_empty_tally() {
        let t = tally(&[]);
        assert_eq!(t.totals.len(), 2);
        assert!(t.totals.values().all(|&v| v == 0));
        assert_eq!(t.outcome, TallyOutcome::NoVotes);
        assert!(t.leaders().is_empty());
    }

    #[test]
    fn only_abstentions_yields_no_winner() {
        let t = tally(&[("p1", delegate("p2")), ("p2", delegate("p1"))]);
        assert_eq!(t.total_cast, 0);
        assert_eq!(t.abstentions, 2);
        assert_eq!(t.outcome, TallyOutcome::NoVotes);
    }

    #[test]
    fn tie_is_reported_not_broken() {
        let t = tally(&[("p1", vote(1)), ("p2", vote(2))]);
        assert_eq!(t.outcome, TallyOutcome::Tie(vec![OptionId::new(1), OptionId::new(2)]));
    }

    #[test]
    fn switching_vote_to_delegation_does_not_double_count() {
        // p2 first voted 2, then delegated to p1: only the delegation is in the snapshot.
        let t = tally(&[("p1", vote(1)), ("p2", delegate("p1"))]);
        assert_eq!(t.total_for(OptionId::new(1)), 2);
        assert_eq!(t.total_for(OptionId::new(2)), 0);
        assert_eq!(t.total_cast, 2);
    }
}
