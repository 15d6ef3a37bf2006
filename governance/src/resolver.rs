//! Delegation resolution: turn a proposal's actions into one result per participant.
//!
//! Supports:
//! - **Transitive delegation** (A→B→C means A's vote follows C's)
//! - **Cycle detection** by path marking, so disjoint chains never flag each other
//! - **Orphaned chains** (a chain ending at someone who never acted)
//!
//! Each participant is visited at most once. A participant already resolved
//! by an earlier chain is reused as-is, so total work is linear in
//! participants plus edges.

use std::collections::BTreeMap;

use liquid_types::{OptionId, ParticipantAction, ParticipantId};
use serde::{Deserialize, Serialize};

use crate::ActionSnapshot;

/// Why a participant contributes no voting power.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbstainReason {
    /// Took no action; appears only as someone's delegation target.
    NoAction,
    /// Delegation chain ends at a participant who took no action.
    DeadEnd,
    /// Part of a delegation cycle, or delegates into one.
    Cycle,
}

/// The outcome for a single participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionResult {
    Abstained(AbstainReason),
    DirectVote(OptionId),
    DelegatedVote {
        option: OptionId,
        /// Hops from this participant to the terminal voter.
        chain_length: u32,
        terminal_voter: ParticipantId,
    },
}

impl ResolutionResult {
    /// The option this participant's voting power goes to, if any.
    pub fn option(&self) -> Option<OptionId> {
        match self {
            Self::Abstained(_) => None,
            Self::DirectVote(option) | Self::DelegatedVote { option, .. } => Some(*option),
        }
    }

    pub fn is_abstained(&self) -> bool {
        matches!(self, Self::Abstained(_))
    }
}

/// Aggregate counts describing one resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStats {
    /// Participants that received a result.
    pub participants: u64,
    pub direct_voters: u64,
    /// Participants holding an active delegation.
    pub delegators: u64,
    /// Delegators whose chain reached a direct voter.
    pub delegated_votes: u64,
    pub abstentions: u64,
    /// Distinct dead-end participants that at least one chain runs into.
    pub orphaned_chains: u64,
    /// Distinct delegation cycles.
    pub cycles: u64,
    /// Participants sitting on a cycle (not counting those delegating into it).
    pub cycle_participants: u64,
    /// Longest chain that reached a direct voter, in hops.
    pub longest_chain: u32,
}

/// Resolver output: exactly one [`ResolutionResult`] per participant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    results: BTreeMap<ParticipantId, ResolutionResult>,
    stats: ResolutionStats,
}

impl Resolution {
    pub fn results(&self) -> &BTreeMap<ParticipantId, ResolutionResult> {
        &self.results
    }

    pub fn get(&self, participant: &ParticipantId) -> Option<&ResolutionResult> {
        self.results.get(participant)
    }

    pub fn stats(&self) -> &ResolutionStats {
        &self.stats
    }

    /// Number of participants contributing voting power.
    pub fn contributing(&self) -> u64 {
        self.results.values().filter(|r| !r.is_abstained()).count() as u64
    }

    /// Total voting power cast through `voter` (own vote plus every chain
    /// terminating at them). Zero unless `voter` voted directly.
    pub fn voting_power(&self, voter: &ParticipantId) -> u64 {
        if !matches!(self.results.get(voter), Some(ResolutionResult::DirectVote(_))) {
            return 0;
        }
        let delegated = self
            .results
            .values()
            .filter(|r| {
                matches!(r, ResolutionResult::DelegatedVote { terminal_voter, .. } if terminal_voter == voter)
            })
            .count() as u64;
        1 + delegated
    }
}

/// Per-node traversal state.
#[derive(Clone, Copy, Debug)]
enum NodeState {
    Unvisited,
    InPath,
    Resolved(Outcome),
}

/// Resolved outcome keyed by node index, cheap to copy along a path.
#[derive(Clone, Copy, Debug)]
enum Outcome {
    Direct(OptionId),
    Delegated {
        option: OptionId,
        terminal: usize,
        hops: u32,
    },
    Abstained(AbstainReason),
}

/// Where a walk stopped.
enum Stop {
    /// Reached a node whose outcome is known.
    Known(usize, Outcome),
    /// Reached a node already on the current path.
    Cycle(usize),
}

/// Resolves an [`ActionSnapshot`] into a [`Resolution`].
pub struct DelegationResolver<'a> {
    ids: Vec<&'a ParticipantId>,
    next: Vec<Option<usize>>,
    vote: Vec<Option<OptionId>>,
    state: Vec<NodeState>,
    stats: ResolutionStats,
}

impl<'a> DelegationResolver<'a> {
    /// Index every actor and every delegation target of the snapshot.
    pub fn new(snapshot: &'a ActionSnapshot) -> Self {
        let mut index: BTreeMap<&'a ParticipantId, usize> = BTreeMap::new();
        for (participant, action) in snapshot.actions() {
            index.entry(participant).or_insert(0);
            if let ParticipantAction::Delegate(target) = action {
                index.entry(target).or_insert(0);
            }
        }
        let ids: Vec<&ParticipantId> = index.keys().copied().collect();
        for (i, id) in ids.iter().enumerate() {
            index.insert(*id, i);
        }

        let mut next = vec![None; ids.len()];
        let mut vote = vec![None; ids.len()];
        for (participant, action) in snapshot.actions() {
            let i = index[participant];
            match action {
                ParticipantAction::Vote(option) => vote[i] = Some(*option),
                ParticipantAction::Delegate(target) => next[i] = Some(index[target]),
            }
        }

        Self {
            state: vec![NodeState::Unvisited; ids.len()],
            ids,
            next,
            vote,
            stats: ResolutionStats::default(),
        }
    }

    /// Convenience wrapper: index and resolve in one call.
    pub fn resolve_snapshot(snapshot: &'a ActionSnapshot) -> Resolution {
        Self::new(snapshot).resolve()
    }

    /// Classify every indexed participant.
    pub fn resolve(mut self) -> Resolution {
        let mut path = Vec::new();
        for start in 0..self.ids.len() {
            if matches!(self.state[start], NodeState::Unvisited) {
                self.walk(start, &mut path);
            }
        }
        self.finish()
    }

    /// Follow the chain from `start`, then settle every node on the path.
    fn walk(&mut self, start: usize, path: &mut Vec<usize>) {
        path.clear();
        let mut current = start;
        let stop = loop {
            match self.state[current] {
                NodeState::Resolved(outcome) => break Stop::Known(current, outcome),
                NodeState::InPath => break Stop::Cycle(current),
                NodeState::Unvisited => {
                    if let Some(option) = self.vote[current] {
                        let outcome = Outcome::Direct(option);
                        self.state[current] = NodeState::Resolved(outcome);
                        break Stop::Known(current, outcome);
                    }
                    match self.next[current] {
                        Some(target) => {
                            self.state[current] = NodeState::InPath;
                            path.push(current);
                            current = target;
                        }
                        None => {
                            let outcome = Outcome::Abstained(AbstainReason::NoAction);
                            self.state[current] = NodeState::Resolved(outcome);
                            break Stop::Known(current, outcome);
                        }
                    }
                }
            }
        };

        match stop {
            Stop::Cycle(entry) => {
                self.stats.cycles += 1;
                let entry_pos = path.iter().position(|&n| n == entry).unwrap_or(0);
                self.stats.cycle_participants += (path.len() - entry_pos) as u64;
                self.settle_abstained(path, AbstainReason::Cycle);
            }
            Stop::Known(_, Outcome::Abstained(reason)) => {
                let reason = match reason {
                    AbstainReason::Cycle => AbstainReason::Cycle,
                    AbstainReason::NoAction | AbstainReason::DeadEnd => AbstainReason::DeadEnd,
                };
                self.settle_abstained(path, reason);
            }
            Stop::Known(node, Outcome::Direct(option)) => self.settle_delegated(path, option, node, 0),
            Stop::Known(
                _,
                Outcome::Delegated {
                    option,
                    terminal,
                    hops,
                },
            ) => self.settle_delegated(path, option, terminal, hops),
        }
    }

    fn settle_abstained(&mut self, path: &[usize], reason: AbstainReason) {
        for &node in path {
            self.state[node] = NodeState::Resolved(Outcome::Abstained(reason));
        }
    }

    /// `path[i]` is `path.len() - i` hops away from the node the walk stopped
    /// at, which is itself `tail_hops` away from the terminal voter.
    fn settle_delegated(&mut self, path: &[usize], option: OptionId, terminal: usize, tail_hops: u32) {
        let len = path.len() as u32;
        for (i, &node) in path.iter().enumerate() {
            let hops = tail_hops + (len - i as u32);
            self.state[node] = NodeState::Resolved(Outcome::Delegated {
                option,
                terminal,
                hops,
            });
        }
    }

    fn finish(mut self) -> Resolution {
        let mut results = BTreeMap::new();
        for (i, id) in self.ids.iter().enumerate() {
            if self.next[i].is_some() {
                self.stats.delegators += 1;
            }
            let result = match self.state[i] {
                NodeState::Resolved(Outcome::Direct(option)) => {
                    self.stats.direct_voters += 1;
                    ResolutionResult::DirectVote(option)
                }
                NodeState::Resolved(Outcome::Delegated {
                    option,
                    terminal,
                    hops,
                }) => {
                    self.stats.delegated_votes += 1;
                    self.stats.longest_chain = self.stats.longest_chain.max(hops);
                    ResolutionResult::DelegatedVote {
                        option,
                        chain_length: hops,
                        terminal_voter: self.ids[terminal].clone(),
                    }
                }
                NodeState::Resolved(Outcome::Abstained(reason)) => {
                    self.stats.abstentions += 1;
                    if reason == AbstainReason::NoAction {
                        self.stats.orphaned_chains += 1;
                    }
                    ResolutionResult::Abstained(reason)
                }
                // Every node is settled by `resolve`; an unsettled one cannot
                // carry voting power.
                NodeState::Unvisited | NodeState::InPath => {
                    self.stats.abstentions += 1;
                    ResolutionResult::Abstained(AbstainReason::NoAction)
                }
            };
            results.insert((*id).clone(), result);
        }
        self.stats.participants = results.len() as u64;

        tracing::debug!(
            participants = self.stats.participants,
            direct = self.stats.direct_voters,
            delegated = self.stats.delegated_votes,
            cycles = self.stats.cycles,
            orphaned = self.stats.orphaned_chains,
            "delegation graph resolved"
        );

        Resolution {
            results,
            stats: self.stats,
        }
    }
}
