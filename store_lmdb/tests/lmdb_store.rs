//! Integration tests for the LMDB backend: every store trait against a real
//! environment in a temp dir, including reopen persistence.

use std::collections::BTreeMap;
use std::time::Duration;

use liquid_governance::{
    ActionSnapshot, AuditRecord, AuditStatus, DelegationResolver, GovernanceError, TallyEngine,
};
use liquid_store::{
    ActionStore, MetaStore, ParticipantStore, ProposalStore, ResolutionStore, SnapshotStore,
    SnapshotTrigger, StoreError,
};
use liquid_store_lmdb::LmdbEnvironment;
use liquid_types::{
    Delegation, OptionId, OrganizationId, Participant, ParticipantAction, ParticipantId, Proposal,
    ProposalId, Timestamp, VoteAction,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const MAP_SIZE: usize = 64 * 1024 * 1024;

fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
    let dir = tempfile::tempdir().expect("temp dir");
    let env = LmdbEnvironment::open(dir.path(), MAP_SIZE).expect("open env");
    (dir, env)
}

fn pid(s: &str) -> ParticipantId {
    ParticipantId::new(s).unwrap()
}

fn org() -> OrganizationId {
    OrganizationId::new("acme").unwrap()
}

fn proposal(id: u64) -> Proposal {
    Proposal::new(
        ProposalId::new(id),
        org(),
        "lunch",
        vec!["pizza".into(), "sushi".into()],
        Timestamp::new(100),
        Timestamp::new(200),
    )
    .unwrap()
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

/// Apply `action` the way the voting service does: transition, then record.
fn apply(env: &LmdbEnvironment, proposal: ProposalId, action: VoteAction, at: u64) -> u64 {
    let current = env.get_action(proposal, action.participant()).unwrap();
    let next = ParticipantAction::transition(current.as_ref(), &action).unwrap();
    env.record_action(proposal, &action, next.as_ref(), Timestamp::new(at))
        .unwrap()
}

fn resolved_pair(
    env: &LmdbEnvironment,
    proposal: &Proposal,
    forced: bool,
) -> (AuditRecord, liquid_governance::TallyResult) {
    let members = env.members_of(proposal.organization()).unwrap();
    let actions = env.current_actions(proposal.id()).unwrap();
    let snap = ActionSnapshot::new(proposal.clone(), members, actions, Timestamp::new(200)).unwrap();
    let resolution = DelegationResolver::resolve_snapshot(&snap);
    let tally = TallyEngine::tally(proposal, &resolution).unwrap();
    let audit = AuditRecord::resolved(
        proposal.id(),
        Timestamp::new(201),
        Duration::from_millis(2),
        &resolution,
        true,
        forced,
    );
    (audit, tally)
}

// ---------------------------------------------------------------------------
// 1. Environment
// ---------------------------------------------------------------------------

#[test]
fn fresh_environment_is_stamped_with_schema_version() {
    let (_dir, env) = temp_env();
    assert_eq!(
        env.get_schema_version().unwrap(),
        liquid_store_lmdb::environment::SCHEMA_VERSION
    );
}

#[test]
fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let env = LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap();
        env.put_proposal(&proposal(1)).unwrap();
        apply(&env, ProposalId::new(1), vote("alice", 1), 110);
    }
    let env = LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap();
    assert_eq!(env.get_proposal(ProposalId::new(1)).unwrap(), Some(proposal(1)));
    assert_eq!(
        env.get_action(ProposalId::new(1), &pid("alice")).unwrap(),
        Some(ParticipantAction::Vote(OptionId::new(1)))
    );
}

// ---------------------------------------------------------------------------
// 2. Participants and proposals
// ---------------------------------------------------------------------------

#[test]
fn participants_are_grouped_by_organization() {
    let (_dir, env) = temp_env();
    for (who, organization) in [("alice", "acme"), ("bob", "acme"), ("carol", "other")] {
        env.put_participant(&Participant {
            id: pid(who),
            organization: OrganizationId::new(organization).unwrap(),
            joined_at: Timestamp::new(1),
        })
        .unwrap();
    }

    let members = env.members_of(&org()).unwrap();
    assert_eq!(members.into_iter().collect::<Vec<_>>(), vec![pid("alice"), pid("bob")]);
    assert!(env.get_participant(&pid("carol")).unwrap().is_some());
    assert!(env.get_participant(&pid("dave")).unwrap().is_none());
}

#[test]
fn participant_ids_are_immutable() {
    let (_dir, env) = temp_env();
    let alice = Participant {
        id: pid("alice"),
        organization: org(),
        joined_at: Timestamp::new(1),
    };
    env.put_participant(&alice).unwrap();
    let err = env.put_participant(&alice).unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(_)));
}

#[test]
fn proposal_ids_are_sequential() {
    let (_dir, env) = temp_env();
    assert_eq!(env.next_proposal_id().unwrap(), ProposalId::new(1));
    env.put_proposal(&proposal(1)).unwrap();
    env.put_proposal(&proposal(2)).unwrap();
    assert_eq!(env.next_proposal_id().unwrap(), ProposalId::new(3));
    assert_eq!(env.list_proposals().unwrap().len(), 2);
    assert!(matches!(
        env.put_proposal(&proposal(2)).unwrap_err(),
        StoreError::Duplicate(_)
    ));
}

// ---------------------------------------------------------------------------
// 3. Actions
// ---------------------------------------------------------------------------

#[test]
fn latest_action_replaces_standing_and_log_keeps_history() {
    let (_dir, env) = temp_env();
    let p = ProposalId::new(1);
    apply(&env, p, vote("alice", 2), 110);
    apply(&env, p, delegate("alice", "bob"), 120);
    apply(&env, p, vote("bob", 1), 130);

    let current = env.current_actions(p).unwrap();
    assert_eq!(current.len(), 2);
    assert_eq!(current[&pid("alice")], ParticipantAction::Delegate(pid("bob")));

    let log = env.action_log(p).unwrap();
    assert_eq!(log.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(log[0].action, vote("alice", 2));
}

#[test]
fn remove_clears_standing() {
    let (_dir, env) = temp_env();
    let p = ProposalId::new(1);
    apply(&env, p, vote("alice", 1), 110);
    apply(&env, p, VoteAction::RemoveVote { participant: pid("alice") }, 120);
    assert!(env.get_action(p, &pid("alice")).unwrap().is_none());
    assert_eq!(env.action_log(p).unwrap().len(), 2);
}

#[test]
fn actions_are_scoped_to_their_proposal() {
    let (_dir, env) = temp_env();
    apply(&env, ProposalId::new(1), vote("alice", 1), 110);
    apply(&env, ProposalId::new(2), vote("alice", 2), 110);
    apply(&env, ProposalId::new(2), vote("bob", 2), 110);

    assert_eq!(env.current_actions(ProposalId::new(1)).unwrap().len(), 1);
    assert_eq!(env.current_actions(ProposalId::new(2)).unwrap().len(), 2);
    assert_eq!(env.action_log(ProposalId::new(1)).unwrap().len(), 1);
    // Sequence numbers restart per proposal.
    assert_eq!(env.action_log(ProposalId::new(2)).unwrap()[1].seq, 2);
}

// ---------------------------------------------------------------------------
// 4. Resolutions
// ---------------------------------------------------------------------------

fn seeded() -> (tempfile::TempDir, LmdbEnvironment, Proposal) {
    let (dir, env) = temp_env();
    let prop = proposal(1);
    env.put_proposal(&prop).unwrap();
    for who in ["alice", "bob"] {
        env.put_participant(&Participant {
            id: pid(who),
            organization: org(),
            joined_at: Timestamp::new(1),
        })
        .unwrap();
    }
    apply(&env, prop.id(), vote("alice", 1), 110);
    apply(&env, prop.id(), delegate("bob", "alice"), 120);
    (dir, env, prop)
}

#[test]
fn commit_then_read_back() {
    let (_dir, env, prop) = seeded();
    let (audit, tally) = resolved_pair(&env, &prop, false);
    env.commit_resolution(&audit, &tally, false).unwrap();

    assert_eq!(env.get_tally(prop.id()).unwrap(), Some(tally.clone()));
    assert_eq!(tally.total_for(OptionId::new(1)), 2);
    let stored = env.get_audit(prop.id()).unwrap().unwrap();
    assert_eq!(stored.status, AuditStatus::Completed);
    assert_eq!(stored.classifications.len(), 2);
}

#[test]
fn second_commit_is_rejected_unless_forced() {
    let (_dir, env, prop) = seeded();
    let (audit, tally) = resolved_pair(&env, &prop, false);
    env.commit_resolution(&audit, &tally, false).unwrap();

    let mut other = tally.clone();
    other.total_cast = 99;
    let err = env.commit_resolution(&audit, &other, false).unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(_)));
    assert_eq!(env.get_tally(prop.id()).unwrap(), Some(tally));

    let (forced_audit, forced_tally) = resolved_pair(&env, &prop, true);
    env.commit_resolution(&forced_audit, &forced_tally, true).unwrap();
    assert!(env.get_audit(prop.id()).unwrap().unwrap().forced);
}

#[test]
fn failure_audit_never_replaces_a_resolution() {
    let (_dir, env, prop) = seeded();
    let failed = AuditRecord::failed(
        prop.id(),
        Timestamp::new(201),
        Duration::from_millis(1),
        &GovernanceError::StoreUnavailable("timeout".into()),
    );

    // Nothing there yet: the failure is recorded and does not block a retry.
    assert!(env.record_failure(&failed).unwrap());
    assert!(env.get_tally(prop.id()).unwrap().is_none());
    let (audit, tally) = resolved_pair(&env, &prop, false);
    env.commit_resolution(&audit, &tally, false).unwrap();

    assert!(!env.record_failure(&failed).unwrap());
    assert_eq!(env.get_audit(prop.id()).unwrap().unwrap().status, AuditStatus::Completed);
}

// ---------------------------------------------------------------------------
// 5. Snapshots
// ---------------------------------------------------------------------------

#[test]
fn snapshots_append_with_increasing_sequence() {
    let (_dir, env, prop) = seeded();
    let actions = env.current_actions(prop.id()).unwrap();

    let first = env
        .append_snapshot(prop.id(), SnapshotTrigger::Hourly, Timestamp::new(150), &actions)
        .unwrap();
    let second = env
        .append_snapshot(prop.id(), SnapshotTrigger::PreCalculation, Timestamp::new(200), &BTreeMap::new())
        .unwrap();
    assert_eq!((first.sequence, second.sequence), (1, 2));

    let listed = env.list_snapshots(prop.id()).unwrap();
    assert_eq!(listed, vec![first, second]);
    assert_eq!(listed[0].actions, actions);
    assert!(env.list_snapshots(ProposalId::new(9)).unwrap().is_empty());
}

#[test]
fn meta_roundtrip() {
    let (_dir, env) = temp_env();
    assert!(env.get_meta("last_sweep").unwrap().is_none());
    env.put_meta("last_sweep", &42u64.to_be_bytes()).unwrap();
    assert_eq!(env.get_meta("last_sweep").unwrap(), Some(42u64.to_be_bytes().to_vec()));
}
