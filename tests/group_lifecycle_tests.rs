//! End-to-end lifecycle tests for the group state machine.
//!
//! These drive a machine through the component/exchange flows a real
//! transport would deliver: bootstrap, member join with state exchange,
//! partition to non-primary, and configuration refreshes.

use bytes::Bytes;
use uuid::Uuid;

use quorate::config::NodeConfig;
use quorate::descriptor::StateDescriptor;
use quorate::group::{GroupState, Phase};
use quorate::member::{MemberId, MemberStatus};
use quorate::message::ComponentView;
use quorate::types::{ProtoVersion, Seqno};

fn node_config(name: &str) -> NodeConfig {
    NodeConfig {
        name: name.to_string(),
        incoming_address: format!("10.0.0.1:4567/{name}"),
        proto_min: 0,
        proto_max: 0,
    }
}

fn comp(primary: bool, my_idx: usize, members: &[&str]) -> ComponentView {
    let ids = members
        .iter()
        .map(|m| MemberId::try_from(*m).unwrap())
        .collect();
    ComponentView::new(primary, my_idx, ids).unwrap()
}

fn fresh_desc(round: Uuid, name: &str) -> Bytes {
    StateDescriptor::new(
        round,
        Uuid::nil(),
        Seqno::ILL,
        Seqno::ILL,
        MemberStatus::Prim,
        name.to_string(),
        String::new(),
        ProtoVersion::new(0),
        ProtoVersion::new(0),
    )
    .unwrap()
    .to_bytes()
    .unwrap()
}

/// Bootstrap a single-node group named "a".
fn bootstrapped() -> GroupState {
    let mut group = GroupState::new(node_config("a")).unwrap();
    let phase = group.handle_component(&comp(true, 0, &["a"])).unwrap();
    assert_eq!(phase, Phase::Primary);
    group
}

/// Take a bootstrapped node "a" through a full exchange with joiner "b".
fn two_node_group() -> (GroupState, Uuid) {
    let mut group = bootstrapped();
    group.handle_component(&comp(true, 0, &["a", "b"])).unwrap();

    let round = Uuid::new_v4();
    group.handle_state_uuid(0, round);

    let own = group.state_descriptor().to_bytes().unwrap();
    assert_eq!(group.handle_state_msg(0, &own), Phase::WaitStateMsg);

    let phase = group.handle_state_msg(1, &fresh_desc(round, "b"));
    assert_eq!(phase, Phase::Primary);
    (group, round)
}

// ============================================================================
// Bootstrap
// ============================================================================

#[test]
fn test_single_node_bootstrap() {
    let group = bootstrapped();

    assert_eq!(group.phase(), Phase::Primary);
    assert_eq!(group.conf_id(), Seqno::new(0));
    assert_eq!(group.act_id(), Seqno::new(1));
    assert!(!group.group_uuid().is_nil());
    assert_eq!(group.members()[0].status(), MemberStatus::Joined);
}

#[test]
fn test_bootstrap_emits_conf_change() {
    let group = bootstrapped();
    let conf = group.conf_change();

    assert_eq!(conf.conf_id, Seqno::new(0));
    assert_eq!(conf.act_id, Seqno::new(1));
    assert_eq!(conf.memb_num, 1);
    assert_eq!(conf.my_idx, 0);
    assert_eq!(conf.members[0].id.as_str(), "a");
    assert!(!conf.snapshot_required);
}

#[test]
fn test_second_single_node_component_is_not_a_bootstrap() {
    let mut group = bootstrapped();
    let uuid = group.group_uuid();

    // same single-node membership delivered again: a configuration
    // refresh, not a new group
    let phase = group.handle_component(&comp(true, 0, &["a"])).unwrap();
    assert_eq!(phase, Phase::Primary);
    assert_eq!(group.group_uuid(), uuid);
    assert_eq!(group.conf_id(), Seqno::new(1));
    assert_eq!(group.act_id(), Seqno::new(1));
}

// ============================================================================
// Two-node join with state exchange
// ============================================================================

#[test]
fn test_two_node_join_with_exchange() {
    let (group, _) = two_node_group();

    assert_eq!(group.phase(), Phase::Primary);
    assert_eq!(group.conf_id(), Seqno::new(1));
    assert_eq!(group.act_id(), Seqno::new(1));
    assert_eq!(group.members()[0].status(), MemberStatus::Joined);
    assert_eq!(group.members()[1].status(), MemberStatus::Prim);
}

#[test]
fn test_exchange_waits_for_all_members() {
    let mut group = bootstrapped();
    group.handle_component(&comp(true, 0, &["a", "b"])).unwrap();

    let round = Uuid::new_v4();
    group.handle_state_uuid(0, round);

    // only one of two descriptors in: still collecting
    let own = group.state_descriptor().to_bytes().unwrap();
    assert_eq!(group.handle_state_msg(0, &own), Phase::WaitStateMsg);
    assert_eq!(group.phase(), Phase::WaitStateMsg);
}

#[test]
fn test_stray_descriptor_from_previous_round_dropped() {
    let mut group = bootstrapped();
    group.handle_component(&comp(true, 0, &["a", "b"])).unwrap();

    let round = Uuid::new_v4();
    group.handle_state_uuid(0, round);

    // descriptor tagged with some other round
    let stray = fresh_desc(Uuid::new_v4(), "b");
    assert_eq!(group.handle_state_msg(1, &stray), Phase::WaitStateMsg);
    assert!(group.members()[1].state().is_none());
}

#[test]
fn test_unparseable_descriptor_dropped() {
    let mut group = bootstrapped();
    group.handle_component(&comp(true, 0, &["a", "b"])).unwrap();
    group.handle_state_uuid(0, Uuid::new_v4());

    let garbage = Bytes::from_static(&[1, 2, 3]);
    assert_eq!(group.handle_state_msg(1, &garbage), Phase::WaitStateMsg);
}

#[test]
fn test_stray_state_uuid_in_primary_dropped() {
    let mut group = bootstrapped();
    let phase = group.handle_state_uuid(0, Uuid::new_v4());
    assert_eq!(phase, Phase::Primary);
    assert!(group.state_uuid().is_nil());
}

// ============================================================================
// Configuration refresh (no new members)
// ============================================================================

#[test]
fn test_identical_component_advances_conf_id_only() {
    let (mut group, _) = two_node_group();
    let uuid = group.group_uuid();

    let phase = group.handle_component(&comp(true, 0, &["a", "b"])).unwrap();

    assert_eq!(phase, Phase::Primary);
    assert_eq!(group.conf_id(), Seqno::new(2));
    assert_eq!(group.act_id(), Seqno::new(1));
    assert_eq!(group.group_uuid(), uuid);
    // statuses survive a refresh untouched
    assert_eq!(group.members()[0].status(), MemberStatus::Joined);
    assert_eq!(group.members()[1].status(), MemberStatus::Prim);
}

#[test]
fn test_new_member_forces_fresh_exchange() {
    let (mut group, _) = two_node_group();

    let phase = group
        .handle_component(&comp(true, 0, &["a", "b", "c"]))
        .unwrap();

    assert_eq!(phase, Phase::WaitStateUuid);
    assert!(group.state_uuid().is_nil());
    assert!(group.members().iter().all(|m| m.state().is_none()));
}

// ============================================================================
// Non-primary transitions
// ============================================================================

#[test]
fn test_partition_to_non_primary_preserves_identity() {
    let (mut group, _) = two_node_group();
    let uuid = group.group_uuid();

    let phase = group.handle_component(&comp(false, 0, &["a"])).unwrap();

    assert_eq!(phase, Phase::NonPrimary);
    assert_eq!(group.conf_id(), Seqno::ILL);
    assert_eq!(group.group_uuid(), uuid);
    assert_eq!(group.act_id(), Seqno::new(1));
    assert_eq!(group.members().len(), 1);
    assert_eq!(group.members()[0].status(), MemberStatus::Joined);
}

#[test]
fn test_rejoin_after_partition_flags_snapshot() {
    let (mut group, _) = two_node_group();
    group.handle_component(&comp(false, 0, &["a"])).unwrap();

    // we carry history (act_id = 1) into a new primary: configurations
    // were missed while partitioned away
    let phase = group.handle_component(&comp(true, 0, &["a", "b"])).unwrap();
    assert_eq!(phase, Phase::WaitStateUuid);
    assert!(group.conf_change().snapshot_required);

    // complete the exchange; the flag describes the configuration we
    // rejoined through and clears with the next one
    let round = Uuid::new_v4();
    group.handle_state_uuid(0, round);
    group.handle_state_msg(0, &group.state_descriptor().to_bytes().unwrap());
    let phase = group.handle_state_msg(1, &fresh_desc(round, "b"));
    assert_eq!(phase, Phase::Primary);
    assert!(group.conf_change().snapshot_required);

    group.handle_component(&comp(true, 0, &["a", "b"])).unwrap();
    assert!(!group.conf_change().snapshot_required);
}

#[test]
fn test_fresh_joiner_does_not_flag_snapshot() {
    // a node with no history joining an existing group goes through the
    // ordinary transfer handshake, not an external snapshot
    let mut group = GroupState::new(node_config("b")).unwrap();
    let phase = group.handle_component(&comp(true, 1, &["a", "b"])).unwrap();

    assert_eq!(phase, Phase::WaitStateUuid);
    assert!(!group.conf_change().snapshot_required);
}

// ============================================================================
// Quorum failure paths through the full exchange
// ============================================================================

#[test]
fn test_exchange_of_only_fresh_members_goes_non_primary() {
    let mut group = GroupState::new(node_config("a")).unwrap();
    group.handle_component(&comp(true, 0, &["a", "b"])).unwrap();

    let round = Uuid::new_v4();
    group.handle_state_uuid(0, round);
    group.handle_state_msg(0, &group.state_descriptor().to_bytes().unwrap());
    let phase = group.handle_state_msg(1, &fresh_desc(round, "b"));

    assert_eq!(phase, Phase::NonPrimary);
    assert_eq!(group.conf_id(), Seqno::ILL);
}

#[test]
fn test_exchange_with_conflicting_group_uuids_goes_non_primary() {
    let mut group = bootstrapped();
    group.handle_component(&comp(true, 0, &["a", "b"])).unwrap();

    let round = Uuid::new_v4();
    group.handle_state_uuid(0, round);
    group.handle_state_msg(0, &group.state_descriptor().to_bytes().unwrap());

    // "b" belongs to a different replicated dataset entirely
    let foreign = StateDescriptor::new(
        round,
        Uuid::new_v4(),
        Seqno::new(99),
        Seqno::new(7),
        MemberStatus::Synced,
        "b".to_string(),
        String::new(),
        ProtoVersion::new(0),
        ProtoVersion::new(0),
    )
    .unwrap();

    let phase = group.handle_state_msg(1, &foreign.to_bytes().unwrap());
    assert_eq!(phase, Phase::NonPrimary);
}

// ============================================================================
// Last-applied tracking
// ============================================================================

#[test]
fn test_last_applied_recomputed_when_pinning_member_advances() {
    let (mut group, _) = two_node_group();
    group
        .handle_component(&comp(true, 0, &["a", "b", "c"]))
        .unwrap();

    group.handle_last(0, Seqno::new(10));
    group.handle_last(1, Seqno::new(5));
    group.handle_last(2, Seqno::new(7));
    assert_eq!(group.last_applied(), Seqno::new(5));
    assert_eq!(group.last_node(), 1);

    let moved = group.handle_last(1, Seqno::new(9));
    assert_eq!(moved, Some(Seqno::new(7)));
    assert_eq!(group.last_applied(), Seqno::new(7));
    assert_eq!(group.last_node(), 2);
}

#[test]
fn test_last_applied_is_minimum_over_members() {
    let (mut group, _) = two_node_group();

    group.handle_last(0, Seqno::new(20));
    group.handle_last(1, Seqno::new(15));

    let expected = group
        .members()
        .iter()
        .map(|m| m.last_applied())
        .min()
        .unwrap();
    assert_eq!(group.last_applied(), expected);
}

#[test]
fn test_membership_change_recomputes_minimum() {
    let (mut group, _) = two_node_group();
    group.handle_last(0, Seqno::new(20));
    group.handle_last(1, Seqno::new(3));
    assert_eq!(group.last_applied(), Seqno::new(3));

    // the member pinning the minimum leaves
    group.handle_component(&comp(true, 0, &["a"])).unwrap();
    assert_eq!(group.last_applied(), Seqno::new(20));
    assert_eq!(group.last_node(), 0);
}

// ============================================================================
// conf_id monotonicity
// ============================================================================

#[test]
fn test_conf_id_strictly_increases_across_primaries() {
    let (mut group, _) = two_node_group();
    let mut previous = group.conf_id();

    for _ in 0..3 {
        group.handle_component(&comp(true, 0, &["a", "b"])).unwrap();
        assert_eq!(group.phase(), Phase::Primary);
        assert!(group.conf_id() > previous);
        previous = group.conf_id();
    }
}
