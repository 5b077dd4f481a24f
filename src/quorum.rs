//! Quorum evaluation over collected state descriptors.
//!
//! Once every member of a newly delivered component has contributed a state
//! descriptor, [`evaluate`] decides whether the component may become
//! primary, and with which group identity, action seqno and protocol
//! version. The function is pure: given the same descriptor slice (same
//! order), it produces the same decision on every member. That determinism
//! is the correctness bedrock of the whole core — all members apply the
//! same decision independently and must not diverge.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::descriptor::StateDescriptor;
use crate::types::{ProtoVersion, Seqno};

/// Outcome of a quorum evaluation.
///
/// Per-member status assignment is derived from this decision by comparing
/// each member's reported `(group UUID, act_id)` against the winning pair
/// (see [`crate::member::Member::update_status`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumDecision {
    /// Whether the component reached quorum.
    pub primary: bool,
    /// Highest action seqno among the reference members.
    pub act_id: Seqno,
    /// Configuration generation of the reference (not yet advanced).
    pub conf_id: Seqno,
    /// Group identity adopted by the component.
    pub group_uuid: Uuid,
    /// Negotiated protocol version.
    pub proto: ProtoVersion,
}

impl QuorumDecision {
    fn non_primary() -> Self {
        QuorumDecision {
            primary: false,
            act_id: Seqno::ILL,
            conf_id: Seqno::ILL,
            group_uuid: Uuid::nil(),
            proto: ProtoVersion::UNSET,
        }
    }
}

/// Decide quorum from the state descriptors of all component members.
///
/// The reference is the highest `conf_id` reported among members carrying
/// the (single) established group UUID. The component is primary iff the
/// reference carriers form a strict majority of the members carrying that
/// UUID; members with a NIL UUID are fresh joiners and carry no vote.
pub fn evaluate(states: &[&StateDescriptor]) -> QuorumDecision {
    if states.is_empty() {
        return QuorumDecision::non_primary();
    }

    // A component mixing two different group identities can never commit:
    // whichever side we picked, the other would diverge.
    let mut group_uuid: Option<Uuid> = None;
    for state in states {
        if state.group_uuid().is_nil() {
            continue;
        }
        match group_uuid {
            None => group_uuid = Some(state.group_uuid()),
            Some(established) if established != state.group_uuid() => {
                warn!(
                    established = %established,
                    conflicting = %state.group_uuid(),
                    "conflicting group UUIDs in component, refusing quorum"
                );
                return QuorumDecision::non_primary();
            }
            Some(_) => {}
        }
    }

    let Some(group_uuid) = group_uuid else {
        debug!("no member carries an established group UUID, component stays non-primary");
        return QuorumDecision::non_primary();
    };

    // Descriptors carry no membership size, so the reference conf's "known
    // size" is the number of current members sharing the group UUID.
    let known: Vec<&&StateDescriptor> = states
        .iter()
        .filter(|s| s.group_uuid() == group_uuid)
        .collect();
    let ref_conf = known.iter().map(|s| s.conf_id()).max().unwrap_or(Seqno::ILL);
    let carriers = known.iter().filter(|s| s.conf_id() == ref_conf).count();

    if carriers * 2 <= known.len() {
        warn!(
            carriers,
            known = known.len(),
            conf_id = %ref_conf,
            "reference configuration carried by a minority, refusing quorum"
        );
        return QuorumDecision::non_primary();
    }

    let act_id = known
        .iter()
        .filter(|s| s.conf_id() == ref_conf)
        .map(|s| s.act_id())
        .max()
        .unwrap_or(Seqno::ILL);

    // Negotiate the highest protocol version every member can speak.
    let (Some(proto), Some(floor)) = (
        states.iter().map(|s| s.proto_max()).min(),
        states.iter().map(|s| s.proto_min()).max(),
    ) else {
        return QuorumDecision::non_primary();
    };
    if proto < floor {
        warn!(
            ceiling = %proto,
            floor = %floor,
            "no common protocol version, refusing quorum"
        );
        return QuorumDecision::non_primary();
    }

    QuorumDecision {
        primary: true,
        act_id,
        conf_id: ref_conf,
        group_uuid,
        proto,
    }
}
