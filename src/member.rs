//! Per-member identity, status and bookkeeping.
//!
//! A [`Member`] is one row of the group's member table: transport-assigned
//! identity, replication status, applied high-water mark, the state
//! descriptor received during the current exchange round, and the symbolic
//! donor/joiner pairing used while a state transfer is in flight.
//!
//! Donor/joiner pairings are stored as partner *IDs*, not indices: indices
//! are reshuffled on every component change while IDs are stable, so a
//! pairing survives benign membership churn and is resolved by a linear
//! scan when needed.

use std::fmt;

use num_derive::FromPrimitive;

use crate::constants::MEMBER_ID_MAX_LEN;
use crate::descriptor::StateDescriptor;
use crate::error::Error;
use crate::quorum::QuorumDecision;
use crate::types::{ProtoVersion, Seqno};

/// A transport-assigned member identifier.
///
/// Opaque byte string, unique within a component, at most
/// [`MEMBER_ID_MAX_LEN`] bytes with no interior NUL (it travels in
/// NUL-terminated fields).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberId(String);

impl MemberId {
    /// Placeholder for a slot whose transport identity is not known yet.
    ///
    /// Compares unequal to every valid ID, so it can never be matched
    /// against a delivered component.
    pub(crate) fn unset() -> Self {
        MemberId(String::new())
    }

    /// Get the raw string form.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for MemberId {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty() || value.len() > MEMBER_ID_MAX_LEN || value.as_bytes().contains(&0) {
            return Err(Error::Malformed {
                what: "member id",
                len: value.len(),
            });
        }
        Ok(MemberId(value.to_string()))
    }
}

impl TryFrom<String> for MemberId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        MemberId::try_from(value.as_str())
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Replication status of a member.
///
/// The wire encoding (one byte) is part of the state-descriptor format and
/// must not change. Statuses are ordered by progression: a member moves
/// forward through `Prim → Donor/Joined → Synced` and only regresses via a
/// fresh non-primary/primary cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive)]
pub enum MemberStatus {
    /// Not part of a primary component.
    NonPrim = 0,
    /// In the primary component but missing state (needs a transfer).
    Prim = 1,
    /// Currently receiving a state transfer.
    Joiner = 2,
    /// Currently serving a state transfer.
    Donor = 3,
    /// Holds complete state.
    Joined = 4,
    /// Holds complete state and has caught up with the replication stream.
    Synced = 5,
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemberStatus::NonPrim => "non-prim",
            MemberStatus::Prim => "prim",
            MemberStatus::Joiner => "joiner",
            MemberStatus::Donor => "donor",
            MemberStatus::Joined => "joined",
            MemberStatus::Synced => "synced",
        };
        write!(f, "{}", s)
    }
}

/// One row of the group member table.
#[derive(Debug, Clone)]
pub struct Member {
    id: MemberId,
    name: String,
    inc_addr: String,
    proto_min: ProtoVersion,
    proto_max: ProtoVersion,
    status: MemberStatus,
    last_applied: Seqno,
    /// State descriptor received from this member in the current round.
    state: Option<StateDescriptor>,
    /// ID of the node supplying state to this member.
    donor: Option<MemberId>,
    /// ID of the node this member is supplying state to.
    joiner: Option<MemberId>,
}

impl Member {
    /// Fresh record for a member we know nothing about yet.
    pub fn new(id: MemberId) -> Self {
        Member {
            id,
            name: String::new(),
            inc_addr: String::new(),
            proto_min: ProtoVersion::default(),
            proto_max: ProtoVersion::default(),
            status: MemberStatus::NonPrim,
            last_applied: Seqno::new(0),
            state: None,
            donor: None,
            joiner: None,
        }
    }

    /// Fresh record for the local node with its advertised profile.
    pub fn with_profile(
        id: MemberId,
        name: String,
        inc_addr: String,
        proto_min: ProtoVersion,
        proto_max: ProtoVersion,
    ) -> Self {
        Member {
            name,
            inc_addr,
            proto_min,
            proto_max,
            ..Member::new(id)
        }
    }

    #[inline]
    pub fn id(&self) -> &MemberId {
        &self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn inc_addr(&self) -> &str {
        &self.inc_addr
    }

    #[inline]
    pub fn proto_min(&self) -> ProtoVersion {
        self.proto_min
    }

    #[inline]
    pub fn proto_max(&self) -> ProtoVersion {
        self.proto_max
    }

    #[inline]
    pub fn status(&self) -> MemberStatus {
        self.status
    }

    #[inline]
    pub fn last_applied(&self) -> Seqno {
        self.last_applied
    }

    /// State descriptor recorded for this member in the current round.
    #[inline]
    pub fn state(&self) -> Option<&StateDescriptor> {
        self.state.as_ref()
    }

    #[inline]
    pub fn donor(&self) -> Option<&MemberId> {
        self.donor.as_ref()
    }

    #[inline]
    pub fn joiner(&self) -> Option<&MemberId> {
        self.joiner.as_ref()
    }

    pub(crate) fn set_id(&mut self, id: MemberId) {
        self.id = id;
    }

    /// Re-apply the locally configured profile; only meaningful for the
    /// local node's own record, whose profile is config-authoritative.
    pub(crate) fn set_profile(
        &mut self,
        name: &str,
        inc_addr: &str,
        proto_min: ProtoVersion,
        proto_max: ProtoVersion,
    ) {
        self.name = name.to_string();
        self.inc_addr = inc_addr.to_string();
        self.proto_min = proto_min;
        self.proto_max = proto_max;
    }

    pub(crate) fn set_status(&mut self, status: MemberStatus) {
        self.status = status;
    }

    pub(crate) fn set_last_applied(&mut self, seqno: Seqno) {
        self.last_applied = seqno;
    }

    pub(crate) fn set_donor(&mut self, donor: MemberId) {
        self.donor = Some(donor);
    }

    pub(crate) fn set_joiner(&mut self, joiner: MemberId) {
        self.joiner = Some(joiner);
    }

    /// Drop round-local data before a new state exchange.
    ///
    /// Status and the applied high-water mark survive; only the cached
    /// descriptor is round-scoped.
    pub(crate) fn reset(&mut self) {
        self.state = None;
    }

    /// Attach a state descriptor received from this member and adopt the
    /// profile it advertises.
    pub(crate) fn record_state(&mut self, desc: StateDescriptor) {
        self.name = desc.name().to_string();
        self.inc_addr = desc.inc_addr().to_string();
        self.proto_min = desc.proto_min();
        self.proto_max = desc.proto_max();
        self.state = Some(desc);
    }

    /// Inherit the stateful fields of a record from the previous component.
    ///
    /// The member ID stays as delivered in the new component; everything a
    /// membership change must not destroy (status, applied mark, in-flight
    /// transfer pairing, cached descriptor, advertised profile) moves over.
    pub(crate) fn adopt(&mut self, old: Member) {
        self.name = old.name;
        self.inc_addr = old.inc_addr;
        self.proto_min = old.proto_min;
        self.proto_max = old.proto_max;
        self.status = old.status;
        self.last_applied = old.last_applied;
        self.state = old.state;
        self.donor = old.donor;
        self.joiner = old.joiner;
    }

    /// Assign the post-quorum status for this member.
    ///
    /// A member whose recorded `(group UUID, act_id)` equals the winning
    /// pair keeps the status it reported; anything else (behind the winner,
    /// foreign UUID, or no descriptor at all) re-enters as [`MemberStatus::Prim`]
    /// and will need a state transfer.
    pub(crate) fn update_status(&mut self, decision: &QuorumDecision) {
        let inherited = self.state.as_ref().and_then(|desc| {
            if desc.group_uuid() == decision.group_uuid && desc.act_id() == decision.act_id {
                Some(desc.status())
            } else {
                None
            }
        });
        self.status = inherited.unwrap_or(MemberStatus::Prim);
    }
}
