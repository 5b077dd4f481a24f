//! Messages consumed from the transport and actions handed back to it.
//!
//! The transport delivers every event in a single total order shared by all
//! members; the core trusts that contract and never re-orders. Payloads are
//! borrowed or cheaply cloned [`Bytes`] views — the core does not own
//! transport buffers (the dispatcher frees its own memory).

use bytes::Bytes;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::member::MemberId;
use crate::types::Seqno;

/// Membership delivered by the group-communication transport.
///
/// The member order is component-determined and identical on every node;
/// only `my_idx` differs between peers.
#[derive(Debug, Clone)]
pub struct ComponentView {
    primary: bool,
    my_idx: usize,
    members: Vec<MemberId>,
}

impl ComponentView {
    pub fn new(primary: bool, my_idx: usize, members: Vec<MemberId>) -> Result<Self> {
        if members.is_empty() || my_idx >= members.len() {
            return Err(Error::Malformed {
                what: "component",
                len: members.len(),
            });
        }
        Ok(ComponentView {
            primary,
            my_idx,
            members,
        })
    }

    /// Whether the transport certifies this component as primary.
    #[inline]
    pub fn primary(&self) -> bool {
        self.primary
    }

    /// Own position in the component-determined member order.
    #[inline]
    pub fn my_idx(&self) -> usize {
        self.my_idx
    }

    #[inline]
    pub fn members(&self) -> &[MemberId] {
        &self.members
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Type tag of an ordered data message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// 16-byte state-exchange UUID broadcast.
    StateUuid,
    /// Serialized state descriptor.
    StateMsg,
    /// 8-byte little-endian applied seqno report.
    Last,
    /// 8-byte little-endian join-completion seqno (negative = failure).
    Join,
}

/// An ordered data message as delivered by the transport.
#[derive(Debug, Clone)]
pub struct RecvMessage {
    pub sender_idx: usize,
    pub kind: MessageKind,
    pub payload: Bytes,
}

impl RecvMessage {
    pub fn new(sender_idx: usize, kind: MessageKind, payload: Bytes) -> Self {
        RecvMessage {
            sender_idx,
            kind,
            payload,
        }
    }
}

/// A state-transfer request action flowing through the ordered stream.
///
/// The payload is opaque to the core and stays owned by the dispatcher; the
/// core only inspects the type tag (already dispatched by the caller) and
/// writes the selected donor index, or a negative error code, into `id` on
/// the requesting node.
#[derive(Debug)]
pub struct StateRequest<'a> {
    pub payload: &'a [u8],
    pub id: i64,
}

impl<'a> StateRequest<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        StateRequest { payload, id: 0 }
    }
}

/// What the dispatcher should do with an action after the core processed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Hand the action to the local application layer.
    Deliver,
    /// The local node is not a participant; release the buffer and move on.
    Discard,
}

/// One entry of a configuration-change action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfMember {
    pub id: MemberId,
    pub name: String,
}

/// Configuration-change action emitted on every accepted primary component.
///
/// This is a value copy: it shares no storage with the group object and
/// stays valid across subsequent events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfChange {
    /// Last globally ordered action seqno known to the group.
    pub act_id: Seqno,
    /// Configuration generation of this primary component.
    pub conf_id: Seqno,
    /// Group identity.
    pub group_uuid: Uuid,
    /// Number of members in the component.
    pub memb_num: u32,
    /// Own index within the component.
    pub my_idx: i32,
    /// Members in component order.
    pub members: Vec<ConfMember>,
    /// Set when the local node missed primary configurations and requires
    /// an external state snapshot to rejoin safely.
    pub snapshot_required: bool,
}
