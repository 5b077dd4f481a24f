//! The group state machine.
//!
//! One [`GroupState`] lives on every member and consumes the totally
//! ordered event stream delivered by the group-communication transport:
//! component changes, state-exchange messages, applied-seqno reports,
//! join completions and state-transfer requests. Because every member sees
//! the same events in the same order and every handler is deterministic,
//! all members hold an identical view of group state at every step — that
//! property, not any single handler, is what the design protects.
//!
//! # Phases
//!
//! ```text
//!                non-primary component (any phase)
//!   ┌──────────────────────────────────────────────────────┐
//!   ▼                                                      │
//! NonPrimary ──primary component──▶ WaitStateUuid          │
//!   │  (first ever, size 1:            │ state UUID msg    │
//!   │   bootstrap straight             ▼                   │
//!   │   to Primary)                WaitStateMsg ───────────┤
//!   │                                  │ all descriptors,  │
//!   │                                  │ quorum reached    │
//!   └────────────▶ Primary ◀───────────┘                   │
//!                    │  ▲                                  │
//!                    │  └── same membership: conf_id++     │
//!                    └─────────────────────────────────────┘
//! ```
//!
//! # Concurrency
//!
//! The machine is single-threaded by design: the dispatch loop serializes
//! events and each handler runs to completion without blocking. Handlers
//! never call back into the machine.

use bytes::Bytes;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::NodeConfig;
use crate::descriptor::StateDescriptor;
use crate::donor::select_donor;
use crate::error::{Error, Result};
use crate::member::{Member, MemberId, MemberStatus};
use crate::message::{
    ComponentView, ConfChange, ConfMember, MessageKind, RecvMessage, RequestOutcome, StateRequest,
};
use crate::quorum;
use crate::types::{ProtoVersion, Seqno};

/// Phase of the group state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No quorum; the group cannot commit.
    NonPrimary,
    /// Primary component delivered, waiting for the exchange-round UUID.
    WaitStateUuid,
    /// Exchange-round UUID known, collecting per-member state descriptors.
    WaitStateMsg,
    /// Quorum established, normal operation.
    Primary,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::NonPrimary => "non-primary",
            Phase::WaitStateUuid => "wait-state-uuid",
            Phase::WaitStateMsg => "wait-state-msg",
            Phase::Primary => "primary",
        };
        write!(f, "{}", s)
    }
}

/// Result of dispatching one ordered data message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// A state-exchange message was processed; the machine is now in this
    /// phase.
    Phase(Phase),
    /// An applied-seqno report was processed; `Some` carries the new
    /// group-wide minimum if it moved.
    LastApplied(Option<Seqno>),
    /// A join completion was processed.
    Join,
}

/// The per-node group state machine.
#[derive(Debug)]
pub struct GroupState {
    /// Member table, indexed by position in the current component.
    members: Vec<Member>,
    /// Own index within `members`.
    my_idx: usize,
    phase: Phase,
    /// Last globally ordered action seqno known to the group.
    act_id: Seqno,
    /// Configuration generation; advances by one per accepted primary.
    conf_id: Seqno,
    /// Stable identity of the replicated dataset.
    group_uuid: Uuid,
    /// Identity of the state-exchange round in flight (NIL outside one).
    state_uuid: Uuid,
    /// Negotiated protocol version.
    proto: ProtoVersion,
    /// Group-wide applied minimum and the member pinning it.
    last_applied: Seqno,
    last_node: usize,
    /// Set when this node missed primary configurations and needs an
    /// external snapshot; carried on the next configuration-change action.
    snapshot_required: bool,
    /// The locally configured profile, authoritative for the own record.
    profile: NodeConfig,
}

impl GroupState {
    /// Create a machine that has never seen a component.
    pub fn new(profile: NodeConfig) -> Result<Self> {
        profile.validate()?;
        let own = Member::with_profile(
            MemberId::unset(),
            profile.name.clone(),
            profile.incoming_address.clone(),
            profile.proto_min(),
            profile.proto_max(),
        );
        Ok(GroupState {
            members: vec![own],
            my_idx: 0,
            phase: Phase::NonPrimary,
            act_id: Seqno::new(0),
            conf_id: Seqno::ILL,
            group_uuid: Uuid::nil(),
            state_uuid: Uuid::nil(),
            proto: ProtoVersion::UNSET,
            last_applied: Seqno::ILL,
            last_node: 0,
            snapshot_required: false,
            profile,
        })
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn act_id(&self) -> Seqno {
        self.act_id
    }

    #[inline]
    pub fn conf_id(&self) -> Seqno {
        self.conf_id
    }

    #[inline]
    pub fn group_uuid(&self) -> Uuid {
        self.group_uuid
    }

    #[inline]
    pub fn state_uuid(&self) -> Uuid {
        self.state_uuid
    }

    #[inline]
    pub fn proto(&self) -> ProtoVersion {
        self.proto
    }

    #[inline]
    pub fn last_applied(&self) -> Seqno {
        self.last_applied
    }

    /// Index of the member currently pinning the group-wide minimum.
    #[inline]
    pub fn last_node(&self) -> usize {
        self.last_node
    }

    #[inline]
    pub fn my_idx(&self) -> usize {
        self.my_idx
    }

    #[inline]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    // ========================================================================
    // Event handlers
    // ========================================================================

    /// Process a component change delivered by the transport.
    ///
    /// The member table is rebuilt from the delivered membership; surviving
    /// members move over with status, applied mark and transfer pairing
    /// intact. A primary component either bootstraps the group (first-ever,
    /// alone), starts a state exchange (anyone new), or skips straight to
    /// the next configuration (same membership as the previous primary).
    pub fn handle_component(&mut self, comp: &ComponentView) -> Result<Phase> {
        debug!(
            primary = comp.primary(),
            my_idx = comp.my_idx(),
            memb_num = comp.len(),
            "component message"
        );

        // The table rebuild is the only fallible step; take it before any
        // state is touched so a failed event leaves the machine unchanged.
        let mut new_members: Vec<Member> = Vec::new();
        new_members
            .try_reserve_exact(comp.len())
            .map_err(|_| Error::Capacity {
                members: comp.len(),
            })?;
        for id in comp.members() {
            new_members.push(Member::new(id.clone()));
        }

        let bootstrap = comp.primary()
            && comp.len() == 1
            && self.phase != Phase::Primary
            && self.act_id == Seqno::new(0)
            && self.conf_id == Seqno::ILL;

        // A primary component reached while we sat in non-primary with real
        // history means we missed configurations in between: our state can
        // no longer be healed through the ordinary transfer handshake.
        let discontinuity = comp.primary()
            && self.phase != Phase::Primary
            && !bootstrap
            && (self.act_id != Seqno::new(0) || self.conf_id != Seqno::ILL);
        self.snapshot_required = discontinuity;
        if discontinuity {
            warn!("discontinuity in primary configurations, state snapshot needed");
        }

        if bootstrap {
            // Take over the transport-assigned ID so the remap below
            // recognizes the founding record as carried over.
            self.members[self.my_idx].set_id(comp.members()[0].clone());
        }

        if !comp.primary() {
            self.go_non_primary();
        }

        // Remap the old table onto the new membership to preserve
        // continuity; anyone without a predecessor is a new member.
        let mut new_memb = false;
        let mut old_members: Vec<Option<Member>> =
            std::mem::take(&mut self.members).into_iter().map(Some).collect();
        for member in new_members.iter_mut() {
            let old = old_members
                .iter_mut()
                .find(|slot| matches!(slot.as_ref(), Some(m) if m.id() == member.id()))
                .and_then(Option::take);
            match old {
                Some(old) => member.adopt(old),
                None => new_memb = true,
            }
        }

        self.members = new_members;
        self.my_idx = comp.my_idx();
        let own = &mut self.members[self.my_idx];
        own.set_profile(
            &self.profile.name,
            &self.profile.incoming_address,
            self.profile.proto_min(),
            self.profile.proto_max(),
        );

        if comp.primary() {
            if bootstrap {
                self.bootstrap();
            } else if new_memb || self.phase == Phase::NonPrimary {
                // someone joined (or we rejoined): a fresh exchange decides
                // the configuration
                for member in &mut self.members {
                    member.reset();
                }
                self.phase = Phase::WaitStateUuid;
                self.state_uuid = Uuid::nil();
            } else if self.phase == Phase::Primary {
                // no new members since the last primary: reuse the cached
                // descriptors instead of a full exchange
                self.post_state_exchange();
            }
            // in Wait* phases the running exchange simply continues
        }

        self.redo_last_applied();

        Ok(self.phase)
    }

    /// Adopt the state-exchange round UUID. Valid only while waiting for
    /// one; anything else is a stray from a previous round.
    pub fn handle_state_uuid(&mut self, sender_idx: usize, uuid: Uuid) -> Phase {
        if self.phase == Phase::WaitStateUuid {
            self.state_uuid = uuid;
            self.phase = Phase::WaitStateMsg;
        } else {
            debug!(
                %uuid,
                sender_idx,
                phase = %self.phase,
                "stray state UUID message"
            );
        }
        self.phase
    }

    /// Record a state descriptor received from `sender_idx` and, once every
    /// member has reported for this round, apply the quorum decision.
    pub fn handle_state_msg(&mut self, sender_idx: usize, payload: &Bytes) -> Phase {
        if self.phase != Phase::WaitStateMsg {
            return self.phase;
        }

        let desc = match StateDescriptor::from_bytes(payload) {
            Ok(desc) => desc,
            Err(err) => {
                warn!(sender_idx, %err, "could not parse state message");
                return self.phase;
            }
        };

        if sender_idx >= self.members.len() {
            warn!(sender_idx, "state message from unknown member index");
            return self.phase;
        }

        if desc.state_uuid() == self.state_uuid {
            info!(state_uuid = %desc.state_uuid(), sender_idx, "state exchange: got state message");
            self.members[sender_idx].record_state(desc);
            self.post_state_exchange();
        } else {
            debug!(
                msg_uuid = %desc.state_uuid(),
                current = %self.state_uuid,
                sender_idx,
                "state exchange: stray state message"
            );
        }

        self.phase
    }

    /// Record an applied-seqno report.
    ///
    /// Returns the new group-wide minimum if this report moved it.
    pub fn handle_last(&mut self, sender_idx: usize, seqno: Seqno) -> Option<Seqno> {
        if sender_idx >= self.members.len() {
            warn!(sender_idx, "last-applied report from unknown member index");
            return None;
        }

        self.members[sender_idx].set_last_applied(seqno);

        if sender_idx == self.last_node && seqno > self.last_applied {
            // the member pinning the minimum advanced it
            let old = self.last_applied;
            self.redo_last_applied();
            if old != self.last_applied {
                return Some(self.last_applied);
            }
        }

        None
    }

    /// Process a join completion from a donor.
    ///
    /// The donor is released regardless; a non-negative seqno additionally
    /// promotes the paired joiner if it is still present and still paired
    /// with this donor. A JOIN from anyone that is not a donor is a
    /// protocol violation and changes nothing.
    pub fn handle_join(&mut self, sender_idx: usize, seqno: Seqno) -> Result<()> {
        let donor_idx = sender_idx;
        if donor_idx >= self.members.len() {
            return Err(Error::Malformed {
                what: "join sender index",
                len: donor_idx,
            });
        }

        let donor_status = self.members[donor_idx].status();
        if donor_status != MemberStatus::Donor {
            error!(
                sender_idx,
                status = %donor_status,
                "protocol violation: JOIN message sender is not a donor"
            );
            return Err(Error::ProtocolViolation {
                sender_idx,
                status: donor_status,
                reason: "JOIN message sender is not a donor",
            });
        }

        self.members[donor_idx].set_status(MemberStatus::Joined);

        // Find the joiner; seek backwards as new members cluster at the end.
        let joiner_id = self.members[donor_idx].joiner().cloned();
        let joiner_idx = joiner_id.as_ref().and_then(|id| {
            (0..self.members.len())
                .rev()
                .find(|&j| j != donor_idx && self.members[j].id() == id)
        });

        if seqno < Seqno::new(0) {
            warn!(
                error = seqno.value(),
                donor_idx,
                donor = self.members[donor_idx].name(),
                ?joiner_idx,
                "state transfer failed"
            );
            return Ok(());
        }

        // The joiner may have left the component, or re-paired with another
        // donor in the meantime; its completion then has no local effect.
        if let Some(joiner_idx) = joiner_idx {
            let donor_id = self.members[donor_idx].id().clone();
            let joiner = &mut self.members[joiner_idx];
            if joiner.donor() == Some(&donor_id) && joiner.status() == MemberStatus::Prim {
                joiner.set_status(MemberStatus::Joined);
            }
        }

        info!(donor_idx, ?joiner_idx, seqno = seqno.value(), "state transfer complete");
        Ok(())
    }

    /// Process a state-transfer request from the member at `joiner_idx`.
    ///
    /// On success both sides of the pairing are reserved. The selected
    /// donor index is written into the request's `id` field on the
    /// requesting node only; the donor delivers the payload to its
    /// application layer, everyone else discards it.
    pub fn handle_state_request(
        &mut self,
        joiner_idx: usize,
        request: &mut StateRequest<'_>,
    ) -> Result<RequestOutcome> {
        if joiner_idx >= self.members.len() {
            return Err(Error::Malformed {
                what: "state request sender index",
                len: joiner_idx,
            });
        }

        if self.members[joiner_idx].status() != MemberStatus::Prim {
            if self.my_idx == joiner_idx {
                error!("requesting state transfer while joined, ignoring");
                request.id = Error::AlreadyJoined.errno();
                return Err(Error::AlreadyJoined);
            }
            error!(joiner_idx, "node requested state transfer but is joined already");
            return Ok(RequestOutcome::Discard);
        }

        let Some(donor_idx) = select_donor(&self.members, joiner_idx) else {
            if self.my_idx == joiner_idx {
                request.id = Error::DonorUnavailable.errno();
                return Err(Error::DonorUnavailable);
            }
            return Ok(RequestOutcome::Discard);
        };

        // reserve both sides of the pairing
        let donor_id = self.members[donor_idx].id().clone();
        let joiner_id = self.members[joiner_idx].id().clone();
        self.members[donor_idx].set_status(MemberStatus::Donor);
        self.members[donor_idx].set_joiner(joiner_id);
        self.members[joiner_idx].set_donor(donor_id);

        info!(joiner_idx, donor_idx, "state transfer requested, donor selected");

        if self.my_idx == joiner_idx {
            request.id = donor_idx as i64;
            Ok(RequestOutcome::Deliver)
        } else if self.my_idx == donor_idx {
            Ok(RequestOutcome::Deliver)
        } else {
            Ok(RequestOutcome::Discard)
        }
    }

    /// Dispatch one ordered data message by its type tag, decoding the
    /// fixed-size payloads defined by the wire contract.
    pub fn handle_message(&mut self, msg: &RecvMessage) -> Result<Handled> {
        match msg.kind {
            MessageKind::StateUuid => {
                let uuid = Uuid::from_slice(&msg.payload).map_err(|_| Error::Malformed {
                    what: "state UUID payload",
                    len: msg.payload.len(),
                })?;
                Ok(Handled::Phase(self.handle_state_uuid(msg.sender_idx, uuid)))
            }
            MessageKind::StateMsg => Ok(Handled::Phase(
                self.handle_state_msg(msg.sender_idx, &msg.payload),
            )),
            MessageKind::Last => {
                let seqno = decode_seqno_payload(&msg.payload, "last-applied payload")?;
                Ok(Handled::LastApplied(self.handle_last(msg.sender_idx, seqno)))
            }
            MessageKind::Join => {
                let seqno = decode_seqno_payload(&msg.payload, "join payload")?;
                self.handle_join(msg.sender_idx, seqno)?;
                Ok(Handled::Join)
            }
        }
    }

    // ========================================================================
    // Emitted artifacts
    // ========================================================================

    /// Value-copy configuration-change action for the downstream pipeline.
    pub fn conf_change(&self) -> ConfChange {
        ConfChange {
            act_id: self.act_id,
            conf_id: self.conf_id,
            group_uuid: self.group_uuid,
            memb_num: self.members.len() as u32,
            my_idx: self.my_idx as i32,
            members: self
                .members
                .iter()
                .map(|m| ConfMember {
                    id: m.id().clone(),
                    name: m.name().to_string(),
                })
                .collect(),
            snapshot_required: self.snapshot_required,
        }
    }

    /// Own state descriptor for the current exchange round (broadcast by
    /// the dispatcher as a STATE_MSG).
    pub fn state_descriptor(&self) -> StateDescriptor {
        let own = &self.members[self.my_idx];
        StateDescriptor::from_parts(
            self.state_uuid,
            self.group_uuid,
            self.act_id,
            self.conf_id,
            own.status(),
            own.name().to_string(),
            own.inc_addr().to_string(),
            own.proto_min(),
            own.proto_max(),
        )
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn go_non_primary(&mut self) {
        if self.phase != Phase::NonPrimary {
            info!(phase = %self.phase, "entering non-primary state");
        }
        self.phase = Phase::NonPrimary;
        self.conf_id = Seqno::ILL;
        self.state_uuid = Uuid::nil();
        // member statuses stay as they are until the next primary
        // re-evaluates them
    }

    /// First node of a brand-new group: mint the group identity and go
    /// primary without an exchange.
    fn bootstrap(&mut self) {
        debug_assert_eq!(self.members.len(), 1);
        debug_assert_eq!(self.my_idx, 0);

        self.group_uuid = Uuid::new_v4();
        self.conf_id = Seqno::new(0);
        self.act_id = Seqno::new(1);
        self.phase = Phase::Primary;
        self.state_uuid = Uuid::nil();
        self.members[self.my_idx].set_status(MemberStatus::Joined);

        // Forge the own state message so a later exchange round always
        // finds a cached descriptor for the founding node.
        let own_state = self.state_descriptor();
        self.members[self.my_idx].record_state(own_state);

        info!(group_uuid = %self.group_uuid, "starting new group");
    }

    /// Evaluate the collected state descriptors and apply the outcome.
    ///
    /// Returns silently while descriptors from this round are still
    /// missing; members can disappear mid-round, so scanning the table
    /// every time is more reliable than counting arrivals.
    fn post_state_exchange(&mut self) {
        let new_exchange = !self.state_uuid.is_nil();

        let decision = {
            let mut states: Vec<&StateDescriptor> = Vec::with_capacity(self.members.len());
            for member in &self.members {
                match member.state() {
                    Some(desc) if !new_exchange || desc.state_uuid() == self.state_uuid => {
                        states.push(desc);
                    }
                    _ => return, // not everyone has reported for this round
                }
            }
            debug!(state_uuid = %self.state_uuid, "state exchange complete");
            quorum::evaluate(&states)
        };

        if decision.primary {
            self.proto = decision.proto;
            if new_exchange {
                self.phase = Phase::Primary;
                self.act_id = decision.act_id;
                self.conf_id = decision.conf_id.next();
                self.group_uuid = decision.group_uuid;
                self.state_uuid = Uuid::nil();

                // Assign every member its place in the new configuration:
                // up to date, or in need of a state transfer.
                for member in &mut self.members {
                    member.update_status(&decision);
                }
            } else {
                // processing cached state messages: only the generation moves
                debug_assert_eq!(self.phase, Phase::Primary);
                self.conf_id = self.conf_id.next();
            }
        } else {
            self.go_non_primary();
        }

        info!(
            primary = decision.primary,
            act_id = %self.act_id,
            conf_id = %self.conf_id,
            last_applied = %self.last_applied,
            proto = %self.proto,
            group_uuid = %decision.group_uuid,
            "quorum results"
        );
    }

    /// Recompute the group-wide applied minimum and its argmin.
    fn redo_last_applied(&mut self) {
        self.last_node = 0;
        self.last_applied = self.members[0].last_applied();

        for (idx, member) in self.members.iter().enumerate().skip(1) {
            if member.last_applied() < self.last_applied {
                self.last_applied = member.last_applied();
                self.last_node = idx;
            }
        }
    }
}

fn decode_seqno_payload(payload: &Bytes, what: &'static str) -> Result<Seqno> {
    let raw: [u8; 8] = payload.as_ref().try_into().map_err(|_| Error::Malformed {
        what,
        len: payload.len(),
    })?;
    Ok(Seqno::new(i64::from_le_bytes(raw)))
}
