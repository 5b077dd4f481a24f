//! State descriptors exchanged between members.
//!
//! On every new primary component the members run a state exchange: each
//! broadcasts a [`StateDescriptor`] snapshot of its view (identity UUIDs,
//! sequence numbers, status, advertised profile) tagged with the UUID of the
//! exchange round it belongs to. The quorum evaluator consumes the full set.
//!
//! Descriptors are immutable after construction and carry their own wire
//! codec.
//!
//! # Wire Format
//!
//! Total length prefixed as little-endian `u32`, then fields in fixed order:
//!
//! | Field | Encoding |
//! |-------|----------|
//! | state-exchange UUID | 16 raw bytes |
//! | group UUID | 16 raw bytes |
//! | `act_id` | i64, little-endian |
//! | `conf_id` | i64, little-endian |
//! | status | 1 byte |
//! | name | NUL-terminated, ≤ 256 bytes |
//! | incoming address | NUL-terminated, ≤ 256 bytes |
//! | protocol min | i16, little-endian |
//! | protocol max | i16, little-endian |

use bytes::{Bytes, BytesMut};
use nom::number::complete::le_u32;
use nombytes::NomBytes;
use uuid::Uuid;

use crate::constants::{MEMBER_ADDR_MAX, MEMBER_NAME_MAX, STATE_DESC_MAX_LEN};
use crate::encode::{ToWire, encode_cstr};
use crate::error::{Error, Result};
use crate::member::MemberStatus;
use crate::parser::{parse_cstr, parse_proto_version, parse_seqno, parse_status, parse_uuid};
use crate::types::{ProtoVersion, Seqno};

/// A member's serializable view of group state, scoped to one exchange round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDescriptor {
    state_uuid: Uuid,
    group_uuid: Uuid,
    act_id: Seqno,
    conf_id: Seqno,
    status: MemberStatus,
    name: String,
    inc_addr: String,
    proto_min: ProtoVersion,
    proto_max: ProtoVersion,
}

impl StateDescriptor {
    /// Build a descriptor, validating the string fields against the wire
    /// limits.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state_uuid: Uuid,
        group_uuid: Uuid,
        act_id: Seqno,
        conf_id: Seqno,
        status: MemberStatus,
        name: String,
        inc_addr: String,
        proto_min: ProtoVersion,
        proto_max: ProtoVersion,
    ) -> Result<Self> {
        if name.len() >= MEMBER_NAME_MAX || name.as_bytes().contains(&0) {
            return Err(Error::Malformed {
                what: "member name",
                len: name.len(),
            });
        }
        if inc_addr.len() >= MEMBER_ADDR_MAX || inc_addr.as_bytes().contains(&0) {
            return Err(Error::Malformed {
                what: "member address",
                len: inc_addr.len(),
            });
        }
        Ok(StateDescriptor {
            state_uuid,
            group_uuid,
            act_id,
            conf_id,
            status,
            name,
            inc_addr,
            proto_min,
            proto_max,
        })
    }

    /// Build a descriptor from fields already validated elsewhere (the
    /// local node's own profile is checked once at configuration time).
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        state_uuid: Uuid,
        group_uuid: Uuid,
        act_id: Seqno,
        conf_id: Seqno,
        status: MemberStatus,
        name: String,
        inc_addr: String,
        proto_min: ProtoVersion,
        proto_max: ProtoVersion,
    ) -> Self {
        StateDescriptor {
            state_uuid,
            group_uuid,
            act_id,
            conf_id,
            status,
            name,
            inc_addr,
            proto_min,
            proto_max,
        }
    }

    /// UUID of the exchange round this descriptor belongs to.
    #[inline]
    pub fn state_uuid(&self) -> Uuid {
        self.state_uuid
    }

    #[inline]
    pub fn group_uuid(&self) -> Uuid {
        self.group_uuid
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
    pub fn status(&self) -> MemberStatus {
        self.status
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

    /// Serialize into a length-prefixed wire buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut body = BytesMut::with_capacity(STATE_DESC_MAX_LEN);
        self.state_uuid.encode(&mut body)?;
        self.group_uuid.encode(&mut body)?;
        self.act_id.encode(&mut body)?;
        self.conf_id.encode(&mut body)?;
        (self.status as u8).encode(&mut body)?;
        encode_cstr(&mut body, &self.name, MEMBER_NAME_MAX)?;
        encode_cstr(&mut body, &self.inc_addr, MEMBER_ADDR_MAX)?;
        self.proto_min.encode(&mut body)?;
        self.proto_max.encode(&mut body)?;

        let mut buf = BytesMut::with_capacity(4 + body.len());
        (body.len() as u32).encode(&mut buf)?;
        buf.extend_from_slice(&body);
        Ok(buf.freeze())
    }

    /// Deserialize from a length-prefixed wire buffer.
    pub fn from_bytes(bytes: &Bytes) -> Result<StateDescriptor> {
        let malformed = || Error::Malformed {
            what: "state descriptor",
            len: bytes.len(),
        };

        if bytes.len() > STATE_DESC_MAX_LEN {
            return Err(malformed());
        }

        let input = NomBytes::from(bytes.as_ref());
        let (rest, body_len) = le_u32::<_, nom::error::Error<NomBytes>>(input)
            .map_err(|_| malformed())?;
        if body_len as usize != bytes.len().saturating_sub(4) {
            return Err(malformed());
        }

        let (_, desc) = parse_state_descriptor(rest).map_err(|_| malformed())?;
        Ok(desc)
    }
}

/// Parse the descriptor body (everything after the length prefix).
fn parse_state_descriptor(s: NomBytes) -> nom::IResult<NomBytes, StateDescriptor> {
    let (s, state_uuid) = parse_uuid(s)?;
    let (s, group_uuid) = parse_uuid(s)?;
    let (s, act_id) = parse_seqno(s)?;
    let (s, conf_id) = parse_seqno(s)?;
    let (s, status) = parse_status(s)?;
    let (s, name) = parse_cstr(MEMBER_NAME_MAX)(s)?;
    let (s, inc_addr) = parse_cstr(MEMBER_ADDR_MAX)(s)?;
    let (s, proto_min) = parse_proto_version(s)?;
    let (s, proto_max) = parse_proto_version(s)?;

    Ok((
        s,
        StateDescriptor {
            state_uuid,
            group_uuid,
            act_id,
            conf_id,
            status,
            name,
            inc_addr,
            proto_min,
            proto_max,
        },
    ))
}
