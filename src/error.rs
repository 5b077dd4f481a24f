//! Crate & protocol level errors.
//!
//! # Error Hierarchy
//!
//! The crate distinguishes three kinds of failure:
//!
//! - **Resource exhaustion** ([`Error::Capacity`]): the only fallible
//!   allocation is the member table rebuild on a component change. The event
//!   is rejected and the machine is left untouched.
//! - **Protocol violations** ([`Error::ProtocolViolation`],
//!   [`Error::Malformed`]): a peer sent something the protocol forbids, such
//!   as a JOIN from a node that is not a donor. These never change machine
//!   state. Stray-but-legal messages (late state descriptors from a previous
//!   exchange round) are not errors at all; they are logged and dropped.
//! - **Semantic unavailability** ([`Error::DonorUnavailable`],
//!   [`Error::AlreadyJoined`]): the request is well-formed but cannot be
//!   served right now. Higher layers decide whether to retry.
//!
//! Nothing in the core retries internally.
//!
//! # Errno Mapping
//!
//! Downstream consumers speak POSIX-style negative error codes through the
//! action `id` field. [`Error::errno`] provides that mapping; it is part of
//! the wire contract.

use thiserror::Error as ThisError;

use crate::member::MemberStatus;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the group state machine.
#[derive(Clone, Debug, ThisError, PartialEq, Eq)]
pub enum Error {
    /// Member table allocation failed; the event was rejected whole.
    #[error("out of memory while resizing member table to {members} entries")]
    Capacity { members: usize },

    /// A peer violated the group protocol.
    #[error("protocol violation: {reason} (sender {sender_idx}, status {status})")]
    ProtocolViolation {
        sender_idx: usize,
        status: MemberStatus,
        reason: &'static str,
    },

    /// A message payload could not be decoded.
    #[error("malformed {what} payload ({len} bytes)")]
    Malformed { what: &'static str, len: usize },

    /// No donor is currently able to serve a state transfer; retry later.
    #[error("no donor available for state transfer")]
    DonorUnavailable,

    /// A state transfer was requested by a node that is already joined.
    #[error("state transfer requested while already joined")]
    AlreadyJoined,

    /// Node configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// POSIX-style negative error code for the action `id` field.
    ///
    /// These values are part of the wire contract with the downstream
    /// action pipeline and must not change.
    pub fn errno(&self) -> i64 {
        match self {
            Error::Capacity { .. } => -12,           // ENOMEM
            Error::ProtocolViolation { .. } => -71,  // EPROTO
            Error::Malformed { .. } => -71,          // EPROTO
            Error::DonorUnavailable => -11,          // EAGAIN
            Error::AlreadyJoined => -125,            // ECANCELED
            Error::Config(_) => -22,                 // EINVAL
        }
    }
}
