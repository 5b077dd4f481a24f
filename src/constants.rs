//! Centralized wire-contract and protocol constants.
//!
//! This module consolidates the fixed limits of the group protocol. Having
//! them in one place makes it easier to:
//!
//! - Understand the wire contract at a glance
//! - Update values consistently
//! - Document the rationale for each constant
//!
//! Most of these values are part of the wire contract shared by every member
//! of a group: changing them is a protocol-breaking change.

// =============================================================================
// Identifier Limits
// =============================================================================

/// Maximum length of a member ID in bytes.
///
/// Member IDs are opaque byte strings assigned by the group-communication
/// transport and must be unique within a component. The bound keeps
/// membership messages small and comparisons cheap.
pub const MEMBER_ID_MAX_LEN: usize = 40;

/// Maximum size of a member name field on the wire, including the NUL
/// terminator (255 usable bytes).
pub const MEMBER_NAME_MAX: usize = 256;

/// Maximum size of a member incoming-address field on the wire, including
/// the NUL terminator (255 usable bytes).
pub const MEMBER_ADDR_MAX: usize = 256;

// =============================================================================
// Message Sizes
// =============================================================================

/// Size of a serialized UUID (state-exchange UUID broadcast payload).
pub const UUID_WIRE_LEN: usize = 16;

/// Size of a serialized sequence number (LAST and JOIN payloads).
pub const SEQNO_WIRE_LEN: usize = 8;

/// Upper bound on a serialized state descriptor.
///
/// Two UUIDs, two seqnos, one status byte, two bounded NUL-terminated
/// strings and two protocol versions, plus the length prefix. Anything
/// larger is malformed and rejected before parsing.
pub const STATE_DESC_MAX_LEN: usize =
    4 + 2 * UUID_WIRE_LEN + 2 * SEQNO_WIRE_LEN + 1 + MEMBER_NAME_MAX + MEMBER_ADDR_MAX + 2 * 2;

/// Practical upper bound on component size.
///
/// Donor/joiner partner resolution is a linear scan over the member table,
/// which is only acceptable because components stay small. The transport
/// enforces this; the core uses it solely to size pre-allocations.
pub const COMPONENT_MAX_MEMBERS: usize = 64;

// =============================================================================
// Tests
// =============================================================================
