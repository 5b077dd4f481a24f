//! Type-safe wrappers for protocol primitives.
//!
//! These newtypes prevent mixing up integers that share a representation but
//! carry different semantic meanings: global action sequence numbers,
//! configuration generations and protocol versions all travel as plain
//! integers on the wire.

use bytes::BufMut;
use std::fmt;

use crate::encode::ToWire;
use crate::error::Result;

/// A monotonic 64-bit sequence number.
///
/// Used for the globally ordered action ID (`act_id`), the configuration
/// generation (`conf_id`) and per-member applied high-water marks.
///
/// # Special Values
///
/// - [`Seqno::ILL`] (`-1`): unknown/uninitialized. A node that has never
///   been part of a primary component reports `ILL` for its `conf_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Seqno(pub i64);

impl Seqno {
    /// Unknown/uninitialized sequence number.
    pub const ILL: Self = Seqno(-1);

    /// Create a new seqno from a raw value.
    #[inline]
    pub const fn new(value: i64) -> Self {
        Seqno(value)
    }

    /// Get the raw i64 value.
    #[inline]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Check whether the seqno carries a known value.
    #[inline]
    pub const fn is_known(self) -> bool {
        self.0 != Self::ILL.0
    }

    /// The next seqno in sequence.
    #[inline]
    pub fn next(self) -> Self {
        Seqno(self.0.wrapping_add(1))
    }
}

impl From<i64> for Seqno {
    fn from(value: i64) -> Self {
        Seqno(value)
    }
}

impl From<Seqno> for i64 {
    fn from(seqno: Seqno) -> Self {
        seqno.0
    }
}

impl fmt::Display for Seqno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToWire for Seqno {
    fn encode<B: BufMut>(&self, buffer: &mut B) -> Result<()> {
        self.0.encode(buffer)
    }
}

/// A negotiated group protocol version.
///
/// Each member advertises the `[min, max]` range it can speak; the quorum
/// evaluator picks the highest version every member supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ProtoVersion(pub i16);

impl ProtoVersion {
    /// No version negotiated yet.
    pub const UNSET: Self = ProtoVersion(-1);

    /// Create a new protocol version from a raw value.
    #[inline]
    pub const fn new(value: i16) -> Self {
        ProtoVersion(value)
    }

    /// Get the raw i16 value.
    #[inline]
    pub const fn value(self) -> i16 {
        self.0
    }
}

impl From<i16> for ProtoVersion {
    fn from(value: i16) -> Self {
        ProtoVersion(value)
    }
}

impl From<ProtoVersion> for i16 {
    fn from(proto: ProtoVersion) -> Self {
        proto.0
    }
}

impl fmt::Display for ProtoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToWire for ProtoVersion {
    fn encode<B: BufMut>(&self, buffer: &mut B) -> Result<()> {
        self.0.encode(buffer)
    }
}
