//! Deserialize data from the group wire protocol.
//!
//! Counterpart of [`crate::encode`]: little-endian integers, raw 16-byte
//! UUIDs and bounded NUL-terminated strings.
use nom::{
    IResult,
    bytes::complete::take,
    number::complete::{le_i16, le_i64, le_u8},
};
use nombytes::NomBytes;
use num_traits::FromPrimitive;
use uuid::Uuid;

use crate::member::MemberStatus;
use crate::types::{ProtoVersion, Seqno};

fn verify_failure<T>(input: NomBytes) -> IResult<NomBytes, T> {
    Err(nom::Err::Failure(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Verify,
    )))
}

/// Parse a raw 16-byte UUID.
pub fn parse_uuid(s: NomBytes) -> IResult<NomBytes, Uuid> {
    let (s, raw) = take(16usize)(s)?;
    let bytes = raw.into_bytes();
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&bytes);
    Ok((s, Uuid::from_bytes(buf)))
}

/// Parse a little-endian signed 64-bit sequence number.
pub fn parse_seqno(s: NomBytes) -> IResult<NomBytes, Seqno> {
    let (s, value) = le_i64(s)?;
    Ok((s, Seqno::new(value)))
}

/// Parse a little-endian signed 16-bit protocol version.
pub fn parse_proto_version(s: NomBytes) -> IResult<NomBytes, ProtoVersion> {
    let (s, value) = le_i16(s)?;
    Ok((s, ProtoVersion::new(value)))
}

/// Parse a one-byte member status.
///
/// Unknown status values are a hard failure: they indicate a peer speaking
/// a protocol version we did not negotiate.
pub fn parse_status(s: NomBytes) -> IResult<NomBytes, MemberStatus> {
    let (s, value) = le_u8(s)?;
    match MemberStatus::from_u8(value) {
        Some(status) => Ok((s, status)),
        None => verify_failure(s),
    }
}

/// Parse a NUL-terminated UTF-8 string field of at most `max` bytes
/// (terminator included).
///
/// Reads byte-wise until the terminator; exceeding the field budget or
/// invalid UTF-8 is a hard failure.
pub fn parse_cstr(max: usize) -> impl Fn(NomBytes) -> IResult<NomBytes, String> {
    move |input: NomBytes| {
        let mut collected: Vec<u8> = Vec::new();
        let mut remaining = input;

        loop {
            let (s, byte) = take(1usize)(remaining)?;
            let b = byte.into_bytes()[0];
            remaining = s;

            if b == 0 {
                break;
            }

            collected.push(b);
            if collected.len() >= max {
                // no terminator within the field budget
                return verify_failure(remaining);
            }
        }

        match std::str::from_utf8(&collected) {
            Ok(s) => Ok((remaining, s.to_string())),
            Err(_) => verify_failure(remaining),
        }
    }
}
