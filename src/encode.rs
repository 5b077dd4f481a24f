//! Serialize data into the group wire protocol.
//!
//! All multi-byte integers on the wire are little-endian. Strings are
//! NUL-terminated with a fixed maximum field size.
use bytes::BufMut;
use uuid::Uuid;

use crate::error::{Error, Result};

pub trait ToWire {
    fn encode<B: BufMut>(&self, buffer: &mut B) -> Result<()>;
}

impl<'a, T: ToWire + 'a + ?Sized> ToWire for &'a T {
    fn encode<B: BufMut>(&self, buffer: &mut B) -> Result<()> {
        (*self).encode(buffer)
    }
}

impl ToWire for u8 {
    fn encode<B: BufMut>(&self, buffer: &mut B) -> Result<()> {
        buffer.put_u8(*self);
        Ok(())
    }
}

impl ToWire for i16 {
    fn encode<B: BufMut>(&self, buffer: &mut B) -> Result<()> {
        buffer.put_i16_le(*self);
        Ok(())
    }
}

impl ToWire for i32 {
    fn encode<B: BufMut>(&self, buffer: &mut B) -> Result<()> {
        buffer.put_i32_le(*self);
        Ok(())
    }
}

impl ToWire for u32 {
    fn encode<B: BufMut>(&self, buffer: &mut B) -> Result<()> {
        buffer.put_u32_le(*self);
        Ok(())
    }
}

impl ToWire for i64 {
    fn encode<B: BufMut>(&self, buffer: &mut B) -> Result<()> {
        buffer.put_i64_le(*self);
        Ok(())
    }
}

impl ToWire for Uuid {
    fn encode<B: BufMut>(&self, buffer: &mut B) -> Result<()> {
        buffer.put_slice(self.as_bytes());
        Ok(())
    }
}

/// Encode a string as a NUL-terminated field.
///
/// `max` is the full field budget including the terminator, so the string
/// itself may be at most `max - 1` bytes and must not contain interior NULs.
pub fn encode_cstr<B: BufMut>(buffer: &mut B, s: &str, max: usize) -> Result<()> {
    if s.len() >= max || s.as_bytes().contains(&0) {
        return Err(Error::Malformed {
            what: "string field",
            len: s.len(),
        });
    }
    buffer.put_slice(s.as_bytes());
    buffer.put_u8(0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_are_little_endian() {
        let mut buf = Vec::new();
        0x0102i16.encode(&mut buf).unwrap();
        0x01020304i32.encode(&mut buf).unwrap();
        assert_eq!(buf, vec![0x02, 0x01, 0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_uuid_is_raw_bytes() {
        let uuid = Uuid::from_bytes([7u8; 16]);
        let mut buf = Vec::new();
        uuid.encode(&mut buf).unwrap();
        assert_eq!(buf, vec![7u8; 16]);
    }

    #[test]
    fn test_cstr_terminated() {
        let mut buf = Vec::new();
        encode_cstr(&mut buf, "node-a", 16).unwrap();
        assert_eq!(buf, b"node-a\0");
    }

    #[test]
    fn test_cstr_too_long() {
        let mut buf = Vec::new();
        // "abcd" needs 5 bytes with the terminator; a 4-byte field is too small
        assert!(encode_cstr(&mut buf, "abcd", 4).is_err());
    }

    #[test]
    fn test_cstr_interior_nul_rejected() {
        let mut buf = Vec::new();
        assert!(encode_cstr(&mut buf, "a\0b", 16).is_err());
    }
}
