//! # Wire Codec
//!
//! Schema-independent primitives for the protobuf-style wire format.
//!
//! Only four wire types are understood: varint, fixed64, length-delimited and
//! fixed32. Every field on the wire is a tag followed by its payload:
//!
//! ```text
//! tag     = varint(field_number << 3 | wire_type)
//! payload = varint | 8 bytes LE | varint(len) bytes | 4 bytes LE
//! ```
//!
//! Decoders work on a borrowed buffer and an offset and return the offset of
//! the next unread byte, so a message decoder can walk a frame without copying.
//! Every read is bounds-checked; running off the end of a buffer is reported as
//! [`ProtocolError::TruncatedBuffer`] or [`ProtocolError::MalformedVarint`].

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, Result};

/// Longest possible varint encoding of a `u64` (ceil(64 / 7)).
pub const MAX_VARINT_LEN: usize = 10;

/// Largest field number a tag may carry.
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// How a field's payload is laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl WireType {
    /// Map the low three bits of a tag to a wire type.
    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            other => Err(ProtocolError::UnsupportedWireType(other)),
        }
    }

    /// Value stored in the low three bits of a tag.
    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// Field header: field number plus wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    pub field_number: u32,
    pub wire_type: WireType,
}

impl Tag {
    /// Build a tag, rejecting field numbers outside `1..=2^29-1`.
    pub fn new(field_number: u32, wire_type: WireType) -> Result<Self> {
        if field_number == 0 || field_number > MAX_FIELD_NUMBER {
            return Err(ProtocolError::InvalidTag(u64::from(field_number)));
        }
        Ok(Self {
            field_number,
            wire_type,
        })
    }

    /// Packed `field_number << 3 | wire_type` value.
    pub fn value(self) -> u64 {
        (u64::from(self.field_number) << 3) | u64::from(self.wire_type.bits())
    }

    /// Read a tag at `offset`.
    pub fn decode(buf: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (raw, next) = decode_varint(buf, offset)?;
        let field_number = raw >> 3;
        if field_number == 0 || field_number > u64::from(MAX_FIELD_NUMBER) {
            return Err(ProtocolError::InvalidTag(raw));
        }
        let wire_type = WireType::from_bits((raw & 0x7) as u8)?;
        Ok((
            Self {
                field_number: field_number as u32,
                wire_type,
            },
            next,
        ))
    }
}

/// Number of bytes `value` occupies as a varint.
#[inline]
pub fn varint_len(value: u64) -> usize {
    // 1 byte per started group of 7 significant bits, at least one byte
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Append `value` as a minimal base-128 varint.
#[inline]
pub fn put_varint<B: BufMut>(buf: &mut B, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Encode `value` as a standalone varint.
pub fn encode_varint(value: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(varint_len(value));
    put_varint(&mut buf, value);
    buf.freeze()
}

/// Read a varint starting at `offset`, returning the value and the next offset.
///
/// Fails with [`ProtocolError::MalformedVarint`] when the buffer ends before
/// the terminating byte, when a tenth byte still has its continuation bit set,
/// or when the tenth byte carries bits beyond 2^64-1.
pub fn decode_varint(buf: &[u8], offset: usize) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    let mut cursor = offset;

    for index in 0..MAX_VARINT_LEN {
        let byte = *buf.get(cursor).ok_or(ProtocolError::MalformedVarint)?;
        cursor += 1;

        if index == MAX_VARINT_LEN - 1 && byte > 0x01 {
            return Err(ProtocolError::MalformedVarint);
        }

        value |= u64::from(byte & 0x7F) << (7 * index);
        if byte & 0x80 == 0 {
            return Ok((value, cursor));
        }
    }

    Err(ProtocolError::MalformedVarint)
}

/// Append a tag.
#[inline]
pub fn put_tag<B: BufMut>(buf: &mut B, tag: Tag) {
    put_varint(buf, tag.value());
}

/// Append a varint length prefix followed by `bytes`.
pub fn put_length_delimited<B: BufMut>(buf: &mut B, bytes: &[u8]) {
    put_varint(buf, bytes.len() as u64);
    buf.put_slice(bytes);
}

/// Encode a standalone length-delimited payload.
pub fn encode_length_delimited(bytes: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(varint_len(bytes.len() as u64) + bytes.len());
    put_length_delimited(&mut buf, bytes);
    buf.freeze()
}

/// Take `len` bytes at `offset`, bounds-checked.
fn take(buf: &[u8], offset: usize, len: usize) -> Result<(&[u8], usize)> {
    let end = offset
        .checked_add(len)
        .filter(|end| *end <= buf.len())
        .ok_or(ProtocolError::TruncatedBuffer {
            needed: len,
            available: buf.len().saturating_sub(offset),
        })?;
    Ok((&buf[offset..end], end))
}

/// Read a length-prefixed payload at `offset`.
pub fn decode_length_delimited(buf: &[u8], offset: usize) -> Result<(&[u8], usize)> {
    let (len, start) = decode_varint(buf, offset)?;
    let len = usize::try_from(len).map_err(|_| ProtocolError::TruncatedBuffer {
        needed: usize::MAX,
        available: buf.len().saturating_sub(start),
    })?;
    take(buf, start, len)
}

/// Read a length-prefixed string at `offset`.
///
/// Invalid UTF-8 is replaced with U+FFFD rather than rejected.
pub fn decode_string(buf: &[u8], offset: usize) -> Result<(String, usize)> {
    let (bytes, next) = decode_length_delimited(buf, offset)?;
    Ok((String::from_utf8_lossy(bytes).into_owned(), next))
}

/// Append `value` as four little-endian bytes.
pub fn put_fixed32<B: BufMut>(buf: &mut B, value: u32) {
    buf.put_u32_le(value);
}

/// Append `value` as eight little-endian bytes.
pub fn put_fixed64<B: BufMut>(buf: &mut B, value: u64) {
    buf.put_u64_le(value);
}

/// Read a little-endian 32-bit value at `offset`.
pub fn decode_fixed32(buf: &[u8], offset: usize) -> Result<(u32, usize)> {
    let (bytes, next) = take(buf, offset, 4)?;
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    Ok((u32::from_le_bytes(raw), next))
}

/// Read a little-endian 64-bit value at `offset`.
pub fn decode_fixed64(buf: &[u8], offset: usize) -> Result<(u64, usize)> {
    let (bytes, next) = take(buf, offset, 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Ok((u64::from_le_bytes(raw), next))
}

/// Advance past the payload of a field with the given wire type.
pub fn skip_field(buf: &[u8], offset: usize, wire_type: WireType) -> Result<usize> {
    match wire_type {
        WireType::Varint => decode_varint(buf, offset).map(|(_, next)| next),
        WireType::Fixed64 => take(buf, offset, 8).map(|(_, next)| next),
        WireType::LengthDelimited => decode_length_delimited(buf, offset).map(|(_, next)| next),
        WireType::Fixed32 => take(buf, offset, 4).map(|(_, next)| next),
    }
}

/// [`skip_field`] for a raw wire-type value taken straight off a tag.
pub fn skip_field_raw(buf: &[u8], offset: usize, wire_type: u8) -> Result<usize> {
    skip_field(buf, offset, WireType::from_bits(wire_type)?)
}
