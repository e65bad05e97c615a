//! Message schemas carried over the wire codec.
//!
//! Two schemas are modeled:
//!
//! | message         | field | name       | type   |
//! |-----------------|-------|------------|--------|
//! | `SignInRequest` | 1     | device_id  | uint64 |
//! |                 | 2     | user_id    | uint64 |
//! |                 | 3     | token      | string |
//! | `ResponsePacket`| 1     | command    | uint32 |
//! |                 | 2     | request_id | uint64 |
//! |                 | 3     | code       | int32  |
//! |                 | 4     | message    | string |
//! |                 | 5     | data       | bytes  |
//!
//! The packet schema doubles as the envelope for outbound requests; see
//! [`encode_envelope`].

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::core::wire::{
    decode_length_delimited, decode_string, decode_varint, put_length_delimited, put_tag,
    put_varint, skip_field, Tag, WireType,
};
use crate::error::{constants, Result};

/// Code carried by the sentinel packet produced for unparseable frames.
pub const PARSE_ERROR_CODE: i32 = -1;

const SIGN_IN_DEVICE_ID: u32 = 1;
const SIGN_IN_USER_ID: u32 = 2;
const SIGN_IN_TOKEN: u32 = 3;

const PACKET_COMMAND: u32 = 1;
const PACKET_REQUEST_ID: u32 = 2;
const PACKET_CODE: u32 = 3;
const PACKET_MESSAGE: u32 = 4;
const PACKET_DATA: u32 = 5;

/// Gateway command numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    SignIn,
    Other(u32),
}

impl Command {
    pub const SIGN_IN: u32 = 1;

    pub fn value(self) -> u32 {
        match self {
            Command::SignIn => Self::SIGN_IN,
            Command::Other(raw) => raw,
        }
    }
}

impl From<u32> for Command {
    fn from(raw: u32) -> Self {
        match raw {
            Self::SIGN_IN => Command::SignIn,
            other => Command::Other(other),
        }
    }
}

/// Credentials presented on sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInRequest {
    pub device_id: u64,
    pub user_id: u64,
    pub token: String,
}

impl SignInRequest {
    pub fn new(user_id: u64, device_id: u64, token: impl Into<String>) -> Self {
        Self {
            device_id,
            user_id,
            token: token.into(),
        }
    }

    /// Encode all three fields in ascending field order.
    /// Re-encode as an envelope, eliding default fields.
    pub fn encode(&self) -> Bytes {
        encode_sign_in_request(self.user_id, self.device_id, &self.token)
    }

    /// Decode a sign-in request, skipping unknown fields.
    ///
    /// Unlike [`decode_response_packet`] this propagates codec faults.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut request = SignInRequest::new(0, 0, String::new());
        let mut offset = 0;

        while offset < buf.len() {
            let (tag, next) = Tag::decode(buf, offset)?;
            offset = match (tag.field_number, tag.wire_type) {
                (SIGN_IN_DEVICE_ID, WireType::Varint) => {
                    let (value, next) = decode_varint(buf, next)?;
                    request.device_id = value;
                    next
                }
                (SIGN_IN_USER_ID, WireType::Varint) => {
                    let (value, next) = decode_varint(buf, next)?;
                    request.user_id = value;
                    next
                }
                (SIGN_IN_TOKEN, WireType::LengthDelimited) => {
                    let (value, next) = decode_string(buf, next)?;
                    request.token = value;
                    next
                }
                (_, wire_type) => skip_field(buf, next, wire_type)?,
            };
        }

        Ok(request)
    }
}

/// Encode a sign-in request: `08 <device_id> 10 <user_id> 1A <len> <token>`.
pub fn encode_sign_in_request(user_id: u64, device_id: u64, token: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(24 + token.len());

    put_tag(&mut buf, field_tag(SIGN_IN_DEVICE_ID, WireType::Varint));
    put_varint(&mut buf, device_id);

    put_tag(&mut buf, field_tag(SIGN_IN_USER_ID, WireType::Varint));
    put_varint(&mut buf, user_id);

    put_tag(&mut buf, field_tag(SIGN_IN_TOKEN, WireType::LengthDelimited));
    put_length_delimited(&mut buf, token.as_bytes());

    buf.freeze()
}

/// Encode a packet envelope, omitting every zero or empty field.
///
/// Negative codes are written as ten-byte sign-extended varints (protobuf
/// `int32`), so `encode_envelope(0, 0, 0, "", None)` is empty.
pub fn encode_envelope(
    command: u32,
    request_id: u64,
    code: i32,
    message: &str,
    data: Option<&[u8]>,
) -> Bytes {
    let data = data.filter(|d| !d.is_empty());
    let mut buf = BytesMut::with_capacity(
        32 + message.len() + data.map(<[u8]>::len).unwrap_or_default(),
    );

    if command != 0 {
        put_tag(&mut buf, field_tag(PACKET_COMMAND, WireType::Varint));
        put_varint(&mut buf, u64::from(command));
    }

    if request_id != 0 {
        put_tag(&mut buf, field_tag(PACKET_REQUEST_ID, WireType::Varint));
        put_varint(&mut buf, request_id);
    }

    if code != 0 {
        put_tag(&mut buf, field_tag(PACKET_CODE, WireType::Varint));
        put_varint(&mut buf, i64::from(code) as u64);
    }

    if !message.is_empty() {
        put_tag(&mut buf, field_tag(PACKET_MESSAGE, WireType::LengthDelimited));
        put_length_delimited(&mut buf, message.as_bytes());
    }

    if let Some(data) = data {
        put_tag(&mut buf, field_tag(PACKET_DATA, WireType::LengthDelimited));
        put_length_delimited(&mut buf, data);
    }

    buf.freeze()
}

/// Inbound response (and outbound envelope) packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponsePacket {
    pub command: u32,
    pub request_id: u64,
    pub code: i32,
    pub message: String,
    pub data: Option<Bytes>,
}

impl ResponsePacket {
    /// The packet substituted for a frame that could not be decoded.
    pub fn parse_error() -> Self {
        Self {
            code: PARSE_ERROR_CODE,
            message: constants::MSG_PARSE_ERROR.to_string(),
            ..Self::default()
        }
    }

    /// Whether this is the sentinel produced by a decode fault.
    ///
    /// A peer that itself answers with code `-1` and the same message is
    /// indistinguishable from a local parse failure.
    pub fn is_parse_error(&self) -> bool {
        self.code == PARSE_ERROR_CODE && self.message == constants::MSG_PARSE_ERROR
    }

    /// Code `0` is the only success.
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    pub fn command(&self) -> Command {
        Command::from(self.command)
    }

    pub fn encode(&self) -> Bytes {
        encode_envelope(
            self.command,
            self.request_id,
            self.code,
            &self.message,
            self.data.as_deref(),
        )
    }
}

/// Decode a response frame, turning any codec fault into the sentinel packet.
pub fn decode_response_packet(buf: &[u8]) -> ResponsePacket {
    match try_decode_response_packet(buf) {
        Ok(packet) => packet,
        Err(e) => {
            debug!(error = %e, len = buf.len(), "Response frame could not be decoded");
            ResponsePacket::parse_error()
        }
    }
}

/// Decode a response frame, reporting codec faults.
///
/// Fields may appear in any order; the last occurrence wins. Unknown field
/// numbers, and known numbers carrying an unexpected wire type, are skipped
/// according to the wire type on their tag.
pub fn try_decode_response_packet(buf: &[u8]) -> Result<ResponsePacket> {
    let mut packet = ResponsePacket::default();
    let mut offset = 0;

    while offset < buf.len() {
        let (tag, next) = Tag::decode(buf, offset)?;
        offset = match (tag.field_number, tag.wire_type) {
            (PACKET_COMMAND, WireType::Varint) => {
                let (value, next) = decode_varint(buf, next)?;
                packet.command = value as u32;
                next
            }
            (PACKET_REQUEST_ID, WireType::Varint) => {
                let (value, next) = decode_varint(buf, next)?;
                packet.request_id = value;
                next
            }
            (PACKET_CODE, WireType::Varint) => {
                let (value, next) = decode_varint(buf, next)?;
                packet.code = value as i32;
                next
            }
            (PACKET_MESSAGE, WireType::LengthDelimited) => {
                let (value, next) = decode_string(buf, next)?;
                packet.message = value;
                next
            }
            (PACKET_DATA, WireType::LengthDelimited) => {
                let (value, next) = decode_length_delimited(buf, next)?;
                packet.data = Some(Bytes::copy_from_slice(value));
                next
            }
            (_, wire_type) => skip_field(buf, next, wire_type)?,
        };
    }

    Ok(packet)
}

#[inline]
fn field_tag(field_number: u32, wire_type: WireType) -> Tag {
    Tag {
        field_number,
        wire_type,
    }
}
