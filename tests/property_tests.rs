//! Property-based tests using proptest
//!
//! These tests check codec invariants across randomly generated inputs:
//! round trips, forward compatibility with unknown fields, and that decoding
//! arbitrary bytes never panics.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::{BufMut, BytesMut};
use im_signin::core::codec::FrameCodec;
use im_signin::core::wire::{decode_varint, encode_length_delimited, encode_varint, varint_len};
use im_signin::protocol::message::try_decode_response_packet;
use im_signin::{
    decode_response_packet, encode_envelope, encode_sign_in_request, ResponsePacket,
    SignInRequest,
};
use proptest::prelude::*;
use tokio_util::codec::{Decoder, Encoder};

// Property: varints round trip and use the minimal length
proptest! {
    #[test]
    fn prop_varint_roundtrip(value in any::<u64>()) {
        let encoded = encode_varint(value);
        prop_assert_eq!(encoded.len(), varint_len(value));
        prop_assert!(encoded.len() <= 10);

        let (decoded, next) = decode_varint(&encoded, 0).expect("valid varint");
        prop_assert_eq!(decoded, value);
        prop_assert_eq!(next, encoded.len());
    }
}

// Property: a sign-in request decodes back to its inputs
proptest! {
    #[test]
    fn prop_sign_in_roundtrip(
        user_id in any::<u64>(),
        device_id in any::<u64>(),
        token in ".{0,64}",
    ) {
        let encoded = encode_sign_in_request(user_id, device_id, &token);
        let decoded = SignInRequest::decode(&encoded).expect("decodes");

        prop_assert_eq!(decoded, SignInRequest::new(user_id, device_id, token));
    }
}

// Property: envelope fields survive a round trip through the response decoder
proptest! {
    #[test]
    fn prop_envelope_roundtrip(
        command in any::<u32>(),
        request_id in any::<u64>(),
        code in any::<i32>(),
        message in "[a-zA-Z0-9 ]{0,32}",
        data in prop::collection::vec(any::<u8>(), 0..128),
    ) {
        let encoded = encode_envelope(command, request_id, code, &message, Some(&data[..]));
        let packet = try_decode_response_packet(&encoded).expect("decodes");

        prop_assert_eq!(packet.command, command);
        prop_assert_eq!(packet.request_id, request_id);
        prop_assert_eq!(packet.code, code);
        prop_assert_eq!(&packet.message, &message);
        prop_assert_eq!(packet.data.as_deref().unwrap_or_default(), &data[..]);
    }
}

// Property: an unknown field interleaved anywhere does not change the result
proptest! {
    #[test]
    fn prop_unknown_field_is_ignored(
        code in any::<i32>(),
        message in "[a-z]{0,16}",
        unknown in any::<u64>(),
        payload in prop::collection::vec(any::<u8>(), 0..32),
        length_delimited in any::<bool>(),
        position in 0usize..3,
    ) {
        let known = encode_envelope(0, 0, code, &message, None);
        let expected = decode_response_packet(&known);

        let mut field = BytesMut::new();
        if length_delimited {
            field.put_slice(&encode_varint((99 << 3) | 2));
            field.put_slice(&encode_length_delimited(&payload));
        } else {
            field.put_slice(&encode_varint(99 << 3));
            field.put_slice(&encode_varint(unknown));
        }

        // Split only on field boundaries: before, between code and message, after
        let code_len = if code == 0 { 0 } else { 1 + varint_len(i64::from(code) as u64) };
        let split = match position {
            0 => 0,
            1 => code_len,
            _ => known.len(),
        };

        let mut frame = BytesMut::new();
        frame.put_slice(&known[..split]);
        frame.put_slice(&field);
        frame.put_slice(&known[split..]);

        prop_assert_eq!(decode_response_packet(&frame), expected);
    }
}

// Property: decoding arbitrary bytes never panics and faults map to the sentinel
proptest! {
    #[test]
    fn prop_decode_arbitrary_bytes(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let packet = decode_response_packet(&data);
        match try_decode_response_packet(&data) {
            Ok(decoded) => prop_assert_eq!(packet, decoded),
            Err(_) => prop_assert_eq!(packet, ResponsePacket::parse_error()),
        }

        let _ = SignInRequest::decode(&data);
    }
}

// Property: frames survive the stream codec regardless of how reads are split
proptest! {
    #[test]
    fn prop_frame_codec_roundtrip(
        frames in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..512), 1..8),
        chunk in 1usize..64,
    ) {
        let mut codec = FrameCodec::default();
        let mut wire = BytesMut::new();
        for frame in &frames {
            codec.encode(bytes::Bytes::from(frame.clone()), &mut wire).expect("encodes");
        }

        let mut buffer = BytesMut::new();
        let mut decoded = Vec::new();
        for piece in wire.chunks(chunk) {
            buffer.extend_from_slice(piece);
            while let Some(frame) = codec.decode(&mut buffer).expect("decodes") {
                decoded.push(frame.to_vec());
            }
        }

        prop_assert!(buffer.is_empty());
        prop_assert_eq!(decoded, frames);
    }
}
