//! Varint length-prefixed framing for byte-stream transports.
//!
//! Message transports such as WebSocket deliver whole frames and never need
//! this. Stream transports (plain TCP) prefix every wire message with its
//! length as a varint, the same convention protobuf uses for delimited streams.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::wire::{decode_varint, put_varint, varint_len, MAX_VARINT_LEN};
use crate::error::{ProtocolError, Result};

/// Default ceiling on a single frame (1 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Varint length-prefixed framing for stream transports.
///
/// Frames longer than `max_frame_size` are refused in both directions.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.is_empty() {
            return Ok(None);
        }

        // A prefix that is still missing its terminating byte is just incomplete
        let (len, header) = match decode_varint(&src[..], 0) {
            Ok(parsed) => parsed,
            Err(ProtocolError::MalformedVarint) if src.len() < MAX_VARINT_LEN => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };

        let len = usize::try_from(len).map_err(|_| ProtocolError::OversizedFrame(usize::MAX))?;
        if len > self.max_frame_size {
            return Err(ProtocolError::OversizedFrame(len));
        }

        if src.len() < header + len {
            src.reserve(header + len - src.len());
            return Ok(None);
        }

        src.advance(header);
        Ok(Some(src.split_to(len).freeze()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Bytes, dst: &mut BytesMut) -> Result<()> {
        if frame.len() > self.max_frame_size {
            return Err(ProtocolError::OversizedFrame(frame.len()));
        }
        dst.reserve(varint_len(frame.len() as u64) + frame.len());
        put_varint(dst, frame.len() as u64);
        dst.extend_from_slice(&frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn encode_prefixes_length() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec
            .encode(Bytes::from_static(&[0x18, 0x05]), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], &[0x02, 0x18, 0x05]);
    }

    #[test]
    fn partial_prefix_waits_for_more() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&[0x80][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn partial_body_waits_for_more() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&[0x03, 0x01][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn decodes_back_to_back_frames() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&[0x01, 0xAA, 0x02, 0xBB, 0xCC, 0x00][..]);
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], &[0xAA]);
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], &[0xBB, 0xCC]);
        assert!(codec.decode(&mut buf).unwrap().unwrap().is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn oversized_frames_are_rejected_both_ways() {
        let mut codec = FrameCodec::new(4);
        let mut buf = BytesMut::new();
        assert!(matches!(
            codec.encode(Bytes::from_static(&[0; 5]), &mut buf),
            Err(ProtocolError::OversizedFrame(5))
        ));

        let mut buf = BytesMut::from(&[0x05, 0, 0, 0, 0, 0][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::OversizedFrame(5))
        ));
    }
}
