//! # Core Wire Components
//!
//! Schema-independent encoding primitives and stream framing.
//!
//! ## Components
//! - **Wire**: varint, tag, length-delimited and fixed-width primitives
//! - **Codec**: Tokio codec framing whole messages on byte streams
//!
//! ## Wire Format
//! ```text
//! frame = (tag payload)*          ; no outer length, boundary from transport
//! tag   = varint(field << 3 | wire_type)
//! ```
//!
//! ## Safety
//! - Varints are capped at 10 bytes
//! - Every length is checked against the remaining buffer before slicing
//! - Stream frames are capped by `FrameCodec::max_frame_size`

pub mod codec;
pub mod wire;
