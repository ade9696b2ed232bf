//! Length-prefixed, sequenced, checksummed framing.
//!
//! Every frame on the wire is laid out as:
//! - a 4-byte little-endian total length (including itself)
//! - a 4-byte little-endian sequence number
//! - the opaque body
//! - a 4-byte little-endian CRC-32 over everything before it
//!
//! [`encode_frame`] and [`decode_frame`] work on buffers; [`FrameReader`]
//! pulls exactly one frame at a time off an async byte stream.

pub mod codec;
pub mod error;
pub mod reader;

pub use codec::{
    checksum, decode_frame, encode_frame, Frame, FrameConfig, CHECKSUM_SIZE,
    DEFAULT_MAX_FRAME_SIZE, FRAME_OVERHEAD, HEADER_SIZE,
};
pub use error::{FrameError, FrameField, Result};
pub use reader::FrameReader;
