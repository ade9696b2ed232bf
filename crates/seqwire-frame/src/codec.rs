use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Header: length (4) + sequence (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Trailing CRC-32 size.
pub const CHECKSUM_SIZE: usize = 4;

/// Fixed per-frame overhead: header + checksum = 12 bytes.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + CHECKSUM_SIZE;

/// Default maximum encoded frame size: 16 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// A decoded, checksum-verified frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sender-assigned sequence number.
    pub sequence: u32,
    /// The opaque frame body.
    pub body: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(sequence: u32, body: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            body: body.into(),
        }
    }

    /// The value of the length field: the full encoded size.
    pub fn total_length(&self) -> usize {
        FRAME_OVERHEAD + self.body.len()
    }

    /// The length and sequence fields as they appear on the wire.
    pub fn header_bytes(&self) -> [u8; HEADER_SIZE] {
        encode_header(self.total_length() as u32, self.sequence)
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}

/// CRC-32 (IEEE 802.3) over the header fields and the body.
pub fn checksum(header: &[u8; HEADER_SIZE], body: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(header);
    hasher.update(body);
    hasher.finalize()
}

/// Encode a frame into the wire format.
///
/// Wire format (all fields little-endian u32):
/// ```text
/// ┌────────────┬────────────┬──────────────────┬────────────┐
/// │ Length(4B) │ Seq (4B)   │ Body             │ CRC-32(4B) │
/// │ 12 + body  │            │ (Length-12 B)    │ over [0,L-4)│
/// └────────────┴────────────┴──────────────────┴────────────┘
/// ```
pub fn encode_frame(sequence: u32, body: &[u8], dst: &mut BytesMut) -> Result<()> {
    let max_body = u32::MAX as usize - FRAME_OVERHEAD;
    if body.len() > max_body {
        return Err(FrameError::PayloadTooLarge {
            size: body.len(),
            max: max_body,
        });
    }

    let total = FRAME_OVERHEAD + body.len();
    let header = encode_header(total as u32, sequence);

    dst.reserve(total);
    dst.put_slice(&header);
    dst.put_slice(body);
    dst.put_u32_le(checksum(&header, body));
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. On error the
/// buffer is left untouched.
pub fn decode_frame(src: &mut BytesMut, max_frame_size: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let mut header = [0u8; HEADER_SIZE];
    header.copy_from_slice(&src[..HEADER_SIZE]);
    let (length, sequence) = split_header(&header);
    let total = validate_length(length, max_frame_size)?;

    if src.len() < total {
        return Ok(None);
    }

    let body_end = total - CHECKSUM_SIZE;
    let mut trailer = [0u8; CHECKSUM_SIZE];
    trailer.copy_from_slice(&src[body_end..total]);
    verify_checksum(&header, &src[HEADER_SIZE..body_end], u32::from_le_bytes(trailer))?;

    src.advance(HEADER_SIZE);
    let body = src.split_to(body_end - HEADER_SIZE).freeze();
    src.advance(CHECKSUM_SIZE);

    Ok(Some(Frame { sequence, body }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum encoded frame size in bytes, overhead included. Default: 16 MiB.
    pub max_frame_size: usize,
}

impl FrameConfig {
    /// Largest body that fits in one frame under this configuration.
    pub fn max_body_size(&self) -> usize {
        self.max_frame_size.saturating_sub(FRAME_OVERHEAD)
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

pub(crate) fn encode_header(length: u32, sequence: u32) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[..4].copy_from_slice(&length.to_le_bytes());
    header[4..].copy_from_slice(&sequence.to_le_bytes());
    header
}

pub(crate) fn split_header(header: &[u8; HEADER_SIZE]) -> (u32, u32) {
    let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let sequence = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    (length, sequence)
}

/// Check the length field and return the total frame size.
pub(crate) fn validate_length(length: u32, max_frame_size: usize) -> Result<usize> {
    let total = length as usize;
    if total < FRAME_OVERHEAD {
        return Err(FrameError::InvalidLength { length });
    }
    if total > max_frame_size {
        return Err(FrameError::FrameTooLarge {
            size: total,
            max: max_frame_size,
        });
    }
    Ok(total)
}

pub(crate) fn verify_checksum(header: &[u8; HEADER_SIZE], body: &[u8], expected: u32) -> Result<()> {
    let actual = checksum(header, body);
    if actual != expected {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let body = b"hello, seqwire!";

        encode_frame(7, body, &mut buf).unwrap();
        assert_eq!(buf.len(), FRAME_OVERHEAD + body.len());

        let frame = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .unwrap();
        assert_eq!(frame.sequence, 7);
        assert_eq!(frame.body.as_ref(), body);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_reference_frame_layout() {
        let mut buf = BytesMut::new();
        encode_frame(0, &[0x01, 0x02, 0x03], &mut buf).unwrap();

        assert_eq!(buf.len(), 15);
        assert_eq!(
            &buf[..11],
            &[0x0F, 0, 0, 0, 0, 0, 0, 0, 0x01, 0x02, 0x03]
        );
        let crc = crc32fast::hash(&buf[..11]);
        assert_eq!(&buf[11..], &crc.to_le_bytes());

        let frame = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .unwrap();
        assert_eq!(frame.body.as_ref(), &[0x01, 0x02, 0x03]);
        assert_eq!(frame.sequence, 0);
    }

    #[test]
    fn test_checksum_is_ieee_crc32() {
        let header = encode_header(21, 0);
        let mut whole = header.to_vec();
        whole.extend_from_slice(b"123456789");
        assert_eq!(checksum(&header, b"123456789"), crc32fast::hash(&whole));
        assert_eq!(crc32fast::hash(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_any_bit_flip_after_length_is_detected() {
        let mut wire = BytesMut::new();
        encode_frame(0, &[0x01, 0x02, 0x03], &mut wire).unwrap();

        for byte in HEADER_SIZE - 4..wire.len() {
            for bit in 0..8 {
                let mut corrupted = wire.clone();
                corrupted[byte] ^= 1 << bit;
                let result = decode_frame(&mut corrupted, DEFAULT_MAX_FRAME_SIZE);
                assert!(
                    matches!(result, Err(FrameError::ChecksumMismatch { .. })),
                    "byte {byte} bit {bit}: {result:?}"
                );
            }
        }
    }

    #[test]
    fn test_length_bit_flip_never_yields_a_frame() {
        let mut wire = BytesMut::new();
        encode_frame(0, &[0x01, 0x02, 0x03], &mut wire).unwrap();

        for byte in 0..4 {
            for bit in 0..8 {
                let mut corrupted = wire.clone();
                corrupted[byte] ^= 1 << bit;
                let result = decode_frame(&mut corrupted, DEFAULT_MAX_FRAME_SIZE);
                assert!(
                    !matches!(result, Ok(Some(_))),
                    "byte {byte} bit {bit}: {result:?}"
                );
            }
        }
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x0F, 0x00, 0x00][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_decode_incomplete_body() {
        let mut buf = BytesMut::new();
        encode_frame(1, b"hello", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);

        assert!(decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_decode_invalid_length() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(11);
        buf.put_u32_le(0);
        let result = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE);
        assert!(matches!(
            result,
            Err(FrameError::InvalidLength { length: 11 })
        ));
    }

    #[test]
    fn test_decode_frame_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(64 * 1024);
        buf.put_u32_le(0);
        let result = decode_frame(&mut buf, 1024);
        assert!(matches!(result, Err(FrameError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_multiple_frames() {
        let mut buf = BytesMut::new();
        encode_frame(0, b"first", &mut buf).unwrap();
        encode_frame(1, b"second", &mut buf).unwrap();

        let f1 = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .unwrap();
        let f2 = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .unwrap();

        assert_eq!((f1.sequence, f1.body.as_ref()), (0, b"first".as_ref()));
        assert_eq!((f2.sequence, f2.body.as_ref()), (1, b"second".as_ref()));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_body() {
        let mut buf = BytesMut::new();
        encode_frame(3, b"", &mut buf).unwrap();
        assert_eq!(buf.len(), FRAME_OVERHEAD);

        let frame = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .unwrap();
        assert_eq!(frame.sequence, 3);
        assert!(frame.body.is_empty());
    }

    #[test]
    fn test_frame_header_bytes() {
        let frame = Frame::new(5, Bytes::from_static(b"test"));
        assert_eq!(frame.total_length(), 16);
        assert_eq!(frame.header_bytes(), [16, 0, 0, 0, 5, 0, 0, 0]);
    }

    #[test]
    fn test_max_body_size() {
        let config = FrameConfig { max_frame_size: 100 };
        assert_eq!(config.max_body_size(), 88);
        assert_eq!(FrameConfig { max_frame_size: 4 }.max_body_size(), 0);
    }
}
