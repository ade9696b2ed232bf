use std::fmt;

/// The frame field a short read stopped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameField {
    Length,
    Sequence,
    Body,
    Checksum,
}

impl fmt::Display for FrameField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameField::Length => "length",
            FrameField::Sequence => "sequence",
            FrameField::Body => "body",
            FrameField::Checksum => "checksum",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stream ended before the named field was complete.
    #[error("short {field} read")]
    ShortRead { field: FrameField },

    /// The length field is smaller than the fixed frame overhead.
    #[error("invalid length {length} (minimum 12)")]
    InvalidLength { length: u32 },

    /// The length field exceeds the configured maximum frame size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The payload cannot be framed within the size limit.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The trailing CRC-32 does not match the frame contents.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// An I/O error occurred while reading frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
