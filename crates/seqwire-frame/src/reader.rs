use std::io::ErrorKind;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::codec::{
    split_header, validate_length, verify_checksum, Frame, FrameConfig, CHECKSUM_SIZE,
    HEADER_SIZE,
};
use crate::error::{FrameError, FrameField, Result};

/// Reads complete frames from any `AsyncRead` stream.
///
/// Reads exactly one frame's bytes per call and never past its end, so the
/// stream stays aligned on frame boundaries between calls. Partial reads
/// are accumulated internally.
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: AsyncRead + Unpin> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Read the next complete, checksum-verified frame.
    ///
    /// Returns `FrameError::ShortRead` naming the field the stream ended in.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        let mut header = [0u8; HEADER_SIZE];
        read_field(&mut self.inner, &mut header[..4], FrameField::Length).await?;
        read_field(&mut self.inner, &mut header[4..], FrameField::Sequence).await?;

        let (length, sequence) = split_header(&header);
        let total = validate_length(length, self.config.max_frame_size)?;

        let mut body = BytesMut::zeroed(total - HEADER_SIZE - CHECKSUM_SIZE);
        read_field(&mut self.inner, &mut body, FrameField::Body).await?;

        let mut trailer = [0u8; CHECKSUM_SIZE];
        read_field(&mut self.inner, &mut trailer, FrameField::Checksum).await?;
        verify_checksum(&header, &body, u32::from_le_bytes(trailer))?;

        trace!(sequence, length, "decoded frame");
        Ok(Frame {
            sequence,
            body: body.freeze(),
        })
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

async fn read_field<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
    field: FrameField,
) -> Result<()> {
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => Err(FrameError::ShortRead { field }),
        Err(err) => Err(FrameError::Io(err)),
    }
}
