//! Binary frame codec.
//!
//! Wire format (big-endian):
//!
//! ```text
//! ┌──────────┬──────────────┬────────┬───────────────┐
//! │ length   │ route ptr    │ packed │ payload       │
//! │ u16 BE   │ u32 BE       │ u8     │ length-5 bytes│
//! └──────────┴──────────────┴────────┴───────────────┘
//! ```
//!
//! `length` counts the pointer, the packed byte and the payload, but not
//! itself.

// ============================================================================
// Imports
// ============================================================================

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::identifiers::RoutePointer;

use super::frame::{Frame, HEADER_SIZE, LENGTH_PREFIX_SIZE};

// ============================================================================
// Constants
// ============================================================================

/// Bytes read before the payload: length prefix + header.
pub const FIXED_SIZE: usize = LENGTH_PREFIX_SIZE + HEADER_SIZE;

// ============================================================================
// FrameHeader
// ============================================================================

/// Fixed part of a frame as read from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Declared length (header + payload).
    pub length: u16,
    /// Route pointer.
    pub pointer: RoutePointer,
    /// Packed content-type/opcode/flag byte.
    pub packed: u8,
}

impl FrameHeader {
    /// Parses the fixed header.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] if the declared length is smaller than the header.
    pub fn parse(buf: &[u8; FIXED_SIZE]) -> Result<Self> {
        let length = u16::from_be_bytes([buf[0], buf[1]]);

        if usize::from(length) < HEADER_SIZE {
            return Err(Error::protocol(format!(
                "Frame length {length} is smaller than header size {HEADER_SIZE}"
            )));
        }

        Ok(Self {
            length,
            pointer: RoutePointer::new(u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]])),
            packed: buf[6],
        })
    }

    /// Returns the payload length announced by this header.
    #[inline]
    #[must_use]
    pub fn payload_len(&self) -> usize {
        usize::from(self.length) - HEADER_SIZE
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Encodes a frame into its wire representation.
#[must_use]
pub fn encode(frame: &Frame) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FIXED_SIZE + frame.payload().len());
    encode_into(frame, &mut buf);
    buf
}

/// Appends the wire representation of `frame` to `buf`.
pub fn encode_into(frame: &Frame, buf: &mut Vec<u8>) {
    // Frame construction caps the payload, so the sum fits in u16.
    let length = (HEADER_SIZE + frame.payload().len()) as u16;

    buf.extend_from_slice(&length.to_be_bytes());
    buf.extend_from_slice(&frame.pointer().as_u32().to_be_bytes());
    buf.push(frame.packed());
    buf.extend_from_slice(frame.payload());
}

// ============================================================================
// Decoding
// ============================================================================

/// Decodes one frame from the front of `buf`.
///
/// Returns `Ok(None)` when `buf` does not yet hold a complete frame, otherwise
/// the frame and the number of bytes consumed.
///
/// # Errors
///
/// [`Error::Protocol`] if the declared length is smaller than the header.
pub fn decode(buf: &[u8]) -> Result<Option<(Frame, usize)>> {
    let Some(fixed) = buf.first_chunk::<FIXED_SIZE>() else {
        return Ok(None);
    };

    let header = FrameHeader::parse(fixed)?;
    let total = FIXED_SIZE + header.payload_len();

    if buf.len() < total {
        return Ok(None);
    }

    let payload = buf[FIXED_SIZE..total].to_vec();
    Ok(Some((
        Frame::from_wire(header.pointer, header.packed, payload),
        total,
    )))
}

/// Reads exactly one frame from `reader`.
///
/// # Errors
///
/// - [`Error::Io`] on short read or socket failure
/// - [`Error::Protocol`] if the declared length is smaller than the header
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut fixed = [0u8; FIXED_SIZE];
    reader.read_exact(&mut fixed).await?;

    let header = FrameHeader::parse(&fixed)?;

    let mut payload = vec![0u8; header.payload_len()];
    reader.read_exact(&mut payload).await?;

    Ok(Frame::from_wire(header.pointer, header.packed, payload))
}

/// Writes one frame to `writer` and flushes it.
///
/// # Errors
///
/// [`Error::Io`] on socket failure.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode(frame)).await?;
    writer.flush().await?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
