//! Frame value type and protocol enumerations.
//!
//! A [`Frame`] is one unit of the winksock/1 wire protocol. Frames are plain
//! values: once built they are never mutated, and a frame destined for several
//! channels is cloned (each clone owns its own payload buffer).
//!
//! # Packed Byte
//!
//! ```text
//!   7   6   5   4   3   2   1   0
//! ┌───┬───┬───────────┬───────────┐
//! │ 0 │ C │  opcode   │   flag    │
//! └───┴───┴───────────┴───────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::error::{Error, Result};
use crate::identifiers::RoutePointer;

// ============================================================================
// Constants
// ============================================================================

/// Header size counted by the length prefix: pointer (4) + packed byte (1).
pub const HEADER_SIZE: usize = 5;

/// Size of the length prefix preceding every frame.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Largest payload a frame may carry.
pub const PAYLOAD_MAX_LIMIT: usize = 0xFFFF - HEADER_SIZE;

/// Largest legal flag value (3 bits).
pub const FLAG_MAX: u8 = 0x7;

/// Flags carried by OPEN and RESOLVE replies.
pub mod open_flag {
    /// Request granted.
    pub const ALLOW: u8 = 0x0;
    /// Server asks the client to go elsewhere. Treated as a denial.
    pub const REDIRECT: u8 = 0x1;
    /// Request refused.
    pub const DENY: u8 = 0x7;
}

/// Flags carried by SIGNAL frames.
pub mod signal_flag {
    /// Application signal.
    pub const EMIT: u8 = 0x0;
    /// End of channel.
    pub const END: u8 = 0x1;
    /// Error on channel.
    pub const ERROR: u8 = 0x7;
}

// ============================================================================
// ContentType
// ============================================================================

/// Payload content type (1 bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContentType {
    /// UTF-8 text.
    #[default]
    Utf8,
    /// Opaque bytes.
    Binary,
}

impl ContentType {
    /// Returns the wire bit.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::Utf8 => 0,
            Self::Binary => 1,
        }
    }

    /// Reads the content type from its wire bit (only bit 0 is used).
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        if bits & 0x1 == 0 {
            Self::Utf8
        } else {
            Self::Binary
        }
    }
}

// ============================================================================
// OpCode
// ============================================================================

/// Frame opcode (3 bits).
///
/// Values outside the known set survive decoding as [`OpCode::Other`] so that
/// callers, not the codec, decide how to reject them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Heartbeat, no routing.
    KeepAlive,
    /// Open request/reply.
    Open,
    /// Application data.
    Data,
    /// Out-of-band signal (emit, end, error).
    Signal,
    /// Path resolution request/reply.
    Resolve,
    /// Unknown opcode value.
    Other(u8),
}

impl OpCode {
    /// Returns the 3-bit wire value.
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::KeepAlive => 0,
            Self::Open => 1,
            Self::Data => 2,
            Self::Signal => 3,
            Self::Resolve => 4,
            Self::Other(value) => value & 0x7,
        }
    }

    /// Reads an opcode from its 3-bit wire value.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x7 {
            0 => Self::KeepAlive,
            1 => Self::Open,
            2 => Self::Data,
            3 => Self::Signal,
            4 => Self::Resolve,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeepAlive => f.write_str("KEEPALIVE"),
            Self::Open => f.write_str("OPEN"),
            Self::Data => f.write_str("DATA"),
            Self::Signal => f.write_str("SIGNAL"),
            Self::Resolve => f.write_str("RESOLVE"),
            Self::Other(value) => write!(f, "OPCODE({value})"),
        }
    }
}

// ============================================================================
// Frame
// ============================================================================

/// One protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pointer: RoutePointer,
    content_type: ContentType,
    opcode: OpCode,
    flag: u8,
    payload: Vec<u8>,
}

impl Frame {
    /// Creates a frame.
    ///
    /// # Errors
    ///
    /// - [`Error::PayloadTooLarge`] if `payload` exceeds [`PAYLOAD_MAX_LIMIT`]
    /// - [`Error::InvalidArgument`] if `flag` does not fit in 3 bits
    pub fn new(
        pointer: RoutePointer,
        content_type: ContentType,
        opcode: OpCode,
        flag: u8,
        payload: Vec<u8>,
    ) -> Result<Self> {
        if payload.len() > PAYLOAD_MAX_LIMIT {
            return Err(Error::PayloadTooLarge {
                size: payload.len(),
                max: PAYLOAD_MAX_LIMIT,
            });
        }

        if flag > FLAG_MAX {
            return Err(Error::invalid_argument(format!(
                "Frame flag must be between 0 - {FLAG_MAX}, got {flag}"
            )));
        }

        Ok(Self {
            pointer,
            content_type,
            opcode,
            flag,
            payload,
        })
    }

    /// Builds a frame from already-validated wire parts.
    pub(crate) fn from_wire(pointer: RoutePointer, packed: u8, payload: Vec<u8>) -> Self {
        Self {
            pointer,
            content_type: ContentType::from_bits(packed >> 6),
            opcode: OpCode::from_bits(packed >> 3),
            flag: packed & FLAG_MAX,
            payload,
        }
    }

    /// Heartbeat frame: pointer 0, all-zero fields.
    #[must_use]
    pub fn keepalive() -> Self {
        Self {
            pointer: RoutePointer::BROADCAST,
            content_type: ContentType::Utf8,
            opcode: OpCode::KeepAlive,
            flag: 0,
            payload: Vec::new(),
        }
    }

    /// RESOLVE request carrying the encoded path.
    ///
    /// # Errors
    ///
    /// [`Error::PayloadTooLarge`] if the path is too long.
    pub fn resolve(path: &[u8]) -> Result<Self> {
        Self::new(
            RoutePointer::BROADCAST,
            ContentType::Utf8,
            OpCode::Resolve,
            open_flag::ALLOW,
            path.to_vec(),
        )
    }

    /// OPEN request carrying the mode bits as flag and the token as payload.
    ///
    /// # Errors
    ///
    /// [`Error::PayloadTooLarge`] if the token is too long.
    pub fn open(pointer: RoutePointer, mode: u8, token: Option<&[u8]>) -> Result<Self> {
        Self::new(
            pointer,
            ContentType::Utf8,
            OpCode::Open,
            mode,
            token.map(<[u8]>::to_vec).unwrap_or_default(),
        )
    }

    /// DATA frame with the priority as flag.
    ///
    /// # Errors
    ///
    /// See [`Frame::new`].
    pub fn data(
        pointer: RoutePointer,
        content_type: ContentType,
        priority: u8,
        payload: Vec<u8>,
    ) -> Result<Self> {
        Self::new(pointer, content_type, OpCode::Data, priority, payload)
    }

    /// SIGNAL(EMIT) frame.
    ///
    /// # Errors
    ///
    /// See [`Frame::new`].
    pub fn emit(pointer: RoutePointer, content_type: ContentType, payload: Vec<u8>) -> Result<Self> {
        Self::new(pointer, content_type, OpCode::Signal, signal_flag::EMIT, payload)
    }

    /// SIGNAL(END) frame with an optional payload.
    ///
    /// # Errors
    ///
    /// See [`Frame::new`].
    pub fn end(pointer: RoutePointer, content_type: ContentType, payload: Vec<u8>) -> Result<Self> {
        Self::new(pointer, content_type, OpCode::Signal, signal_flag::END, payload)
    }
}

// ============================================================================
// Frame - Accessors
// ============================================================================

impl Frame {
    /// Returns the route pointer.
    #[inline]
    #[must_use]
    pub fn pointer(&self) -> RoutePointer {
        self.pointer
    }

    /// Returns the content type.
    #[inline]
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Returns the opcode.
    #[inline]
    #[must_use]
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// Returns the 3-bit flag.
    #[inline]
    #[must_use]
    pub fn flag(&self) -> u8 {
        self.flag
    }

    /// Returns the payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consumes the frame, returning its payload.
    #[inline]
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Returns `true` if the payload is non-empty.
    #[inline]
    #[must_use]
    pub fn has_payload(&self) -> bool {
        !self.payload.is_empty()
    }

    /// Returns the packed content-type/opcode/flag byte.
    #[inline]
    #[must_use]
    pub fn packed(&self) -> u8 {
        (self.content_type.bits() << 6) | (self.opcode.bits() << 3) | self.flag
    }

    /// Returns the payload as text for non-empty, valid UTF-8 content.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        if self.content_type != ContentType::Utf8 || self.payload.is_empty() {
            return None;
        }
        std::str::from_utf8(&self.payload).ok()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(HEADER_SIZE, 5);
        assert_eq!(PAYLOAD_MAX_LIMIT, 65530);
    }

    #[test]
    fn test_oversize_payload_rejected() {
        let result = Frame::data(
            RoutePointer::new(1),
            ContentType::Binary,
            0,
            vec![0u8; PAYLOAD_MAX_LIMIT + 1],
        );
        assert!(matches!(
            result,
            Err(Error::PayloadTooLarge { size, max }) if size == PAYLOAD_MAX_LIMIT + 1 && max == PAYLOAD_MAX_LIMIT
        ));
    }

    #[test]
    fn test_max_payload_accepted() {
        let frame = Frame::data(
            RoutePointer::new(1),
            ContentType::Binary,
            0,
            vec![0u8; PAYLOAD_MAX_LIMIT],
        )
        .expect("limit is inclusive");
        assert_eq!(frame.payload().len(), PAYLOAD_MAX_LIMIT);
    }

    #[test]
    fn test_flag_out_of_range_rejected() {
        let result = Frame::data(RoutePointer::new(1), ContentType::Utf8, 8, b"x".to_vec());
        assert!(matches!(result, Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn test_packed_byte() {
        let frame = Frame::end(RoutePointer::new(1), ContentType::Binary, Vec::new()).expect("frame");
        // binary (1<<6) | signal (3<<3) | end (1)
        assert_eq!(frame.packed(), 0b0101_1001);

        let open = Frame::open(RoutePointer::new(1), 7, None).expect("frame");
        assert_eq!(open.packed(), 0b0000_1111);
    }

    #[test]
    fn test_from_wire_preserves_unknown_opcode() {
        let frame = Frame::from_wire(RoutePointer::new(5), (6 << 3) | 2, Vec::new());
        assert_eq!(frame.opcode(), OpCode::Other(6));
        assert_eq!(frame.flag(), 2);
        assert_eq!(frame.content_type(), ContentType::Utf8);
        assert_eq!(frame.packed(), (6 << 3) | 2);
    }

    #[test]
    fn test_keepalive_is_all_zero() {
        let frame = Frame::keepalive();
        assert!(frame.pointer().is_broadcast());
        assert_eq!(frame.packed(), 0);
        assert!(!frame.has_payload());
    }

    #[test]
    fn test_text() {
        let utf8 = Frame::emit(RoutePointer::new(1), ContentType::Utf8, "héllo".into()).expect("frame");
        assert_eq!(utf8.text(), Some("héllo"));

        let binary = Frame::emit(RoutePointer::new(1), ContentType::Binary, b"hello".to_vec()).expect("frame");
        assert_eq!(binary.text(), None);

        let invalid = Frame::emit(RoutePointer::new(1), ContentType::Utf8, vec![0xc3]).expect("frame");
        assert_eq!(invalid.text(), None);
    }

    #[test]
    fn test_clone_owns_payload() {
        let frame = Frame::data(RoutePointer::BROADCAST, ContentType::Utf8, 0, b"shared".to_vec())
            .expect("frame");
        let copy = frame.clone();

        assert_eq!(frame, copy);
        assert_ne!(frame.payload().as_ptr(), copy.payload().as_ptr());
    }

    #[test]
    fn test_opcode_display() {
        assert_eq!(OpCode::Resolve.to_string(), "RESOLVE");
        assert_eq!(OpCode::Other(7).to_string(), "OPCODE(7)");
    }
}
