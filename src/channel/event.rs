//! Events raised on a channel and the payload type used to send.
//!
//! | Type | Raised by |
//! |------|-----------|
//! | [`ChannelEvent`] | DATA (message) and SIGNAL(EMIT) (signal) |
//! | [`CloseEvent`] | every termination, exactly once per connect |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::protocol::{ContentType, Frame, OpCode};

// ============================================================================
// Payload
// ============================================================================

/// Outbound application data with its content type.
///
/// Strings convert to UTF-8 payloads, byte slices and vectors to binary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    content_type: ContentType,
    data: Vec<u8>,
}

impl Payload {
    /// Creates a UTF-8 payload.
    #[inline]
    #[must_use]
    pub fn utf8(text: impl Into<String>) -> Self {
        Self {
            content_type: ContentType::Utf8,
            data: text.into().into_bytes(),
        }
    }

    /// Creates a binary payload.
    #[inline]
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: ContentType::Binary,
            data: data.into(),
        }
    }

    /// Returns the content type.
    #[inline]
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Returns the bytes.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns `true` if there are no bytes.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn into_parts(self) -> (ContentType, Vec<u8>) {
        (self.content_type, self.data)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::utf8(text)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::utf8(text)
    }
}

impl From<&[u8]> for Payload {
    fn from(data: &[u8]) -> Self {
        Self::binary(data)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Self::binary(data)
    }
}

impl<const N: usize> From<&[u8; N]> for Payload {
    fn from(data: &[u8; N]) -> Self {
        Self::binary(data.as_slice())
    }
}

// ============================================================================
// ChannelEvent
// ============================================================================

/// Inbound message or signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEvent {
    content_type: ContentType,
    priority: u8,
    data: Vec<u8>,
}

impl ChannelEvent {
    /// Creates an event from a routed DATA or SIGNAL frame.
    ///
    /// The frame flag is the priority for DATA frames; other opcodes carry
    /// priority 0.
    #[must_use]
    pub fn from_frame(frame: Frame) -> Self {
        let priority = if frame.opcode() == OpCode::Data {
            frame.flag()
        } else {
            0
        };

        Self {
            content_type: frame.content_type(),
            priority,
            data: frame.into_payload(),
        }
    }

    /// Returns the content type.
    #[inline]
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Returns the priority (DATA only, 0 otherwise).
    #[inline]
    #[must_use]
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the event, returning the bytes.
    #[inline]
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Returns `true` for UTF-8 content.
    #[inline]
    #[must_use]
    pub fn is_utf8(&self) -> bool {
        self.content_type == ContentType::Utf8
    }

    /// Returns `true` for binary content.
    #[inline]
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.content_type == ContentType::Binary
    }

    /// Decodes the data as text. `None` for binary content or invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        if !self.is_utf8() {
            return None;
        }
        std::str::from_utf8(&self.data).ok()
    }
}

// ============================================================================
// CloseEvent
// ============================================================================

/// Terminal event of a channel.
#[derive(Clone)]
pub struct CloseEvent {
    was_clean: bool,
    was_denied: bool,
    reason: Option<String>,
    data: Vec<u8>,
    content_type: ContentType,
    error: Option<Arc<Error>>,
}

impl CloseEvent {
    /// Close completed after a local `close()`.
    #[must_use]
    pub fn clean() -> Self {
        Self {
            was_clean: true,
            was_denied: false,
            reason: None,
            data: Vec::new(),
            content_type: ContentType::Utf8,
            error: None,
        }
    }

    /// Close initiated by a received END frame. Its text payload is the reason.
    #[must_use]
    pub fn from_end_frame(frame: Frame) -> Self {
        let reason = frame.text().map(str::to_string);
        let content_type = frame.content_type();

        Self {
            was_clean: true,
            was_denied: false,
            reason,
            data: frame.into_payload(),
            content_type,
            error: None,
        }
    }

    /// Close caused by `error`.
    #[must_use]
    pub fn from_error(error: Arc<Error>) -> Self {
        let reason = match error.as_ref() {
            Error::OpenDenied { message, .. } | Error::Remote { message, .. } => message.clone(),
            other => other.to_string(),
        };

        Self {
            was_clean: false,
            was_denied: error.is_denial(),
            reason: (!reason.is_empty()).then_some(reason),
            data: Vec::new(),
            content_type: ContentType::Utf8,
            error: Some(error),
        }
    }

    /// Returns `true` for an orderly close.
    #[inline]
    #[must_use]
    pub fn was_clean(&self) -> bool {
        self.was_clean
    }

    /// Returns `true` if the server refused RESOLVE or OPEN.
    #[inline]
    #[must_use]
    pub fn was_denied(&self) -> bool {
        self.was_denied
    }

    /// Returns the human-readable reason, if any.
    #[inline]
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Returns the raw bytes carried by a received END frame.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the content type of [`data`](Self::data).
    #[inline]
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Returns the error that ended the channel.
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_deref()
    }
}

impl fmt::Debug for CloseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseEvent")
            .field("was_clean", &self.was_clean)
            .field("was_denied", &self.was_denied)
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
