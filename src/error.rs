//! Error types for the winksock client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use winksock::{Channel, ChannelMode, Result};
//!
//! fn example(channel: &Channel) -> Result<()> {
//!     channel.connect("http://example.com/chat", ChannelMode::READ_WRITE)?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidUrl`], [`Error::UnsupportedScheme`] |
//! | Validation | [`Error::AlreadyConnected`], [`Error::NotConnected`], [`Error::ChannelClosing`], [`Error::ChannelDestroyed`], [`Error::InvalidMode`], [`Error::InvalidArgument`], [`Error::PayloadTooLarge`], [`Error::PermissionDenied`] |
//! | Denial | [`Error::ResolveFailed`], [`Error::OpenDenied`], [`Error::Remote`] |
//! | Protocol | [`Error::Protocol`], [`Error::BadHttpResponse`], [`Error::UnexpectedResponseCode`], [`Error::BadProtocolVersion`] |
//! | Transport | [`Error::UnableToResolve`], [`Error::UnableToConnect`], [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | External | [`Error::Io`], [`Error::Url`], [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

use crate::protocol::{Frame, open_flag};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client or connection options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Channel URL could not be interpreted.
    #[error("Invalid URL: {message}")]
    InvalidUrl {
        /// Description of the problem.
        message: String,
    },

    /// URL scheme other than `http`.
    #[error("{message}")]
    UnsupportedScheme {
        /// The rejected scheme.
        scheme: String,
        /// Human readable explanation.
        message: String,
    },

    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// Channel is already connecting or connected.
    #[error("Already connecting/connected")]
    AlreadyConnected,

    /// Operation requires a connected channel.
    #[error("Channel is not connected")]
    NotConnected,

    /// Channel is closing.
    #[error("Channel is closing")]
    ChannelClosing,

    /// Channel reached its terminal state and cannot be reused.
    #[error("Channel is destroyed")]
    ChannelDestroyed,

    /// Mode bits outside `0..=7`.
    #[error("Invalid channel mode: {mode}")]
    InvalidMode {
        /// The rejected mode value.
        mode: u8,
    },

    /// Invalid argument (empty payload, priority out of range, ...).
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// Payload exceeds the frame limit.
    #[error("Payload max limit reached: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Size of the rejected payload.
        size: usize,
        /// Maximum allowed payload size.
        max: usize,
    },

    /// Channel mode does not grant the operation.
    #[error("You do not have permission to {operation}")]
    PermissionDenied {
        /// The refused operation (`write`, `emit`).
        operation: &'static str,
    },

    // ========================================================================
    // Denial Errors
    // ========================================================================
    /// Server refused to resolve the channel path.
    #[error("Unable to resolve path: {path}")]
    ResolveFailed {
        /// The path that was requested.
        path: String,
        /// Flag carried by the RESOLVE reply.
        code: u8,
    },

    /// Server refused to open the channel.
    #[error("{message}")]
    OpenDenied {
        /// Flag carried by the OPEN reply.
        code: u8,
        /// Server supplied reason, or a default.
        message: String,
    },

    /// Server signalled an error on the channel.
    #[error("{message}")]
    Remote {
        /// Signal flag.
        code: u8,
        /// Server supplied reason, or a default.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation by the remote end.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Handshake response could not be parsed.
    #[error("Bad HTTP response from server")]
    BadHttpResponse,

    /// Handshake response status was not `101`.
    #[error("Unexpected response code, {code}")]
    UnexpectedResponseCode {
        /// The status code received.
        code: u16,
    },

    /// Upgrade header named another protocol.
    #[error("Bad protocol version: {version}")]
    BadProtocolVersion {
        /// Value of the `Upgrade` header.
        version: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Host name lookup failed.
    #[error("The host \"{host}\" could not be resolved")]
    UnableToResolve {
        /// The host that failed to resolve.
        host: String,
    },

    /// TCP connect failed.
    #[error("Could not connect to the host \"{host}\" on the port {port}")]
    UnableToConnect {
        /// Target host.
        host: String,
        /// Target port.
        port: u16,
    },

    /// Socket read or write failure on an established connection.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connect and handshake did not complete in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Connection was shut down locally.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    #[inline]
    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            message: message.into(),
        }
    }

    /// Creates an unsupported scheme error.
    pub fn unsupported_scheme(scheme: impl Into<String>) -> Self {
        let scheme = scheme.into();
        let message = if scheme.eq_ignore_ascii_case("https") {
            "The protocol HTTPS is not supported".to_string()
        } else {
            format!("Bad protocol: '{scheme}'")
        };
        Self::UnsupportedScheme { scheme, message }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a permission error.
    #[inline]
    pub fn permission_denied(operation: &'static str) -> Self {
        Self::PermissionDenied { operation }
    }

    /// Creates a resolve failure for `path`.
    #[inline]
    pub fn resolve_failed(path: impl Into<String>, code: u8) -> Self {
        Self::ResolveFailed {
            path: path.into(),
            code,
        }
    }

    /// Creates an open-denied error from an OPEN reply.
    ///
    /// Uses the payload as reason when it is non-empty UTF-8 content.
    pub fn open_denied(frame: &Frame) -> Self {
        let code = frame.flag();
        let default = if code < open_flag::DENY {
            "Not allowed to open channel"
        } else {
            ""
        };

        Self::OpenDenied {
            code,
            message: frame.text().unwrap_or(default).to_string(),
        }
    }

    /// Creates a remote error from a SIGNAL frame with an unknown flag.
    pub fn remote(frame: &Frame) -> Self {
        Self::Remote {
            code: frame.flag(),
            message: frame.text().unwrap_or("Unknown error").to_string(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a bad protocol version error.
    #[inline]
    pub fn bad_protocol_version(version: impl Into<String>) -> Self {
        Self::BadProtocolVersion {
            version: version.into(),
        }
    }

    /// Creates a host resolution error.
    #[inline]
    pub fn unable_to_resolve(host: impl Into<String>) -> Self {
        Self::UnableToResolve { host: host.into() }
    }

    /// Creates a connect failure error.
    #[inline]
    pub fn unable_to_connect(host: impl Into<String>, port: u16) -> Self {
        Self::UnableToConnect {
            host: host.into(),
            port,
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` for synchronous, local validation failures.
    ///
    /// These never change channel state.
    #[inline]
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl { .. }
                | Self::UnsupportedScheme { .. }
                | Self::AlreadyConnected
                | Self::NotConnected
                | Self::ChannelClosing
                | Self::ChannelDestroyed
                | Self::InvalidMode { .. }
                | Self::InvalidArgument { .. }
                | Self::PayloadTooLarge { .. }
                | Self::PermissionDenied { .. }
                | Self::Url(_)
        )
    }

    /// Returns `true` if the server refused the OPEN request.
    #[inline]
    #[must_use]
    pub fn is_open_denied(&self) -> bool {
        matches!(self, Self::OpenDenied { .. })
    }

    /// Returns `true` if the server refused either RESOLVE or OPEN.
    #[inline]
    #[must_use]
    pub fn is_denial(&self) -> bool {
        matches!(self, Self::ResolveFailed { .. } | Self::OpenDenied { .. })
    }

    /// Returns `true` if this is a protocol error.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::Protocol { .. }
                | Self::BadHttpResponse
                | Self::UnexpectedResponseCode { .. }
                | Self::BadProtocolVersion { .. }
        )
    }

    /// Returns `true` if this is a transport error.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::UnableToResolve { .. }
                | Self::UnableToConnect { .. }
                | Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::Io(_)
        )
    }

    /// Returns the numeric code carried by the error, if any.
    #[must_use]
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::ResolveFailed { code, .. }
            | Self::OpenDenied { code, .. }
            | Self::Remote { code, .. } => Some(u16::from(*code)),
            Self::UnexpectedResponseCode { code } => Some(*code),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    use crate::identifiers::RoutePointer;
    use crate::protocol::{ContentType, OpCode};

    #[test]
    fn test_error_display() {
        let err = Error::connection("Could not read from the connection");
        assert_eq!(
            err.to_string(),
            "Connection failed: Could not read from the connection"
        );
    }

    #[test]
    fn test_unsupported_scheme_messages() {
        let https = Error::unsupported_scheme("https");
        assert_eq!(https.to_string(), "The protocol HTTPS is not supported");

        let ftp = Error::unsupported_scheme("ftp");
        assert_eq!(ftp.to_string(), "Bad protocol: 'ftp'");
        assert!(ftp.is_validation_error());
    }

    #[test]
    fn test_open_denied_default_reason() {
        let frame = Frame::new(RoutePointer::new(3), ContentType::Utf8, OpCode::Open, 1, Vec::new())
            .expect("frame");
        let err = Error::open_denied(&frame);

        assert!(err.is_open_denied());
        assert_eq!(err.code(), Some(1));
        assert_eq!(err.to_string(), "Not allowed to open channel");
    }

    #[test]
    fn test_open_denied_server_reason() {
        let frame = Frame::new(
            RoutePointer::new(3),
            ContentType::Utf8,
            OpCode::Open,
            open_flag::DENY,
            b"go away".to_vec(),
        )
        .expect("frame");
        let err = Error::open_denied(&frame);

        assert_eq!(err.code(), Some(7));
        assert_eq!(err.to_string(), "go away");
    }

    #[test]
    fn test_remote_error_binary_payload_uses_default() {
        let frame = Frame::new(
            RoutePointer::new(9),
            ContentType::Binary,
            OpCode::Signal,
            7,
            vec![0xff, 0x00],
        )
        .expect("frame");
        let err = Error::remote(&frame);
        assert_eq!(err.to_string(), "Unknown error");
    }

    #[test]
    fn test_is_denial() {
        assert!(Error::resolve_failed("/a", 7).is_denial());
        assert!(!Error::resolve_failed("/a", 7).is_open_denied());
        assert!(!Error::ConnectionClosed.is_denial());
    }

    #[test]
    fn test_is_transport_error() {
        assert!(Error::unable_to_resolve("nowhere").is_transport_error());
        assert!(Error::unable_to_connect("localhost", 7010).is_transport_error());
        assert!(Error::ConnectionClosed.is_transport_error());
        assert!(!Error::protocol("x").is_transport_error());
    }

    #[test]
    fn test_is_protocol_error() {
        assert!(Error::protocol("Protocol error").is_protocol_error());
        assert!(Error::UnexpectedResponseCode { code: 404 }.is_protocol_error());
        assert!(Error::bad_protocol_version("winksock/2").is_protocol_error());
        assert!(!Error::NotConnected.is_protocol_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::UnexpectedEof, "eof");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_transport_error());
    }

    #[test]
    fn test_from_url_error() {
        let url_err = url::Url::parse("http://").unwrap_err();
        let err: Error = url_err.into();
        assert!(err.is_validation_error());
    }
}
