//! Connection tuning options.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use winksock::ConnectionOptions;
//!
//! let options = ConnectionOptions::new()
//!     .with_keepalive_interval(Duration::from_secs(5))
//!     .with_connect_timeout(Duration::from_secs(3));
//!
//! assert!(options.validate().is_ok());
//! ```
//!
//! Options can also be loaded from JSON. Durations are in milliseconds and
//! every field is optional:
//!
//! ```
//! use winksock::ConnectionOptions;
//!
//! let options = ConnectionOptions::from_json(r#"{ "keepalive_interval_ms": 2000 }"#)?;
//! assert_eq!(options.keepalive_interval.as_millis(), 2000);
//! # Ok::<(), winksock::Error>(())
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Idle time after which the sender emits a KEEPALIVE.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Upper bound on TCP connect plus handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Options applied to every connection a pool opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Idle interval before a heartbeat is sent.
    #[serde(rename = "keepalive_interval_ms", with = "millis")]
    pub keepalive_interval: Duration,

    /// Limit for TCP connect plus upgrade handshake.
    #[serde(rename = "connect_timeout_ms", with = "millis")]
    pub connect_timeout: Duration,

    /// Disable Nagle's algorithm on new sockets.
    pub nodelay: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectionOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            nodelay: true,
        }
    }

    /// Parses options from JSON.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] on malformed input
    /// - [`Error::Config`] if the parsed options are invalid
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionOptions {
    /// Sets the heartbeat idle interval.
    #[inline]
    #[must_use]
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enables or disables `TCP_NODELAY`.
    #[inline]
    #[must_use]
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if a duration is zero.
    pub fn validate(&self) -> Result<()> {
        if self.keepalive_interval.is_zero() {
            return Err(Error::config("Keepalive interval must be greater than zero"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config("Connect timeout must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Serde Helpers
// ============================================================================

/// `Duration` as whole milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConnectionOptions::default();
        assert_eq!(options.keepalive_interval, Duration::from_secs(10));
        assert_eq!(options.connect_timeout, Duration::from_secs(30));
        assert!(options.nodelay);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let options = ConnectionOptions::new()
            .with_keepalive_interval(Duration::from_millis(250))
            .with_connect_timeout(Duration::from_secs(1))
            .with_nodelay(false);

        assert_eq!(options.keepalive_interval, Duration::from_millis(250));
        assert_eq!(options.connect_timeout, Duration::from_secs(1));
        assert!(!options.nodelay);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let options = ConnectionOptions::new().with_keepalive_interval(Duration::ZERO);
        assert!(matches!(options.validate(), Err(Error::Config { .. })));

        let options = ConnectionOptions::new().with_connect_timeout(Duration::ZERO);
        assert!(matches!(options.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_from_json_partial() {
        let options =
            ConnectionOptions::from_json(r#"{ "connect_timeout_ms": 1500, "nodelay": false }"#)
                .expect("parse");

        assert_eq!(options.connect_timeout, Duration::from_millis(1500));
        assert_eq!(options.keepalive_interval, DEFAULT_KEEPALIVE_INTERVAL);
        assert!(!options.nodelay);
    }

    #[test]
    fn test_from_json_errors() {
        assert!(matches!(
            ConnectionOptions::from_json("not json"),
            Err(Error::Json(_))
        ));
        assert!(matches!(
            ConnectionOptions::from_json(r#"{ "keepalive_interval_ms": 0 }"#),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_serialize_millis() {
        let json = serde_json::to_value(ConnectionOptions::default()).expect("serialize");
        assert_eq!(json["keepalive_interval_ms"], 10_000);
        assert_eq!(json["connect_timeout_ms"], 30_000);
    }
}
