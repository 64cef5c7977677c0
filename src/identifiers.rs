//! Type-safe identifiers.
//!
//! Newtype wrappers keep route pointers, channel identities and endpoint keys
//! from being mixed up at compile time.
//!
//! | Type | Wraps | Meaning |
//! |------|-------|---------|
//! | [`RoutePointer`] | `u32` | Server-assigned stream id, `0` = unresolved/broadcast |
//! | [`ChannelId`] | `Uuid` | Local identity of a [`Channel`](crate::Channel) |
//! | [`EndpointKey`] | `String` | Pool key `protocol://host:port` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use uuid::Uuid;

// ============================================================================
// RoutePointer
// ============================================================================

/// Route pointer of a multiplexed stream within one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RoutePointer(u32);

impl RoutePointer {
    /// The unrouted pointer: unresolved channel, or broadcast frame.
    pub const BROADCAST: Self = Self(0);

    /// Creates a route pointer from its wire value.
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the wire value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns `true` for pointer `0`.
    #[inline]
    #[must_use]
    pub const fn is_broadcast(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RoutePointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for RoutePointer {
    #[inline]
    fn from(value: u32) -> Self {
        Self(value)
    }
}

// ============================================================================
// ChannelId
// ============================================================================

/// Local identity of a channel.
///
/// Used by connections to tell back-references apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(Uuid);

impl ChannelId {
    /// Generates a new random channel id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// EndpointKey
// ============================================================================

/// Connection pool key: `protocol://host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey(String);

impl EndpointKey {
    /// Builds the key for an endpoint.
    #[must_use]
    pub fn new(protocol: &str, host: &str, port: u16) -> Self {
        Self(format!(
            "{}://{}:{}",
            protocol.to_ascii_lowercase(),
            host.to_ascii_lowercase(),
            port
        ))
    }

    /// Returns the key as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
