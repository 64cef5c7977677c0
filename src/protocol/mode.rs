//! Channel permission bitmask.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// ChannelMode
// ============================================================================

/// Permissions requested when opening a channel.
///
/// Bits combine freely: `ChannelMode::READ | ChannelMode::WRITE` equals
/// [`ChannelMode::READ_WRITE`]. Values above 7 are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ChannelMode(u8);

impl ChannelMode {
    /// No permissions (listen only).
    pub const LISTEN: Self = Self(0x00);
    /// Receive data.
    pub const READ: Self = Self(0x01);
    /// Send data.
    pub const WRITE: Self = Self(0x02);
    /// Read and write.
    pub const READ_WRITE: Self = Self(0x03);
    /// Emit signals.
    pub const EMIT: Self = Self(0x04);
    /// Read and emit.
    pub const READ_EMIT: Self = Self(0x05);
    /// Write and emit.
    pub const WRITE_EMIT: Self = Self(0x06);
    /// All permissions.
    pub const READ_WRITE_EMIT: Self = Self(0x07);

    /// Creates a mode from raw bits.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidMode`] if `bits` is outside `0..=7`.
    pub fn new(bits: u8) -> Result<Self> {
        if bits > Self::READ_WRITE_EMIT.0 {
            return Err(Error::InvalidMode { mode: bits });
        }
        Ok(Self(bits))
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if READ is granted.
    #[inline]
    #[must_use]
    pub const fn can_read(self) -> bool {
        self.contains(Self::READ)
    }

    /// Returns `true` if WRITE is granted.
    #[inline]
    #[must_use]
    pub const fn can_write(self) -> bool {
        self.contains(Self::WRITE)
    }

    /// Returns `true` if EMIT is granted.
    #[inline]
    #[must_use]
    pub const fn can_emit(self) -> bool {
        self.contains(Self::EMIT)
    }
}

impl BitOr for ChannelMode {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl TryFrom<u8> for ChannelMode {
    type Error = Error;

    fn try_from(bits: u8) -> Result<Self> {
        Self::new(bits)
    }
}

impl From<ChannelMode> for u8 {
    fn from(mode: ChannelMode) -> Self {
        mode.0
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("listen");
        }

        let names = [
            (Self::READ, "read"),
            (Self::WRITE, "write"),
            (Self::EMIT, "emit"),
        ];
        let mut first = true;
        for (bit, name) in names {
            if self.contains(bit) {
                if !first {
                    f.write_str("+")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
