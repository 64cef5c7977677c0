//! winksock/1 protocol types.
//!
//! This module defines the binary frame format shared by every channel
//! multiplexed over one connection.
//!
//! # Protocol Overview
//!
//! | Opcode | Value | Direction | Purpose |
//! |--------|-------|-----------|---------|
//! | `KEEPALIVE` | 0 | both | Heartbeat, ignored on receipt |
//! | `OPEN` | 1 | both | Open request (flag = mode) / reply (flag = allow/deny) |
//! | `DATA` | 2 | both | Application data (flag = priority) |
//! | `SIGNAL` | 3 | both | Emit, end, error |
//! | `RESOLVE` | 4 | both | Path → route pointer resolution |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `codec` | Wire encoding and decoding |
//! | `frame` | Frame value type and enumerations |
//! | `mode` | Channel permission bitmask |

// ============================================================================
// Submodules
// ============================================================================

/// Wire encoding and decoding.
pub mod codec;

/// Frame value type and enumerations.
pub mod frame;

/// Channel permission bitmask.
pub mod mode;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{FrameHeader, decode, encode, read_frame, write_frame};
pub use frame::{
    ContentType, FLAG_MAX, Frame, HEADER_SIZE, OpCode, PAYLOAD_MAX_LIMIT, open_flag, signal_flag,
};
pub use mode::ChannelMode;
