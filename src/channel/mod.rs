//! Channels: logical streams multiplexed over shared connections.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Channel`] | State machine and public operations |
//! | [`ChannelEvent`] | Inbound message or signal |
//! | [`CloseEvent`] | Terminal event, raised exactly once |
//! | [`Payload`] | Outbound data with content type |
//! | [`Handlers`] | Callback set |
//! | [`ChannelListener`] | Listener interface alternative to closures |

// ============================================================================
// Submodules
// ============================================================================

/// Channel state machine and public API.
pub mod core;

/// Event and payload types.
pub mod event;

/// Callback registration.
pub mod handler;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::{Channel, ChannelState};
pub use event::{ChannelEvent, CloseEvent, Payload};
pub use handler::{ChannelListener, CloseCallback, ConnectCallback, EventCallback, Handlers};
