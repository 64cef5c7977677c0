//! Delivery path from a connection to the channels bound to it.
//!
//! A connection never owns its channels. Its routing tables hold
//! [`ChannelSink`]s: the sending half of each channel's inbox plus the
//! channel's id. Everything a connection has to tell a channel (a routed
//! frame, or the error that tore the connection down) is posted as a
//! [`Delivery`], which the channel consumes in FIFO order.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::trace;

use crate::error::Error;
use crate::identifiers::ChannelId;
use crate::protocol::Frame;

// ============================================================================
// Delivery
// ============================================================================

/// An item posted to a channel's inbox.
#[derive(Debug)]
pub enum Delivery {
    /// A routed inbound frame.
    Frame(Frame),
    /// The connection failed.
    Error(Arc<Error>),
}

// ============================================================================
// ChannelSink
// ============================================================================

/// Back-reference from a connection to one channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    id: ChannelId,
    tx: mpsc::UnboundedSender<Delivery>,
}

impl ChannelSink {
    /// Creates a sink for channel `id`.
    #[inline]
    #[must_use]
    pub fn new(id: ChannelId, tx: mpsc::UnboundedSender<Delivery>) -> Self {
        Self { id, tx }
    }

    /// Returns the channel id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Posts a frame. Returns `false` if the channel is gone.
    pub fn post_frame(&self, frame: Frame) -> bool {
        let delivered = self.tx.send(Delivery::Frame(frame)).is_ok();
        if !delivered {
            trace!(channel = %self.id, "Frame posted to dropped channel");
        }
        delivered
    }

    /// Posts a terminal error. Returns `false` if the channel is gone.
    pub fn post_error(&self, error: Arc<Error>) -> bool {
        self.tx.send(Delivery::Error(error)).is_ok()
    }
}

// ============================================================================
// Tests
// ============================================================================
