//! Callback registration for channel events.
//!
//! Callbacks are supplied either as closures on [`Handlers`] or by
//! implementing [`ChannelListener`]. They run on the channel's dispatch task
//! in the order events arrived, never while channel state is locked, so a
//! callback may freely call back into the channel (`send`, `close`, ...).

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use super::core::Channel;
use super::event::{ChannelEvent, CloseEvent};

// ============================================================================
// Types
// ============================================================================

/// Called once the channel is open.
pub type ConnectCallback = Arc<dyn Fn(&Channel) + Send + Sync>;

/// Called for every inbound DATA or SIGNAL(EMIT).
pub type EventCallback = Arc<dyn Fn(&Channel, ChannelEvent) + Send + Sync>;

/// Called once when the channel ends.
pub type CloseCallback = Arc<dyn Fn(&Channel, CloseEvent) + Send + Sync>;

// ============================================================================
// ChannelListener
// ============================================================================

/// Listener interface. Every method defaults to a no-op.
pub trait ChannelListener: Send + Sync + 'static {
    /// Channel opened.
    fn on_connect(&self, _channel: &Channel) {}

    /// DATA received.
    fn on_message(&self, _channel: &Channel, _event: ChannelEvent) {}

    /// SIGNAL(EMIT) received.
    fn on_signal(&self, _channel: &Channel, _event: ChannelEvent) {}

    /// Channel ended.
    fn on_close(&self, _channel: &Channel, _event: CloseEvent) {}
}

// ============================================================================
// Handlers
// ============================================================================

/// The callback set of one channel.
#[derive(Clone, Default)]
pub struct Handlers {
    on_connect: Option<ConnectCallback>,
    on_message: Option<EventCallback>,
    on_signal: Option<EventCallback>,
    on_close: Option<CloseCallback>,
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_signal", &self.on_signal.is_some())
            .field("on_close", &self.on_close.is_some())
            .finish()
    }
}

// ============================================================================
// Handlers - Builder Methods
// ============================================================================

impl Handlers {
    /// Creates an empty callback set.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes every event to `listener`.
    #[must_use]
    pub fn from_listener<L: ChannelListener>(listener: Arc<L>) -> Self {
        let connect = Arc::clone(&listener);
        let message = Arc::clone(&listener);
        let signal = Arc::clone(&listener);
        let close = listener;

        Self::new()
            .with_on_connect(move |channel| connect.on_connect(channel))
            .with_on_message(move |channel, event| message.on_message(channel, event))
            .with_on_signal(move |channel, event| signal.on_signal(channel, event))
            .with_on_close(move |channel, event| close.on_close(channel, event))
    }

    /// Sets the connect callback.
    #[inline]
    #[must_use]
    pub fn with_on_connect<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Channel) + Send + Sync + 'static,
    {
        self.on_connect = Some(Arc::new(callback));
        self
    }

    /// Sets the message callback.
    #[inline]
    #[must_use]
    pub fn with_on_message<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Channel, ChannelEvent) + Send + Sync + 'static,
    {
        self.on_message = Some(Arc::new(callback));
        self
    }

    /// Sets the signal callback.
    #[inline]
    #[must_use]
    pub fn with_on_signal<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Channel, ChannelEvent) + Send + Sync + 'static,
    {
        self.on_signal = Some(Arc::new(callback));
        self
    }

    /// Sets the close callback.
    #[inline]
    #[must_use]
    pub fn with_on_close<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Channel, CloseEvent) + Send + Sync + 'static,
    {
        self.on_close = Some(Arc::new(callback));
        self
    }
}

// ============================================================================
// Handlers - Dispatch
// ============================================================================

impl Handlers {
    pub(crate) fn connect(&self, channel: &Channel) {
        if let Some(callback) = &self.on_connect {
            callback(channel);
        }
    }

    pub(crate) fn message(&self, channel: &Channel, event: ChannelEvent) {
        if let Some(callback) = &self.on_message {
            callback(channel, event);
        }
    }

    pub(crate) fn signal(&self, channel: &Channel, event: ChannelEvent) {
        if let Some(callback) = &self.on_signal {
            callback(channel, event);
        }
    }

    pub(crate) fn close(&self, channel: &Channel, event: CloseEvent) {
        if let Some(callback) = &self.on_close {
            callback(channel, event);
        }
    }
}
