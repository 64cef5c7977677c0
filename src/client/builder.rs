//! Builders for [`Client`] and [`Channel`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use winksock::Client;
//!
//! # async fn example() -> winksock::Result<()> {
//! let client = Client::builder()
//!     .keepalive_interval(Duration::from_secs(5))
//!     .connect_timeout(Duration::from_secs(10))
//!     .build()?;
//!
//! let channel = client
//!     .channel()
//!     .on_connect(|_| println!("open"))
//!     .build();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use crate::channel::{Channel, ChannelEvent, ChannelListener, CloseEvent, Handlers};
use crate::error::Result;

use super::core::Client;
use super::options::ConnectionOptions;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for a [`Client`].
///
/// Use [`Client::builder()`] to create one.
#[derive(Debug, Default, Clone)]
pub struct ClientBuilder {
    options: ConnectionOptions,
}

impl ClientBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the heartbeat idle interval.
    #[inline]
    #[must_use]
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.options = self.options.with_keepalive_interval(interval);
        self
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.with_connect_timeout(timeout);
        self
    }

    /// Enables or disables `TCP_NODELAY`.
    #[inline]
    #[must_use]
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.options = self.options.with_nodelay(nodelay);
        self
    }

    /// Builds the client with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`](crate::Error::Config) on invalid options
    /// - [`Error::Config`](crate::Error::Config) outside a tokio runtime
    pub fn build(self) -> Result<Client> {
        Client::new(self.options)
    }
}

// ============================================================================
// ChannelBuilder
// ============================================================================

/// Builder for a [`Channel`] with its callbacks.
///
/// Use [`Client::channel()`] to create one.
#[derive(Debug)]
pub struct ChannelBuilder<'a> {
    client: &'a Client,
    handlers: Handlers,
}

impl<'a> ChannelBuilder<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self {
            client,
            handlers: Handlers::new(),
        }
    }

    /// Sets the connect callback.
    #[inline]
    #[must_use]
    pub fn on_connect<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Channel) + Send + Sync + 'static,
    {
        self.handlers = self.handlers.with_on_connect(callback);
        self
    }

    /// Sets the message callback.
    #[inline]
    #[must_use]
    pub fn on_message<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Channel, ChannelEvent) + Send + Sync + 'static,
    {
        self.handlers = self.handlers.with_on_message(callback);
        self
    }

    /// Sets the signal callback.
    #[inline]
    #[must_use]
    pub fn on_signal<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Channel, ChannelEvent) + Send + Sync + 'static,
    {
        self.handlers = self.handlers.with_on_signal(callback);
        self
    }

    /// Sets the close callback.
    #[inline]
    #[must_use]
    pub fn on_close<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Channel, CloseEvent) + Send + Sync + 'static,
    {
        self.handlers = self.handlers.with_on_close(callback);
        self
    }

    /// Replaces all callbacks with `listener`.
    #[inline]
    #[must_use]
    pub fn listener<L: ChannelListener>(mut self, listener: Arc<L>) -> Self {
        self.handlers = Handlers::from_listener(listener);
        self
    }

    /// Creates the channel.
    #[must_use]
    pub fn build(self) -> Channel {
        self.client.channel_with(self.handlers)
    }
}

// ============================================================================
// Tests
// ============================================================================
