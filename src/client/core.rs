//! Client: owner of the connection pool and factory for channels.
//!
//! # Example
//!
//! ```no_run
//! use winksock::{ChannelMode, Client};
//!
//! # async fn example() -> winksock::Result<()> {
//! let client = Client::builder().build()?;
//!
//! let channel = client.channel().on_message(|_, event| {
//!     println!("{:?}", event.text());
//! }).build();
//!
//! channel.connect("localhost:7010/news", ChannelMode::READ)?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::channel::{Channel, Handlers};
use crate::error::Result;
use crate::transport::ConnectionPool;

use super::builder::{ChannelBuilder, ClientBuilder};
use super::options::ConnectionOptions;

// ============================================================================
// Client
// ============================================================================

/// Entry point of the library.
///
/// Cheap to clone; clones share one [`ConnectionPool`].
#[derive(Clone)]
pub struct Client {
    /// Shared pool.
    pub(crate) pool: Arc<ConnectionPool>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("connections", &self.connection_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Public API
// ============================================================================

impl Client {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client with `options`.
    ///
    /// # Errors
    ///
    /// [`Error::Config`](crate::Error::Config) outside a tokio runtime or on
    /// invalid options.
    pub fn new(options: ConnectionOptions) -> Result<Self> {
        let pool = ConnectionPool::with_options(options)?;
        info!("Client created");
        Ok(Self { pool })
    }

    /// Starts building a channel.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> ChannelBuilder<'_> {
        ChannelBuilder::new(self)
    }

    /// Creates a channel with `handlers`.
    #[must_use]
    pub fn channel_with(&self, handlers: Handlers) -> Channel {
        Channel::new(&self.pool, handlers)
    }

    /// Returns the underlying pool.
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Returns the number of live connections.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.pool.connection_count()
    }

    /// Tears down every connection. Bound channels receive an unclean close.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

// ============================================================================
// Tests
// ============================================================================
