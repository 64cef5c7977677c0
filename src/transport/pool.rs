//! Connection pool keyed by endpoint.
//!
//! Channels to the same `protocol://host:port` share a connection as long as
//! their paths differ. A second channel to an already-bound path gets a new
//! connection to the same endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                ConnectionPool                 │
//! │  ┌─────────────────────────────────────────┐  │
//! │  │ http://a:80   → [Connection 1, Conn 2]  │  │
//! │  │ http://b:7010 → [Connection 3]          │  │
//! │  └─────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! The registry lock is always taken before any connection's table lock.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::client::ConnectionOptions;
use crate::error::{Error, Result};
use crate::identifiers::EndpointKey;

use super::connection::Connection;
use super::sink::ChannelSink;

// ============================================================================
// Types
// ============================================================================

/// Connections by endpoint key.
pub(crate) type Registry = FxHashMap<EndpointKey, Vec<Arc<Connection>>>;

// ============================================================================
// Endpoint
// ============================================================================

/// Remote endpoint of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Lowercased scheme.
    pub protocol: String,
    /// Host name or address; IPv6 literals keep their brackets.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Creates an endpoint.
    #[inline]
    #[must_use]
    pub fn new(protocol: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
        }
    }

    /// Returns the pool key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> EndpointKey {
        EndpointKey::new(&self.protocol, &self.host, self.port)
    }
}

// ============================================================================
// ConnectionPool
// ============================================================================

/// Registry of live connections.
///
/// Held in an `Arc`; connections keep a weak reference back to it.
pub struct ConnectionPool {
    /// Live connections by endpoint.
    registry: Mutex<Registry>,
    /// Runtime the io tasks are spawned on.
    handle: Handle,
    /// Options applied to every new connection.
    options: ConnectionOptions,
    /// Shutdown flag.
    shutdown: AtomicBool,
}

// ============================================================================
// ConnectionPool - Constructor
// ============================================================================

impl ConnectionPool {
    /// Creates a pool with default options.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when called outside a tokio runtime.
    pub fn new() -> Result<Arc<Self>> {
        Self::with_options(ConnectionOptions::default())
    }

    /// Creates a pool with `options`.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when called outside a tokio runtime
    /// - [`Error::Config`] if `options` are invalid
    pub fn with_options(options: ConnectionOptions) -> Result<Arc<Self>> {
        options.validate()?;

        let handle = Handle::try_current()
            .map_err(|_| Error::config("ConnectionPool must be created inside a tokio runtime"))?;

        debug!(?options, "ConnectionPool created");

        Ok(Arc::new(Self {
            registry: Mutex::new(FxHashMap::default()),
            handle,
            options,
            shutdown: AtomicBool::new(false),
        }))
    }
}

// ============================================================================
// ConnectionPool - Public API
// ============================================================================

impl ConnectionPool {
    /// Returns the options applied to new connections.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Returns the number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.registry.lock().values().map(Vec::len).sum()
    }

    /// Returns the number of live connections to `endpoint`.
    #[must_use]
    pub fn connections_to(&self, endpoint: &Endpoint) -> usize {
        self.registry
            .lock()
            .get(&endpoint.key())
            .map_or(0, Vec::len)
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has run.
    #[inline]
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Destroys every connection.
    ///
    /// Bound channels observe [`Error::ConnectionClosed`]. Later acquisitions
    /// fail.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        let connections: Vec<Arc<Connection>> = {
            let mut registry = self.registry.lock();
            registry.drain().flat_map(|(_, list)| list).collect()
        };

        info!(count = connections.len(), "ConnectionPool shutting down");

        for connection in connections {
            if connection.begin_destroy() {
                connection.finish_destroy(Some(Error::ConnectionClosed));
            }
        }
    }
}

// ============================================================================
// ConnectionPool - Internal
// ============================================================================

impl ConnectionPool {
    /// Returns a connection with `path` bound to `sink`.
    ///
    /// Reuses the first live connection to `endpoint` that does not already
    /// carry `path`; otherwise creates, registers and starts a new one.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] after shutdown.
    pub(crate) fn acquire(
        self: &Arc<Self>,
        endpoint: &Endpoint,
        path: &[u8],
        sink: ChannelSink,
    ) -> Result<Arc<Connection>> {
        let key = endpoint.key();
        let mut registry = self.registry.lock();

        // Checked under the lock: `shutdown` drains the registry after
        // setting the flag.
        if self.is_shutdown() {
            return Err(Error::ConnectionClosed);
        }

        let connections = registry.entry(key.clone()).or_default();

        for connection in connections.iter() {
            if connection.try_bind_path(path, sink.clone()) {
                debug!(key = %key, channel = %sink.id(), "Reusing connection");
                return Ok(Arc::clone(connection));
            }
        }

        let connection = Connection::new(
            key.clone(),
            endpoint.host.clone(),
            endpoint.port,
            self.options.clone(),
            Arc::downgrade(self),
        );

        let id = sink.id();
        if !connection.try_bind_path(path, sink) {
            return Err(Error::ConnectionClosed);
        }

        connections.push(Arc::clone(&connection));
        connection.start(&self.handle);

        debug!(key = %key, channel = %id, "New connection");

        Ok(connection)
    }

    /// Removes `connection` from the registry.
    pub(crate) fn release(&self, connection: &Connection) {
        let mut registry = self.registry.lock();
        Self::unregister(&mut registry, connection);
    }

    /// Returns the runtime handle tasks are spawned on.
    #[inline]
    pub(crate) fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Locks the registry.
    pub(crate) fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock()
    }

    /// Removes `connection` from a locked registry.
    pub(crate) fn unregister(registry: &mut Registry, connection: &Connection) {
        let key = connection.key();

        let Some(list) = registry.get_mut(key) else {
            return;
        };

        list.retain(|c| !std::ptr::eq(Arc::as_ptr(c), connection));
        if list.is_empty() {
            registry.remove(key);
        }

        debug!(key = %key, "Connection unregistered");
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("connections", &self.connection_count())
            .field("shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
