//! TCP transport layer.
//!
//! This module owns the physical side of the client: sockets, the upgrade
//! handshake, and the routing of frames to the channels multiplexed on each
//! socket.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │ Channel  /a     │──┐                           │                 │
//! │ Channel  /b     │──┼─► Connection ◄───────────►│  winksock/1     │
//! │ Channel  /c     │──┘   (one socket)    TCP     │  server         │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `ConnectionPool::acquire` - Reuse or create a connection, bind the path
//! 2. `handshake::perform` - HTTP upgrade to `winksock/1`
//! 3. `Connection` - Sender and receiver loops run until failure
//! 4. `Connection::dealloc` - Last channel gone, connection torn down
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Physical connection, I/O loops and routing |
//! | `handshake` | HTTP upgrade exchange |
//! | `pool` | Connections keyed by endpoint |
//! | `sink` | Delivery path from a connection to its channels |

// ============================================================================
// Submodules
// ============================================================================

/// Physical connection, I/O loops and routing.
pub mod connection;

/// HTTP upgrade exchange.
pub mod handshake;

/// Connections keyed by endpoint.
pub mod pool;

/// Delivery path from a connection to its channels.
pub mod sink;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, ConnectionState};
pub use pool::{ConnectionPool, Endpoint};
pub use sink::{ChannelSink, Delivery};
