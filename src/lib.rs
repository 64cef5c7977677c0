//! winksock - multiplexed channel client for the `winksock/1` protocol.
//!
//! Many logical channels share one TCP connection per endpoint. Each channel
//! is addressed by a path, resolved by the server to a route pointer, then
//! opened with a permission mode.
//!
//! # Architecture
//!
//! - **Channel**: user-facing state machine (connect, send, emit, close)
//! - **Connection**: one socket; handshake, sender loop, receiver loop,
//!   routing tables
//! - **ConnectionPool**: connections keyed by `protocol://host:port`
//! - **Frame codec**: `u16 length | u32 pointer | u8 packed | payload`
//!
//! Key design principles:
//!
//! - Public channel operations never block on I/O; they queue frames
//! - Every channel receives exactly one close event, whatever ends it
//! - Frames reach each channel in wire order
//!
//! # Quick Start
//!
//! ```no_run
//! use winksock::{ChannelMode, Client, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::builder().build()?;
//!
//!     let channel = client
//!         .channel()
//!         .on_connect(|channel| {
//!             let _ = channel.send("hello");
//!         })
//!         .on_message(|_, event| println!("message: {:?}", event.text()))
//!         .on_close(|_, event| println!("closed (clean: {})", event.was_clean()))
//!         .build();
//!
//!     channel.connect("localhost:7010/chat", ChannelMode::READ_WRITE)?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`channel`] | [`Channel`], events and callbacks |
//! | [`client`] | [`Client`] factory and configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Frame format and codec |
//! | [`transport`] | Connections and pool (internal) |

// ============================================================================
// Modules
// ============================================================================

/// Channels: state machine, events and callbacks.
pub mod channel;

/// Client factory and configuration.
///
/// Use [`Client::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// winksock/1 frame format and codec.
pub mod protocol;

/// TCP transport layer.
///
/// Connections, the upgrade handshake and the connection pool.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Channel types
pub use channel::{
    Channel, ChannelEvent, ChannelListener, ChannelState, CloseEvent, Handlers, Payload,
};

// Client types
pub use client::{ChannelBuilder, Client, ClientBuilder, ConnectionOptions};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ChannelId, EndpointKey, RoutePointer};

// Protocol types
pub use protocol::{ChannelMode, ContentType, Frame, OpCode};

// Transport types
pub use transport::{ConnectionPool, Endpoint};
