//! Client entry point and configuration.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Owns the connection pool, creates channels |
//! | [`ClientBuilder`] | Fluent client configuration |
//! | [`ChannelBuilder`] | Fluent channel callback registration |
//! | [`ConnectionOptions`] | Heartbeat, timeout and socket options |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builders.
pub mod builder;

/// Client implementation.
pub mod core;

/// Connection options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::{ChannelBuilder, ClientBuilder};
pub use core::Client;
pub use options::ConnectionOptions;
