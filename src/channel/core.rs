//! Channel state machine and public API.
//!
//! ```text
//! UNCONNECTED ─connect─► RESOLVING ─RESOLVE ok─► OPENING ─OPEN ok─► CONNECTED
//!                            │                      │                  │ close
//!                            │                      │                  ▼
//!                            └──── failure ─────────┴──────────────► CLOSING
//!                                        │                             │ END
//!                                        ▼                             ▼
//!                                    DESTROYED ◄───────────────────────┘
//! ```
//!
//! Public operations are synchronous: they validate state and queue a frame.
//! Inbound frames and connection failures reach the channel through its
//! inbox, drained by one dispatch task per channel; that task advances the
//! state machine and invokes the callbacks, in arrival order.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, LazyLock, Weak};

use parking_lot::Mutex;
use regex::Regex;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use url::{Host, Url};

use crate::error::{Error, Result};
use crate::identifiers::{ChannelId, RoutePointer};
use crate::protocol::{
    ChannelMode, ContentType, FLAG_MAX, Frame, OpCode, PAYLOAD_MAX_LIMIT, open_flag, signal_flag,
};
use crate::transport::{ChannelSink, Connection, ConnectionPool, Delivery, Endpoint};

use super::event::{ChannelEvent, CloseEvent, Payload};
use super::handler::Handlers;

// ============================================================================
// Constants
// ============================================================================

/// Only scheme the protocol runs over.
const SUPPORTED_SCHEME: &str = "http";

/// Matches a leading `scheme://`.
static SCHEME_PREFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").ok());

// ============================================================================
// ChannelState
// ============================================================================

/// Lifecycle state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Created, `connect` not called yet.
    Unconnected,
    /// RESOLVE sent, waiting for the route pointer.
    Resolving,
    /// OPEN sent, waiting for the server's answer.
    Opening,
    /// Open; data and signals flow.
    Connected,
    /// Local END sent, waiting for the server's END.
    Closing,
    /// Terminal.
    Destroyed,
}

// ============================================================================
// Target
// ============================================================================

/// A parsed channel URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Target {
    pub endpoint: Endpoint,
    pub path: String,
    pub token: Option<Vec<u8>>,
}

impl Target {
    /// Parses `url`, defaulting a missing scheme to `http`.
    pub(crate) fn parse(url: &str) -> Result<Self> {
        let has_scheme = SCHEME_PREFIX
            .as_ref()
            .is_some_and(|regex| regex.is_match(url));

        let url: Cow<'_, str> = if has_scheme {
            Cow::Borrowed(url)
        } else {
            Cow::Owned(format!("{SUPPORTED_SCHEME}://{url}"))
        };

        let parsed = Url::parse(&url)?;

        if parsed.scheme() != SUPPORTED_SCHEME {
            return Err(Error::unsupported_scheme(parsed.scheme()));
        }

        let host = match parsed.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => format!("[{addr}]"),
            None => return Err(Error::invalid_url(format!("Missing host in '{url}'"))),
        };

        let port = parsed.port_or_known_default().unwrap_or(80);

        let path = match parsed.path() {
            path if path.starts_with('/') => path.to_string(),
            path => format!("/{path}"),
        };

        let token = parsed
            .query()
            .filter(|query| !query.is_empty())
            .map(|query| query.as_bytes().to_vec());

        Ok(Self {
            endpoint: Endpoint::new(SUPPORTED_SCHEME, host, port),
            path,
            token,
        })
    }
}

// ============================================================================
// Types
// ============================================================================

/// Why a channel is being torn down.
enum Termination {
    /// A SIGNAL(END) arrived.
    End(Frame),
    /// Denial, protocol, transport or remote error.
    Error(Arc<Error>),
}

/// Mutable channel state.
struct ChannelCore {
    state: ChannelState,
    path: Option<String>,
    mode: ChannelMode,
    token: Option<Vec<u8>>,
    pointer: RoutePointer,
    connection: Option<Arc<Connection>>,
}

/// Shared inner state of a channel.
pub(crate) struct ChannelInner {
    /// Unique identifier.
    id: ChannelId,
    /// Pool connections are acquired from.
    pool: Arc<ConnectionPool>,
    /// User callbacks.
    handlers: Handlers,
    /// Inbox sender, cloned into the sink handed to the connection.
    inbox: mpsc::UnboundedSender<Delivery>,
    /// State machine.
    core: Mutex<ChannelCore>,
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        let core = self.core.get_mut();
        if let Some(connection) = core.connection.take() {
            let path = core.path.take().unwrap_or_default();
            connection.dealloc(self.id, path.as_bytes());
            debug!(channel = %self.id, "Dropped channel detached");
        }
    }
}

// ============================================================================
// Channel
// ============================================================================

/// One logical stream multiplexed over a shared connection.
///
/// Cheap to clone; clones share the same state. Dropping the last clone
/// detaches the channel from its connection.
///
/// # Example
///
/// ```no_run
/// use winksock::{ChannelMode, Client};
///
/// # async fn example() -> winksock::Result<()> {
/// let client = Client::builder().build()?;
///
/// let channel = client
///     .channel()
///     .on_connect(|channel| {
///         let _ = channel.send("hello");
///     })
///     .on_message(|_, event| println!("{:?}", event.text()))
///     .on_close(|_, event| println!("closed: {:?}", event.reason()))
///     .build();
///
/// channel.connect("localhost:7010/chat", ChannelMode::READ_WRITE)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Channel {
    pub(crate) inner: Arc<ChannelInner>,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("Channel")
            .field("id", &self.inner.id)
            .field("state", &core.state)
            .field("path", &core.path)
            .field("mode", &core.mode)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Channel - Constructor
// ============================================================================

impl Channel {
    /// Creates an unconnected channel on `pool`.
    ///
    /// Spawns the dispatch task on the pool's runtime.
    #[must_use]
    pub fn new(pool: &Arc<ConnectionPool>, handlers: Handlers) -> Self {
        let (inbox, inbox_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(ChannelInner {
            id: ChannelId::generate(),
            pool: Arc::clone(pool),
            handlers,
            inbox,
            core: Mutex::new(ChannelCore {
                state: ChannelState::Unconnected,
                path: None,
                mode: ChannelMode::LISTEN,
                token: None,
                pointer: RoutePointer::BROADCAST,
                connection: None,
            }),
        });

        let weak = Arc::downgrade(&inner);
        pool.handle().spawn(dispatch(weak, inbox_rx));

        trace!(channel = %inner.id, "Channel created");

        Self { inner }
    }
}

/// Drains the inbox of one channel.
async fn dispatch(inner: Weak<ChannelInner>, mut inbox: mpsc::UnboundedReceiver<Delivery>) {
    while let Some(delivery) = inbox.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        Channel { inner }.handle_delivery(delivery);
    }
}

// ============================================================================
// Channel - Accessors
// ============================================================================

impl Channel {
    /// Returns the channel's unique identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ChannelId {
        self.inner.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.inner.core.lock().state
    }

    /// Returns the normalized path, once `connect` has been called.
    #[must_use]
    pub fn path(&self) -> Option<String> {
        self.inner.core.lock().path.clone()
    }

    /// Returns the requested mode.
    #[must_use]
    pub fn mode(&self) -> ChannelMode {
        self.inner.core.lock().mode
    }

    /// Returns the route pointer (`0` until resolved).
    #[must_use]
    pub fn route_pointer(&self) -> RoutePointer {
        self.inner.core.lock().pointer
    }

    /// Returns `true` while open and not closing.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// Returns `true` after `close` until the channel is destroyed.
    #[must_use]
    pub fn is_closing(&self) -> bool {
        self.state() == ChannelState::Closing
    }

    /// Returns `true` if connected with READ.
    #[must_use]
    pub fn is_readable(&self) -> bool {
        self.is_connected() && self.mode().can_read()
    }

    /// Returns `true` if connected with WRITE.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.is_connected() && self.mode().can_write()
    }

    /// Returns `true` if connected with EMIT.
    #[must_use]
    pub fn is_emitable(&self) -> bool {
        self.is_connected() && self.mode().can_emit()
    }
}

// ============================================================================
// Channel - Operations
// ============================================================================

impl Channel {
    /// Starts connecting to `url` with `mode`.
    ///
    /// `url` is `[http://]host[:port][/path][?token]`. Returns once the
    /// RESOLVE frame is queued; success is reported via `on_connect`, failure
    /// via `on_close`.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyConnected`] while resolving, opening or connected
    /// - [`Error::ChannelClosing`] while closing
    /// - [`Error::ChannelDestroyed`] after the channel ended
    /// - [`Error::UnsupportedScheme`] / [`Error::InvalidUrl`] / [`Error::Url`]
    /// - [`Error::PayloadTooLarge`] if the path or token exceed one frame
    /// - [`Error::ConnectionClosed`] after pool shutdown
    pub fn connect(&self, url: &str, mode: ChannelMode) -> Result<()> {
        let mut core = self.inner.core.lock();

        match core.state {
            ChannelState::Unconnected => {}
            ChannelState::Closing => return Err(Error::ChannelClosing),
            ChannelState::Destroyed => return Err(Error::ChannelDestroyed),
            _ => return Err(Error::AlreadyConnected),
        }

        let target = Target::parse(url)?;

        if let Some(token) = &target.token
            && token.len() > PAYLOAD_MAX_LIMIT
        {
            return Err(Error::PayloadTooLarge {
                size: token.len(),
                max: PAYLOAD_MAX_LIMIT,
            });
        }

        let resolve = Frame::resolve(target.path.as_bytes())?;

        let sink = ChannelSink::new(self.inner.id, self.inner.inbox.clone());
        let connection = self
            .inner
            .pool
            .acquire(&target.endpoint, target.path.as_bytes(), sink)?;

        debug!(
            channel = %self.inner.id,
            key = %connection.key(),
            path = %target.path,
            mode = %mode,
            "Channel resolving"
        );

        // On failure the connection is already tearing down and will post
        // the error to this channel.
        if let Err(e) = connection.enqueue(resolve) {
            debug!(channel = %self.inner.id, error = %e, "RESOLVE not queued");
        }

        core.state = ChannelState::Resolving;
        core.path = Some(target.path);
        core.mode = mode;
        core.token = target.token;
        core.connection = Some(connection);

        Ok(())
    }

    /// Sends `payload` with priority 0.
    ///
    /// # Errors
    ///
    /// See [`send_with_priority`](Self::send_with_priority).
    pub fn send(&self, payload: impl Into<Payload>) -> Result<()> {
        self.send_with_priority(payload, 0)
    }

    /// Sends `payload` as a DATA frame.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] / [`Error::ChannelClosing`]
    /// - [`Error::InvalidArgument`] for an empty payload or priority above 7
    /// - [`Error::PermissionDenied`] without WRITE
    /// - [`Error::PayloadTooLarge`]
    /// - [`Error::ConnectionClosed`] if the connection is going away
    pub fn send_with_priority(&self, payload: impl Into<Payload>, priority: u8) -> Result<()> {
        let payload = payload.into();
        let core = self.inner.core.lock();

        match core.state {
            ChannelState::Connected => {}
            ChannelState::Closing => return Err(Error::ChannelClosing),
            _ => return Err(Error::NotConnected),
        }

        if payload.is_empty() {
            return Err(Error::invalid_argument("Payload data cannot be zero-length"));
        }

        if priority > FLAG_MAX {
            return Err(Error::invalid_argument(format!(
                "Priority must be between 0 - 7, got {priority}"
            )));
        }

        if !core.mode.can_write() {
            return Err(Error::permission_denied("write"));
        }

        let (content_type, data) = payload.into_parts();
        let frame = Frame::data(core.pointer, content_type, priority, data)?;

        core.enqueue(frame)
    }

    /// Sends `payload` as a SIGNAL(EMIT) frame.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] / [`Error::ChannelClosing`]
    /// - [`Error::PermissionDenied`] without EMIT
    /// - [`Error::PayloadTooLarge`]
    /// - [`Error::ConnectionClosed`] if the connection is going away
    pub fn emit(&self, payload: impl Into<Payload>) -> Result<()> {
        let payload = payload.into();
        let core = self.inner.core.lock();

        match core.state {
            ChannelState::Connected => {}
            ChannelState::Closing => return Err(Error::ChannelClosing),
            _ => return Err(Error::NotConnected),
        }

        if !core.mode.can_emit() {
            return Err(Error::permission_denied("emit"));
        }

        let (content_type, data) = payload.into_parts();
        let frame = Frame::emit(core.pointer, content_type, data)?;

        core.enqueue(frame)
    }

    /// Starts an orderly close with no payload.
    ///
    /// # Errors
    ///
    /// See [`close_with`](Self::close_with).
    pub fn close(&self) -> Result<()> {
        self.close_with(Payload::default())
    }

    /// Starts an orderly close, sending `payload` with the END frame.
    ///
    /// `on_close` fires with a clean event once the server answers with END.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`]
    /// - [`Error::ChannelClosing`] if already closing
    /// - [`Error::PayloadTooLarge`]
    /// - [`Error::ConnectionClosed`] if the connection is going away
    pub fn close_with(&self, payload: impl Into<Payload>) -> Result<()> {
        let payload = payload.into();
        let mut core = self.inner.core.lock();

        match core.state {
            ChannelState::Connected => {}
            ChannelState::Closing => return Err(Error::ChannelClosing),
            _ => return Err(Error::NotConnected),
        }

        let (content_type, data) = payload.into_parts();
        let frame = Frame::end(core.pointer, content_type, data)?;

        core.enqueue(frame)?;
        core.state = ChannelState::Closing;

        debug!(channel = %self.inner.id, "Channel closing");

        Ok(())
    }
}

impl ChannelCore {
    fn enqueue(&self, frame: Frame) -> Result<()> {
        self.connection
            .as_ref()
            .ok_or(Error::NotConnected)?
            .enqueue(frame)
    }
}

// ============================================================================
// Channel - Inbound
// ============================================================================

impl Channel {
    /// Applies one inbox item. Runs on the dispatch task.
    pub(crate) fn handle_delivery(&self, delivery: Delivery) {
        match delivery {
            Delivery::Error(error) => self.destroy(Termination::Error(error)),
            Delivery::Frame(frame) => self.handle_frame(frame),
        }
    }

    /// Inbound DATA and SIGNAL(EMIT) still arrive while closing.
    fn accepts_events(&self) -> bool {
        matches!(
            self.state(),
            ChannelState::Connected | ChannelState::Closing
        )
    }

    fn handle_frame(&self, frame: Frame) {
        match frame.opcode() {
            OpCode::Resolve => self.on_resolve(&frame),
            OpCode::Open => self.on_open(&frame),
            OpCode::Data => {
                if self.accepts_events() {
                    self.inner
                        .handlers
                        .message(self, ChannelEvent::from_frame(frame));
                }
            }
            OpCode::Signal => match frame.flag() {
                signal_flag::EMIT => {
                    if self.accepts_events() {
                        self.inner
                            .handlers
                            .signal(self, ChannelEvent::from_frame(frame));
                    }
                }
                signal_flag::END => self.destroy(Termination::End(frame)),
                _ => self.destroy(Termination::Error(Arc::new(Error::remote(&frame)))),
            },
            OpCode::KeepAlive | OpCode::Other(_) => {}
        }
    }

    fn on_resolve(&self, frame: &Frame) {
        let mut core = self.inner.core.lock();

        if core.state != ChannelState::Resolving {
            trace!(channel = %self.inner.id, "Ignoring RESOLVE");
            return;
        }

        if frame.flag() != open_flag::ALLOW {
            let path = core.path.clone().unwrap_or_default();
            drop(core);
            self.destroy(Termination::Error(Arc::new(Error::resolve_failed(
                path,
                frame.flag(),
            ))));
            return;
        }

        if frame.pointer().is_broadcast() {
            drop(core);
            self.destroy(Termination::Error(Arc::new(Error::protocol(
                "RESOLVE allowed with broadcast pointer",
            ))));
            return;
        }

        core.pointer = frame.pointer();
        core.state = ChannelState::Opening;

        let open = Frame::open(frame.pointer(), core.mode.bits(), core.token.as_deref());
        let queued = open.and_then(|open| core.enqueue(open));

        trace!(channel = %self.inner.id, ptr = %frame.pointer(), "Channel opening");

        if let Err(e) = queued {
            drop(core);
            self.destroy(Termination::Error(Arc::new(e)));
        }
    }

    fn on_open(&self, frame: &Frame) {
        let mut core = self.inner.core.lock();

        if core.state != ChannelState::Opening {
            trace!(channel = %self.inner.id, "Ignoring OPEN");
            return;
        }

        if frame.flag() == open_flag::ALLOW {
            core.state = ChannelState::Connected;
            drop(core);

            debug!(channel = %self.inner.id, "Channel connected");
            self.inner.handlers.connect(self);
            return;
        }

        drop(core);
        self.destroy(Termination::Error(Arc::new(Error::open_denied(frame))));
    }

    /// Single exit path: detaches from the connection and raises exactly one
    /// close event.
    fn destroy(&self, termination: Termination) {
        let (connection, path, pointer, was_closing) = {
            let mut core = self.inner.core.lock();

            if matches!(
                core.state,
                ChannelState::Unconnected | ChannelState::Destroyed
            ) {
                return;
            }

            let was_closing = core.state == ChannelState::Closing;
            let pointer = core.pointer;

            core.state = ChannelState::Destroyed;
            core.pointer = RoutePointer::BROADCAST;

            (core.connection.take(), core.path.clone(), pointer, was_closing)
        };

        if let Some(connection) = connection {
            if matches!(termination, Termination::End(_))
                && !was_closing
                && !pointer.is_broadcast()
            {
                let echo = Frame::end(pointer, ContentType::Utf8, Vec::new())
                    .and_then(|frame| connection.enqueue(frame));
                if let Err(e) = echo {
                    trace!(channel = %self.inner.id, error = %e, "END echo not queued");
                }
            }

            connection.dealloc(self.inner.id, path.unwrap_or_default().as_bytes());
        }

        let event = match termination {
            Termination::End(_) if was_closing => CloseEvent::clean(),
            Termination::End(frame) => CloseEvent::from_end_frame(frame),
            Termination::Error(error) => {
                if !error.is_denial() {
                    warn!(channel = %self.inner.id, error = %error, "Channel failed");
                }
                CloseEvent::from_error(error)
            }
        };

        debug!(
            channel = %self.inner.id,
            clean = event.was_clean(),
            denied = event.was_denied(),
            "Channel destroyed"
        );

        self.inner.handlers.close(self, event);
    }
}

// ============================================================================
// Tests
// ============================================================================
