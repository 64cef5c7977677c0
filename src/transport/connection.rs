//! Physical connection and its I/O loops.
//!
//! A [`Connection`] owns one TCP socket to a winksock endpoint and multiplexes
//! every channel bound to it.
//!
//! # Lifecycle
//!
//! ```text
//! CONNECTING ─► HANDSHAKING ─► ACTIVE ─► DESTROYING ─► DESTROYED
//!      │              │                      ▲
//!      └──────────────┴──────── failure ─────┘
//! ```
//!
//! # Tasks
//!
//! The connection runs two tokio tasks:
//!
//! - **io task**: TCP connect, upgrade handshake, then the receiver loop
//!   (socket → frame → route)
//! - **sender task**: started once ACTIVE; drains the outbound queue in FIFO
//!   order and sends a KEEPALIVE after each idle interval
//!
//! # Routing Tables
//!
//! | Table | Key | Populated |
//! |-------|-----|-----------|
//! | paths | path bytes | at pool acquisition |
//! | routes | route pointer | on RESOLVE reply |
//!
//! Both live behind one lock. Lock order is pool registry → tables.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, lookup_host};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, trace, warn};

use crate::client::ConnectionOptions;
use crate::error::{Error, Result};
use crate::identifiers::{ChannelId, EndpointKey, RoutePointer};
use crate::protocol::{Frame, OpCode, codec};

use super::handshake;
use super::pool::ConnectionPool;
use super::sink::ChannelSink;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    /// Resolving host and opening the TCP socket.
    Connecting = 0,
    /// Upgrade request sent, waiting for `101`.
    Handshaking = 1,
    /// Frames flow in both directions.
    Active = 2,
    /// Teardown in progress.
    Destroying = 3,
    /// Terminal.
    Destroyed = 4,
}

impl ConnectionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Handshaking,
            2 => Self::Active,
            3 => Self::Destroying,
            _ => Self::Destroyed,
        }
    }
}

// ============================================================================
// Types
// ============================================================================

/// Item on the outbound queue.
#[derive(Debug)]
pub(crate) enum Outbound {
    /// Frame to write.
    Frame(Frame),
    /// Sender sentinel: stop after everything queued before it.
    Shutdown,
}

/// Routing tables shared by the receiver loop and channel-driven calls.
#[derive(Default)]
struct RoutingTables {
    /// Resolved channels by route pointer.
    routes: FxHashMap<RoutePointer, ChannelSink>,
    /// Bound channels by path bytes.
    paths: FxHashMap<Vec<u8>, ChannelSink>,
}

// ============================================================================
// Connection
// ============================================================================

/// One physical connection shared by many channels.
///
/// Created and registered by [`ConnectionPool`]; channels only hold an `Arc`
/// to it while bound.
pub struct Connection {
    /// Pool key.
    key: EndpointKey,
    /// Remote host.
    host: String,
    /// Remote port.
    port: u16,
    /// Timeouts and socket options.
    options: ConnectionOptions,
    /// Owning pool (weak: the pool owns the connection).
    pool: Weak<ConnectionPool>,
    /// [`ConnectionState`] as `u8`.
    state: AtomicU8,
    /// Outbound queue (sender half).
    outbound_tx: mpsc::UnboundedSender<Outbound>,
    /// Outbound queue (receiver half), taken by `start`.
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Outbound>>>,
    /// Routing tables.
    tables: Mutex<RoutingTables>,
    /// Abort handle of the io task.
    io_task: Mutex<Option<AbortHandle>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Connection - Constructor
// ============================================================================

impl Connection {
    /// Creates an unstarted connection.
    pub(crate) fn new(
        key: EndpointKey,
        host: impl Into<String>,
        port: u16,
        options: ConnectionOptions,
        pool: Weak<ConnectionPool>,
    ) -> Arc<Self> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Arc::new(Self {
            key,
            host: host.into(),
            port,
            options,
            pool,
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            tables: Mutex::new(RoutingTables::default()),
            io_task: Mutex::new(None),
        })
    }

    /// Spawns the io task on `handle`. Has no effect after the first call.
    pub(crate) fn start(self: &Arc<Self>, handle: &Handle) {
        let Some(outbound_rx) = self.outbound_rx.lock().take() else {
            return;
        };

        let connection = Arc::clone(self);
        let task = handle.spawn(async move {
            connection.run(outbound_rx).await;
        });

        *self.io_task.lock() = Some(task.abort_handle());

        // Destroyed before the handle was stored.
        if self.state() >= ConnectionState::Destroying
            && let Some(task) = self.io_task.lock().take()
        {
            task.abort();
        }

        debug!(key = %self.key, "Connection started");
    }
}

// ============================================================================
// Connection - Accessors
// ============================================================================

impl Connection {
    /// Returns the pool key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &EndpointKey {
        &self.key
    }

    /// Returns the remote host.
    #[inline]
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the remote port.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns `true` while the connection can accept new channels.
    #[inline]
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.state() < ConnectionState::Destroying
    }

    /// Returns the number of channels bound by path.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.tables.lock().paths.len()
    }

    /// Returns the number of resolved routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.tables.lock().routes.len()
    }

    /// Returns `true` if a channel is bound to `path`.
    #[must_use]
    pub fn has_path(&self, path: &[u8]) -> bool {
        self.tables.lock().paths.contains_key(path)
    }
}

// ============================================================================
// Connection - Channel Interface
// ============================================================================

impl Connection {
    /// Binds `sink` to `path` unless the path is taken or the connection is
    /// going away.
    pub(crate) fn try_bind_path(&self, path: &[u8], sink: ChannelSink) -> bool {
        let mut tables = self.tables.lock();

        // Checked under the tables lock: teardown marks the state before
        // draining the tables, so a late bind is either refused or drained.
        if !self.is_available() || tables.paths.contains_key(path) {
            return false;
        }

        tables.paths.insert(path.to_vec(), sink);
        true
    }

    /// Queues a frame for the sender task.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] once teardown has started.
    pub fn enqueue(&self, frame: Frame) -> Result<()> {
        if !self.is_available() {
            return Err(Error::ConnectionClosed);
        }

        trace!(key = %self.key, opcode = %frame.opcode(), ptr = %frame.pointer(), "Frame queued");

        self.outbound_tx
            .send(Outbound::Frame(frame))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Detaches channel `id` from both tables.
    ///
    /// Tears the connection down once no channel is bound.
    pub(crate) fn dealloc(&self, id: ChannelId, path: &[u8]) {
        let pool = self.pool.upgrade();
        let mut registry = pool.as_ref().map(|pool| pool.registry());

        let empty = {
            let mut tables = self.tables.lock();
            tables.routes.retain(|_, sink| sink.id() != id);
            if tables.paths.get(path).is_some_and(|sink| sink.id() == id) {
                tables.paths.remove(path);
            }
            tables.paths.is_empty()
        };

        trace!(key = %self.key, channel = %id, "Channel detached");

        if !empty || !self.begin_destroy() {
            return;
        }

        if let Some(registry) = registry.as_mut() {
            ConnectionPool::unregister(registry, self);
        }
        drop(registry);

        self.finish_destroy(None);
    }
}

// ============================================================================
// Connection - Teardown
// ============================================================================

impl Connection {
    /// Tears the connection down.
    ///
    /// Idempotent: only the first caller runs the teardown. Every channel
    /// still bound receives `error` (or [`Error::ConnectionClosed`]).
    pub fn destroy(&self, error: Option<Error>) {
        if !self.begin_destroy() {
            return;
        }

        if let Some(pool) = self.pool.upgrade() {
            pool.release(self);
        }

        self.finish_destroy(error);
    }

    /// Marks the connection destroying. Returns `false` if already marked.
    pub(crate) fn begin_destroy(&self) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                (state < ConnectionState::Destroying as u8)
                    .then_some(ConnectionState::Destroying as u8)
            })
            .is_ok()
    }

    /// Teardown body. Runs once, after a successful `begin_destroy`.
    pub(crate) fn finish_destroy(&self, error: Option<Error>) {
        let _ = self.outbound_tx.send(Outbound::Shutdown);

        if let Some(task) = self.io_task.lock().take() {
            task.abort();
        }

        let sinks: Vec<ChannelSink> = {
            let mut tables = self.tables.lock();
            tables.routes.clear();
            tables.paths.drain().map(|(_, sink)| sink).collect()
        };

        self.state
            .store(ConnectionState::Destroyed as u8, Ordering::Release);

        if sinks.is_empty() {
            match error {
                Some(error) => debug!(key = %self.key, error = %error, "Connection destroyed"),
                None => debug!(key = %self.key, "Connection released"),
            }
            return;
        }

        let error = Arc::new(error.unwrap_or(Error::ConnectionClosed));
        warn!(key = %self.key, error = %error, channels = sinks.len(), "Connection destroyed");

        for sink in &sinks {
            sink.post_error(Arc::clone(&error));
        }
    }

    /// Moves from `from` to `to` unless teardown has started.
    fn advance(&self, from: ConnectionState, to: ConnectionState) -> Result<()> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| Error::ConnectionClosed)
    }
}

// ============================================================================
// Connection - IO Task
// ============================================================================

impl Connection {
    /// Connect, handshake, then receive until failure.
    async fn run(self: Arc<Self>, outbound_rx: mpsc::UnboundedReceiver<Outbound>) {
        let (reader, writer) = match self.establish().await {
            Ok(halves) => halves,
            Err(e) => {
                self.destroy(Some(e));
                return;
            }
        };

        if self
            .advance(ConnectionState::Handshaking, ConnectionState::Active)
            .is_err()
        {
            return;
        }

        info!(key = %self.key, "Connection active");

        let sender = Arc::clone(&self);
        tokio::spawn(async move {
            sender.send_loop(writer, outbound_rx).await;
        });

        self.receive_loop(reader).await;
    }

    /// Opens the socket and performs the upgrade handshake.
    async fn establish(&self) -> Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf)> {
        let limit = self.options.connect_timeout;

        timeout(limit, async {
            let stream = self.open_socket().await?;
            self.advance(ConnectionState::Connecting, ConnectionState::Handshaking)?;

            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);
            handshake::perform(&mut reader, &mut write_half, &self.host).await?;

            Ok::<_, Error>((reader, write_half))
        })
        .await
        .map_err(|_| Error::connection_timeout(limit.as_millis() as u64))?
    }

    /// Host without IPv6 brackets, as the resolver expects it.
    fn socket_host(&self) -> &str {
        self.host
            .strip_prefix('[')
            .and_then(|host| host.strip_suffix(']'))
            .unwrap_or(&self.host)
    }

    /// Resolves the host and opens the TCP socket.
    async fn open_socket(&self) -> Result<TcpStream> {
        let addrs: Vec<_> = lookup_host((self.socket_host(), self.port))
            .await
            .map_err(|_| Error::unable_to_resolve(&self.host))?
            .collect();

        if addrs.is_empty() {
            return Err(Error::unable_to_resolve(&self.host));
        }

        let stream = TcpStream::connect(addrs.as_slice())
            .await
            .map_err(|_| Error::unable_to_connect(&self.host, self.port))?;

        if self.options.nodelay
            && let Err(e) = stream.set_nodelay(true)
        {
            warn!(key = %self.key, error = %e, "Could not set TCP_NODELAY");
        }

        debug!(key = %self.key, peer = ?stream.peer_addr().ok(), "TCP connection established");

        Ok(stream)
    }

    /// Reads frames until the socket fails or a frame is fatal.
    async fn receive_loop(&self, mut reader: BufReader<OwnedReadHalf>) {
        loop {
            let frame = match codec::read_frame(&mut reader).await {
                Ok(frame) => frame,
                Err(Error::Io(e)) => {
                    debug!(key = %self.key, error = %e, "Read failed");
                    self.destroy(Some(Error::connection("Could not read from the connection")));
                    break;
                }
                Err(e) => {
                    self.destroy(Some(e));
                    break;
                }
            };

            if let Err(e) = self.handle_frame(frame) {
                self.destroy(Some(e));
                break;
            }
        }

        trace!(key = %self.key, "Receiver loop terminated");
    }

    /// Writes queued frames, with a KEEPALIVE after each idle interval.
    async fn send_loop(
        self: Arc<Self>,
        mut writer: OwnedWriteHalf,
        mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    ) {
        let idle = self.options.keepalive_interval;
        let mut next = Some(Frame::keepalive());
        let mut last_send = Instant::now();

        loop {
            let frame = match next.take() {
                Some(frame) => frame,
                None => match timeout_at(last_send + idle, outbound_rx.recv()).await {
                    Ok(Some(Outbound::Frame(frame))) => frame,
                    Ok(Some(Outbound::Shutdown)) | Ok(None) => break,
                    Err(_) => {
                        trace!(key = %self.key, "Idle, sending keepalive");
                        Frame::keepalive()
                    }
                },
            };

            if let Err(e) = codec::write_frame(&mut writer, &frame).await {
                warn!(key = %self.key, error = %e, "Write failed");
                self.destroy(Some(Error::connection(format!(
                    "Could not write to the connection: {e}"
                ))));
                return;
            }

            last_send = Instant::now();
        }

        let _ = writer.shutdown().await;
        debug!(key = %self.key, "Sender loop drained");
    }
}

// ============================================================================
// Connection - Routing
// ============================================================================

impl Connection {
    /// Dispatches one inbound frame.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] for an empty DATA payload or a pointer with no
    /// route; the caller tears the connection down.
    pub(crate) fn handle_frame(&self, frame: Frame) -> Result<()> {
        trace!(key = %self.key, opcode = %frame.opcode(), ptr = %frame.pointer(), "Frame received");

        match frame.opcode() {
            OpCode::KeepAlive => Ok(()),
            OpCode::Resolve => {
                self.process_resolve(frame);
                Ok(())
            }
            OpCode::Open => {
                self.process_open(frame);
                Ok(())
            }
            OpCode::Data => {
                if !frame.has_payload() {
                    return Err(Error::protocol("DATA frame without payload"));
                }
                self.route(frame)
            }
            OpCode::Signal => self.route(frame),
            OpCode::Other(op) => {
                warn!(key = %self.key, op, "Dropping frame with unknown opcode");
                Ok(())
            }
        }
    }

    /// Binds the route pointer of a RESOLVE reply to the channel that asked.
    ///
    /// Pointer 0 is never bound; the channel rejects the reply itself.
    fn process_resolve(&self, frame: Frame) {
        let sink = {
            let mut tables = self.tables.lock();
            let Some(sink) = tables.paths.get(frame.payload()).cloned() else {
                debug!(key = %self.key, ptr = %frame.pointer(), "RESOLVE for unknown path");
                return;
            };
            if !frame.pointer().is_broadcast() {
                tables.routes.insert(frame.pointer(), sink.clone());
            }
            sink
        };

        sink.post_frame(frame);
    }

    /// Forwards an OPEN reply to its resolved channel.
    fn process_open(&self, frame: Frame) {
        let sink = self.tables.lock().routes.get(&frame.pointer()).cloned();

        match sink {
            Some(sink) => {
                sink.post_frame(frame);
            }
            None => debug!(key = %self.key, ptr = %frame.pointer(), "OPEN for unknown route"),
        }
    }

    /// Routes DATA/SIGNAL: pointer 0 fans out, anything else must be bound.
    fn route(&self, frame: Frame) -> Result<()> {
        let pointer = frame.pointer();

        if pointer.is_broadcast() {
            let sinks: Vec<ChannelSink> = self.tables.lock().routes.values().cloned().collect();
            for sink in &sinks {
                sink.post_frame(frame.clone());
            }
            return Ok(());
        }

        let sink = self
            .tables
            .lock()
            .routes
            .get(&pointer)
            .cloned()
            .ok_or_else(|| Error::protocol(format!("No route for pointer {pointer}")))?;

        sink.post_frame(frame);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
