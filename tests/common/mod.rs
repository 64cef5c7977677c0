//! Shared fixtures: an in-process winksock/1 server and an event recorder.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::time::timeout;
use winksock::protocol::{self, ContentType, Frame, OpCode};
use winksock::{Channel, ChannelEvent, Client, CloseEvent, RoutePointer};

/// Upper bound for any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(5);

pub const UPGRADE_RESPONSE: &str =
    "HTTP/1.1 101 Switching Protocols\r\nConnection: upgrade\r\nUpgrade: winksock/1\r\n\r\n";

/// Installs a test subscriber once, honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// MockServer
// ============================================================================

pub struct MockServer {
    listener: TcpListener,
    port: u16,
}

impl MockServer {
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        Ok(Self { listener, port })
    }

    /// Channel URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("127.0.0.1:{}{path}", self.port)
    }

    /// Accepts a connection without answering the upgrade request.
    pub async fn accept_raw(&self) -> anyhow::Result<ServerConn> {
        let (stream, _) = timeout(WAIT, self.listener.accept()).await??;
        let (read_half, writer) = stream.into_split();
        Ok(ServerConn {
            reader: BufReader::new(read_half),
            writer,
        })
    }

    /// Accepts a connection and completes the upgrade.
    pub async fn accept(&self) -> anyhow::Result<ServerConn> {
        let mut conn = self.accept_raw().await?;
        let request = conn.read_request().await?;
        anyhow::ensure!(request.contains("Upgrade: winksock/1"), "bad request: {request}");
        conn.write_raw(UPGRADE_RESPONSE.as_bytes()).await?;
        Ok(conn)
    }
}

// ============================================================================
// ServerConn
// ============================================================================

pub struct ServerConn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl ServerConn {
    /// Reads the upgrade request up to the blank line.
    pub async fn read_request(&mut self) -> anyhow::Result<String> {
        let mut request = String::new();
        loop {
            let mut line = String::new();
            let n = timeout(WAIT, self.reader.read_line(&mut line)).await??;
            anyhow::ensure!(n > 0, "EOF during upgrade request");
            request.push_str(&line);
            if line == "\r\n" {
                return Ok(request);
            }
        }
    }

    pub async fn write_raw(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next frame, including keepalives.
    pub async fn recv_any(&mut self) -> anyhow::Result<Frame> {
        Ok(timeout(WAIT, protocol::read_frame(&mut self.reader)).await??)
    }

    /// Next non-keepalive frame.
    pub async fn recv(&mut self) -> anyhow::Result<Frame> {
        loop {
            let frame = self.recv_any().await?;
            if frame.opcode() != OpCode::KeepAlive {
                return Ok(frame);
            }
        }
    }

    pub async fn send(&mut self, frame: &Frame) -> anyhow::Result<()> {
        protocol::write_frame(&mut self.writer, frame).await?;
        Ok(())
    }

    /// Sends a frame built from raw parts.
    pub async fn reply(
        &mut self,
        opcode: OpCode,
        pointer: u32,
        flag: u8,
        payload: &[u8],
    ) -> anyhow::Result<()> {
        let frame = Frame::new(
            RoutePointer::new(pointer),
            ContentType::Utf8,
            opcode,
            flag,
            payload.to_vec(),
        )?;
        self.send(&frame).await
    }

    /// Answers the next RESOLVE with `pointer`, then the next OPEN with ALLOW.
    /// Returns the OPEN request.
    pub async fn accept_channel(&mut self, pointer: u32) -> anyhow::Result<Frame> {
        let resolve = self.recv().await?;
        anyhow::ensure!(resolve.opcode() == OpCode::Resolve, "expected RESOLVE, got {resolve:?}");
        self.reply(OpCode::Resolve, pointer, 0, resolve.payload()).await?;

        let open = self.recv().await?;
        anyhow::ensure!(open.opcode() == OpCode::Open, "expected OPEN, got {open:?}");
        anyhow::ensure!(open.pointer().as_u32() == pointer, "OPEN on wrong pointer");
        self.reply(OpCode::Open, pointer, 0, b"").await?;

        Ok(open)
    }

    /// Waits for the client to close its side of the socket.
    pub async fn expect_eof(&mut self) -> anyhow::Result<()> {
        loop {
            match timeout(WAIT, protocol::read_frame(&mut self.reader)).await? {
                Ok(_) => continue,
                Err(_) => return Ok(()),
            }
        }
    }
}

// ============================================================================
// Recorder
// ============================================================================

#[derive(Debug)]
pub enum Recorded {
    Connect,
    Message(ChannelEvent),
    Signal(ChannelEvent),
    Close(CloseEvent),
}

/// Collects the callbacks of one channel in order.
pub struct Recorder {
    rx: mpsc::UnboundedReceiver<Recorded>,
}

impl Recorder {
    /// Creates a channel on `client` whose callbacks feed a recorder.
    pub fn channel(client: &Client) -> (Channel, Recorder) {
        let (tx, rx) = mpsc::unbounded_channel();
        let tx = Arc::new(tx);
        let (a, b, c, d) = (
            Arc::clone(&tx),
            Arc::clone(&tx),
            Arc::clone(&tx),
            Arc::clone(&tx),
        );

        let channel = client
            .channel()
            .on_connect(move |_| {
                let _ = a.send(Recorded::Connect);
            })
            .on_message(move |_, event| {
                let _ = b.send(Recorded::Message(event));
            })
            .on_signal(move |_, event| {
                let _ = c.send(Recorded::Signal(event));
            })
            .on_close(move |_, event| {
                let _ = d.send(Recorded::Close(event));
            })
            .build();

        (channel, Recorder { rx })
    }

    pub async fn next(&mut self) -> anyhow::Result<Recorded> {
        timeout(WAIT, self.rx.recv())
            .await?
            .ok_or_else(|| anyhow::anyhow!("recorder closed"))
    }

    pub async fn expect_connect(&mut self) -> anyhow::Result<()> {
        match self.next().await? {
            Recorded::Connect => Ok(()),
            other => anyhow::bail!("expected connect, got {other:?}"),
        }
    }

    pub async fn expect_close(&mut self) -> anyhow::Result<CloseEvent> {
        match self.next().await? {
            Recorded::Close(event) => Ok(event),
            other => anyhow::bail!("expected close, got {other:?}"),
        }
    }

    /// Asserts nothing further arrives within `window`.
    pub async fn expect_silence(&mut self, window: Duration) -> anyhow::Result<()> {
        match timeout(window, self.rx.recv()).await {
            Err(_) | Ok(None) => Ok(()),
            Ok(Some(event)) => anyhow::bail!("unexpected event {event:?}"),
        }
    }
}
