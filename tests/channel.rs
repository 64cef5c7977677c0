//! End-to-end channel behaviour against an in-process winksock/1 server.

mod common;

use std::time::Duration;

use common::{MockServer, Recorded, Recorder, init_tracing};
use winksock::protocol::{open_flag, signal_flag};
use winksock::{ChannelMode, ChannelState, Client, ContentType, Error, OpCode};

type TestResult = anyhow::Result<()>;

// ============================================================================
// Happy Path
// ============================================================================

#[tokio::test]
async fn resolve_open_then_data_both_ways() -> TestResult {
    init_tracing();
    let server = MockServer::bind().await?;
    let client = Client::builder().build()?;
    let (channel, mut events) = Recorder::channel(&client);

    channel.connect(&server.url("/a?token=1"), ChannelMode::READ_WRITE)?;

    let mut conn = server.accept().await?;

    // The sender announces itself with a heartbeat.
    let first = conn.recv_any().await?;
    assert_eq!(first.opcode(), OpCode::KeepAlive);

    let open = conn.accept_channel(5).await?;
    assert_eq!(open.flag(), ChannelMode::READ_WRITE.bits());
    assert_eq!(open.payload(), b"token=1");

    events.expect_connect().await?;
    assert!(channel.is_connected());
    assert!(channel.is_writable());
    assert_eq!(channel.route_pointer().as_u32(), 5);

    channel.send_with_priority("hi", 4)?;
    let data = conn.recv().await?;
    assert_eq!(data.opcode(), OpCode::Data);
    assert_eq!(data.pointer().as_u32(), 5);
    assert_eq!(data.flag(), 4);
    assert_eq!(data.payload(), b"hi");

    conn.reply(OpCode::Data, 5, 2, b"yo").await?;
    match events.next().await? {
        Recorded::Message(event) => {
            assert_eq!(event.text(), Some("yo"));
            assert_eq!(event.priority(), 2);
        }
        other => anyhow::bail!("expected message, got {other:?}"),
    }

    events.expect_silence(Duration::from_millis(100)).await
}

#[tokio::test]
async fn binary_payload_keeps_content_type() -> TestResult {
    let server = MockServer::bind().await?;
    let client = Client::builder().build()?;
    let (channel, mut events) = Recorder::channel(&client);

    channel.connect(&server.url("/bin"), ChannelMode::WRITE)?;
    let mut conn = server.accept().await?;
    conn.accept_channel(1).await?;
    events.expect_connect().await?;

    channel.send(vec![0u8, 1, 2])?;
    let data = conn.recv().await?;
    assert_eq!(data.content_type(), ContentType::Binary);
    assert_eq!(data.payload(), &[0, 1, 2]);
    Ok(())
}

// ============================================================================
// Denial
// ============================================================================

#[tokio::test]
async fn open_denied_closes_once_without_connect() -> TestResult {
    let server = MockServer::bind().await?;
    let client = Client::builder().build()?;
    let (channel, mut events) = Recorder::channel(&client);

    channel.connect(&server.url("/private"), ChannelMode::READ)?;
    let mut conn = server.accept().await?;

    let resolve = conn.recv().await?;
    assert_eq!(resolve.payload(), b"/private");
    conn.reply(OpCode::Resolve, 3, open_flag::ALLOW, b"/private").await?;
    conn.recv().await?;
    conn.reply(OpCode::Open, 3, open_flag::DENY, b"members only").await?;

    let close = events.expect_close().await?;
    assert!(close.was_denied());
    assert!(!close.was_clean());
    assert_eq!(close.reason(), Some("members only"));
    assert_eq!(channel.state(), ChannelState::Destroyed);

    events.expect_silence(Duration::from_millis(100)).await?;

    // Last channel gone: the client drops the socket.
    conn.expect_eof().await
}

// ============================================================================
// Closing
// ============================================================================

#[tokio::test]
async fn local_close_is_clean() -> TestResult {
    let server = MockServer::bind().await?;
    let client = Client::builder().build()?;
    let (channel, mut events) = Recorder::channel(&client);

    channel.connect(&server.url("/a"), ChannelMode::READ_WRITE)?;
    let mut conn = server.accept().await?;
    conn.accept_channel(7).await?;
    events.expect_connect().await?;

    channel.close_with("done")?;
    assert!(channel.is_closing());

    let end = conn.recv().await?;
    assert_eq!(end.opcode(), OpCode::Signal);
    assert_eq!(end.flag(), signal_flag::END);
    assert_eq!(end.payload(), b"done");

    conn.reply(OpCode::Signal, 7, signal_flag::END, b"").await?;

    let close = events.expect_close().await?;
    assert!(close.was_clean());
    assert!(!close.was_denied());
    assert_eq!(close.reason(), None);

    conn.expect_eof().await?;
    assert_eq!(client.connection_count(), 0);
    Ok(())
}

#[tokio::test]
async fn remote_end_is_echoed() -> TestResult {
    let server = MockServer::bind().await?;
    let client = Client::builder().build()?;
    let (channel, mut events) = Recorder::channel(&client);

    channel.connect(&server.url("/a"), ChannelMode::READ)?;
    let mut conn = server.accept().await?;
    conn.accept_channel(2).await?;
    events.expect_connect().await?;

    conn.reply(OpCode::Signal, 2, signal_flag::END, b"maintenance").await?;

    let echo = conn.recv().await?;
    assert_eq!(echo.opcode(), OpCode::Signal);
    assert_eq!(echo.flag(), signal_flag::END);
    assert_eq!(echo.pointer().as_u32(), 2);

    let close = events.expect_close().await?;
    assert!(close.was_clean());
    assert_eq!(close.reason(), Some("maintenance"));
    assert!(!channel.is_connected());
    Ok(())
}

#[tokio::test]
async fn denied_write_sends_nothing() -> TestResult {
    let server = MockServer::bind().await?;
    let client = Client::builder().build()?;
    let (channel, mut events) = Recorder::channel(&client);

    channel.connect(&server.url("/ro"), ChannelMode::READ)?;
    let mut conn = server.accept().await?;
    conn.accept_channel(4).await?;
    events.expect_connect().await?;

    assert!(matches!(
        channel.send("nope"),
        Err(Error::PermissionDenied { operation: "write" })
    ));
    channel.close()?;

    // The END is the very next frame: the rejected DATA never hit the wire.
    let next = conn.recv().await?;
    assert_eq!(next.opcode(), OpCode::Signal);
    assert_eq!(next.flag(), signal_flag::END);
    Ok(())
}

// ============================================================================
// Multiplexing
// ============================================================================

#[tokio::test]
async fn channels_share_connection_and_receive_broadcast() -> TestResult {
    let server = MockServer::bind().await?;
    let client = Client::builder().build()?;
    let (a, mut events_a) = Recorder::channel(&client);
    let (b, mut events_b) = Recorder::channel(&client);

    a.connect(&server.url("/a"), ChannelMode::READ_EMIT)?;
    b.connect(&server.url("/b"), ChannelMode::READ_EMIT)?;
    assert_eq!(client.connection_count(), 1);

    let mut conn = server.accept().await?;
    let first = conn.recv().await?;
    let second = conn.recv().await?;
    assert_eq!(first.payload(), b"/a");
    assert_eq!(second.payload(), b"/b");

    conn.reply(OpCode::Resolve, 10, 0, b"/a").await?;
    conn.reply(OpCode::Resolve, 20, 0, b"/b").await?;
    let open_a = conn.recv().await?;
    let open_b = conn.recv().await?;
    assert_eq!(open_a.pointer().as_u32(), 10);
    assert_eq!(open_b.pointer().as_u32(), 20);
    conn.reply(OpCode::Open, 10, 0, b"").await?;
    conn.reply(OpCode::Open, 20, 0, b"").await?;
    events_a.expect_connect().await?;
    events_b.expect_connect().await?;

    conn.reply(OpCode::Signal, 0, signal_flag::EMIT, b"to everyone").await?;
    conn.reply(OpCode::Data, 20, 0, b"only b").await?;

    match events_a.next().await? {
        Recorded::Signal(event) => assert_eq!(event.text(), Some("to everyone")),
        other => anyhow::bail!("expected signal, got {other:?}"),
    }
    match events_b.next().await? {
        Recorded::Signal(event) => assert_eq!(event.text(), Some("to everyone")),
        other => anyhow::bail!("expected signal, got {other:?}"),
    }
    match events_b.next().await? {
        Recorded::Message(event) => assert_eq!(event.text(), Some("only b")),
        other => anyhow::bail!("expected message, got {other:?}"),
    }
    events_a.expect_silence(Duration::from_millis(100)).await
}

#[tokio::test]
async fn same_path_opens_second_connection() -> TestResult {
    let server = MockServer::bind().await?;
    let client = Client::builder().build()?;
    let (a, _events_a) = Recorder::channel(&client);
    let (b, _events_b) = Recorder::channel(&client);

    a.connect(&server.url("/same"), ChannelMode::READ)?;
    b.connect(&server.url("/same"), ChannelMode::READ)?;

    assert_eq!(client.connection_count(), 2);
    let _first = server.accept().await?;
    let _second = server.accept().await?;
    Ok(())
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn unknown_pointer_tears_down_every_channel() -> TestResult {
    let server = MockServer::bind().await?;
    let client = Client::builder().build()?;
    let (a, mut events_a) = Recorder::channel(&client);
    let (b, mut events_b) = Recorder::channel(&client);

    a.connect(&server.url("/a"), ChannelMode::READ)?;
    let mut conn = server.accept().await?;
    conn.accept_channel(1).await?;
    events_a.expect_connect().await?;

    b.connect(&server.url("/b"), ChannelMode::READ)?;
    conn.accept_channel(2).await?;
    events_b.expect_connect().await?;

    conn.reply(OpCode::Data, 99, 0, b"lost").await?;

    for events in [&mut events_a, &mut events_b] {
        let close = events.expect_close().await?;
        assert!(!close.was_clean());
        assert!(!close.was_denied());
        assert!(close.error().is_some_and(Error::is_protocol_error));
        events.expect_silence(Duration::from_millis(100)).await?;
    }

    conn.expect_eof().await?;
    assert_eq!(client.connection_count(), 0);
    Ok(())
}

#[tokio::test]
async fn rejected_upgrade_closes_channel() -> TestResult {
    let server = MockServer::bind().await?;
    let client = Client::builder().build()?;
    let (channel, mut events) = Recorder::channel(&client);

    channel.connect(&server.url("/a"), ChannelMode::READ)?;
    let mut conn = server.accept_raw().await?;
    conn.read_request().await?;
    conn.write_raw(b"HTTP/1.1 404 Not Found\r\n\r\n").await?;

    let close = events.expect_close().await?;
    assert!(!close.was_clean());
    assert!(matches!(
        close.error(),
        Some(Error::UnexpectedResponseCode { code: 404 })
    ));
    Ok(())
}

#[tokio::test]
async fn server_hangup_is_unclean() -> TestResult {
    let server = MockServer::bind().await?;
    let client = Client::builder().build()?;
    let (channel, mut events) = Recorder::channel(&client);

    channel.connect(&server.url("/a"), ChannelMode::READ)?;
    let mut conn = server.accept().await?;
    conn.accept_channel(1).await?;
    events.expect_connect().await?;

    drop(conn);

    let close = events.expect_close().await?;
    assert!(!close.was_clean());
    assert!(close.error().is_some_and(Error::is_transport_error));
    assert!(matches!(channel.send("x"), Err(Error::NotConnected)));
    Ok(())
}

#[tokio::test]
async fn unreachable_endpoint_is_unclean() -> TestResult {
    // Bind and drop to find a port nobody listens on.
    let url = {
        let server = MockServer::bind().await?;
        server.url("/a")
    };
    let client = Client::builder().build()?;
    let (channel, mut events) = Recorder::channel(&client);

    channel.connect(&url, ChannelMode::READ)?;

    let close = events.expect_close().await?;
    assert!(matches!(close.error(), Some(Error::UnableToConnect { .. })));
    Ok(())
}

#[tokio::test]
async fn client_shutdown_closes_channels() -> TestResult {
    let server = MockServer::bind().await?;
    let client = Client::builder().build()?;
    let (channel, mut events) = Recorder::channel(&client);

    channel.connect(&server.url("/a"), ChannelMode::READ)?;
    let mut conn = server.accept().await?;
    conn.accept_channel(1).await?;
    events.expect_connect().await?;

    client.shutdown();

    let close = events.expect_close().await?;
    assert!(matches!(close.error(), Some(Error::ConnectionClosed)));
    events.expect_silence(Duration::from_millis(100)).await
}

// ============================================================================
// Heartbeat
// ============================================================================

#[tokio::test]
async fn idle_connection_sends_keepalives() -> TestResult {
    let server = MockServer::bind().await?;
    let client = Client::builder()
        .keepalive_interval(Duration::from_millis(50))
        .build()?;
    let (channel, _events) = Recorder::channel(&client);

    channel.connect(&server.url("/a"), ChannelMode::READ)?;
    let mut conn = server.accept().await?;

    let mut keepalives = 0;
    while keepalives < 3 {
        if conn.recv_any().await?.opcode() == OpCode::KeepAlive {
            keepalives += 1;
        }
    }
    Ok(())
}
