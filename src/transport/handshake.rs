//! HTTP upgrade handshake.
//!
//! Every connection starts with a literal HTTP/1.1 request asking the server
//! to switch to `winksock/1`:
//!
//! ```text
//! GET / HTTP/1.1\r\n
//! Connection: upgrade\r\n
//! Upgrade: winksock/1\r\n
//! Host: <host>\r\n
//! \r\n
//! ```
//!
//! The server must answer with status `101`. An `Upgrade` header, if present,
//! must name `winksock/1`.

// ============================================================================
// Imports
// ============================================================================

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Protocol token sent in the `Upgrade` header.
pub const PROTOCOL_TOKEN: &str = "winksock/1";

/// Status code expected in the handshake response.
const SWITCHING_PROTOCOLS: u16 = 101;

// ============================================================================
// Request
// ============================================================================

/// Builds the upgrade request for `host`.
#[must_use]
pub fn request(host: &str) -> String {
    format!(
        "GET / HTTP/1.1\r\n\
         Connection: upgrade\r\n\
         Upgrade: {PROTOCOL_TOKEN}\r\n\
         Host: {host}\r\n\
         \r\n"
    )
}

// ============================================================================
// Response Parsing
// ============================================================================

/// Parses a status line of the form `<proto> <code> <reason>`.
///
/// # Errors
///
/// - [`Error::BadHttpResponse`] if the code is not a number
/// - [`Error::UnexpectedResponseCode`] if the code is not `101`, or the line
///   has fewer than three parts (reported as code `0`)
pub fn parse_status_line(line: &str) -> Result<u16> {
    let mut parts = line.splitn(3, ' ');
    let _proto = parts.next();

    let code = match (parts.next(), parts.next()) {
        (Some(code), Some(_reason)) => code
            .trim()
            .parse::<u16>()
            .map_err(|_| Error::BadHttpResponse)?,
        _ => 0,
    };

    if code != SWITCHING_PROTOCOLS {
        return Err(Error::UnexpectedResponseCode { code });
    }

    Ok(code)
}

/// Checks one response header line.
///
/// Only the `Upgrade` header is inspected (name compared case-insensitively).
///
/// # Errors
///
/// [`Error::BadProtocolVersion`] if `Upgrade` names another protocol.
pub fn check_header_line(line: &str) -> Result<()> {
    let Some((name, value)) = line.split_once(':') else {
        return Ok(());
    };

    if !name.trim().eq_ignore_ascii_case("upgrade") {
        return Ok(());
    }

    let value = value.trim();
    if !value.eq_ignore_ascii_case(PROTOCOL_TOKEN) {
        return Err(Error::bad_protocol_version(value));
    }

    Ok(())
}

// ============================================================================
// Exchange
// ============================================================================

/// Performs the upgrade exchange on an open stream.
///
/// `reader` must stay in use for frame decoding afterwards, so any bytes the
/// server sent after the blank line remain buffered.
///
/// # Errors
///
/// - [`Error::Io`] if the request cannot be written
/// - [`Error::BadHttpResponse`] on read failure or EOF before the blank line
/// - [`Error::UnexpectedResponseCode`] / [`Error::BadProtocolVersion`] on a
///   rejected response
pub async fn perform<R, W>(reader: &mut R, writer: &mut W, host: &str) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_all(request(host).as_bytes()).await?;
    writer.flush().await?;

    trace!(host, "Upgrade request sent");

    let mut got_status = false;
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader
            .read_line(&mut line)
            .await
            .map_err(|_| Error::BadHttpResponse)?;

        if n == 0 {
            return Err(Error::BadHttpResponse);
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }

        if got_status {
            check_header_line(trimmed)?;
        } else {
            parse_status_line(trimmed)?;
            got_status = true;
        }
    }

    debug!(host, "Handshake completed");

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
