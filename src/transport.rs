//! Framed TCP transport for WOW API calls.
//!
//! One request, one response, one connection. Messages in both directions
//! are delimited by a `content-length:` header line and a blank line:
//!
//! ```text
//! content-length:123\r\n
//! \r\n
//! <?xml version="1.0"?>...
//! ```
//!
//! After the response is read - or reading fails - the client sends the
//! literal `QUIT\r\n` to tell the server the transfer is complete, then
//! closes the socket. No connection outlives a single exchange.

use std::io;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Idle read timeout applied to every read of the response.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(240);

/// Maximum declared response size (100MB) to prevent OOM from a
/// misbehaving server.
const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// The framing header, literally lowercase with no space after the colon.
const HEADER_PREFIX: &str = "content-length:";

/// Address of the WOW server, supplied by the embedding application.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Transport-level failure, tagged by the phase it occurred in.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection could not be opened.
    #[error("connection failed: {0}")]
    Connect(#[source] io::Error),

    /// The framed request could not be written.
    #[error("cannot write to socket: {0}")]
    Send(#[source] io::Error),

    /// The response header line was missing, unreadable, or malformed.
    #[error("invalid response header: {0}")]
    Header(String),

    /// The response body ended or failed before the declared length.
    #[error("error reading response package: {0}")]
    Body(#[source] io::Error),

    /// A read stalled past the idle timeout.
    #[error("read timed out after {0}s")]
    Timeout(u64),

    /// The response body is not valid UTF-8.
    #[error("response body is not valid UTF-8")]
    Utf8(#[source] std::string::FromUtf8Error),
}

/// Send one framed request and read the framed response.
///
/// Opens a fresh connection to `config`, writes `body` with its
/// `content-length:` prefix, and reads the reply with every read bounded
/// by `idle_timeout`. Whatever the outcome once the connection is open,
/// the `QUIT\r\n` handshake runs before the socket is dropped; its own
/// failure is swallowed - the response (or earlier error) is what counts.
///
/// # Errors
///
/// Any [`TransportError`] variant except that shutdown failures are never
/// surfaced.
pub async fn exchange(
    config: &ServerConfig,
    body: &str,
    idle_timeout: Duration,
) -> Result<String, TransportError> {
    let stream = TcpStream::connect((config.host.as_str(), config.port))
        .await
        .map_err(TransportError::Connect)?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let result = send_and_receive(&mut reader, &mut write_half, body, idle_timeout).await;

    // transfer-complete handshake per the WOW docs; the server tolerates
    // an immediate close afterwards
    let _ = write_half.write_all(b"QUIT\r\n").await;
    let _ = write_half.shutdown().await;

    result
}

async fn send_and_receive(
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    body: &str,
    idle_timeout: Duration,
) -> Result<String, TransportError> {
    write_framed(writer, body).await?;
    read_framed(reader, idle_timeout).await
}

/// Write `body` with its `content-length:` framing header.
async fn write_framed(writer: &mut OwnedWriteHalf, body: &str) -> Result<(), TransportError> {
    let framed = format!("{HEADER_PREFIX}{}\r\n\r\n{body}", body.len());
    writer
        .write_all(framed.as_bytes())
        .await
        .map_err(TransportError::Send)?;
    writer.flush().await.map_err(TransportError::Send)?;
    Ok(())
}

/// Read one framed message: header line, blank separator, then exactly the
/// declared number of body bytes, looping over short reads. Every read is
/// bounded by `idle_timeout`.
async fn read_framed(
    reader: &mut BufReader<OwnedReadHalf>,
    idle_timeout: Duration,
) -> Result<String, TransportError> {
    let secs = idle_timeout.as_secs();

    let mut header = String::new();
    let n = timeout(idle_timeout, reader.read_line(&mut header))
        .await
        .map_err(|_| TransportError::Timeout(secs))?
        .map_err(|e| TransportError::Header(format!("cannot read from socket: {e}")))?;
    if n == 0 {
        return Err(TransportError::Header(
            "connection closed before header".to_string(),
        ));
    }
    let expected = parse_content_length(&header)?;

    // blank separator line between header and body
    let mut blank = String::new();
    timeout(idle_timeout, reader.read_line(&mut blank))
        .await
        .map_err(|_| TransportError::Timeout(secs))?
        .map_err(TransportError::Body)?;

    let mut buf = vec![0u8; expected];
    let mut read = 0;
    while read < expected {
        let n = timeout(idle_timeout, reader.read(&mut buf[read..]))
            .await
            .map_err(|_| TransportError::Timeout(secs))?
            .map_err(TransportError::Body)?;
        if n == 0 {
            return Err(TransportError::Body(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("connection closed after {read} of {expected} bytes"),
            )));
        }
        read += n;
    }

    String::from_utf8(buf).map_err(TransportError::Utf8)
}

/// Parse the numeric length out of a `content-length:` header line.
///
/// The prefix match is case-insensitive and may sit anywhere in the line;
/// surrounding whitespace on the value is trimmed.
fn parse_content_length(line: &str) -> Result<usize, TransportError> {
    let lower = line.to_ascii_lowercase();
    let Some(position) = lower.find(HEADER_PREFIX) else {
        return Err(TransportError::Header(line.trim_end().to_string()));
    };
    let value = line[position + HEADER_PREFIX.len()..].trim();
    let expected: usize = value
        .parse()
        .map_err(|_| TransportError::Header(line.trim_end().to_string()))?;
    if expected > MAX_MESSAGE_SIZE {
        return Err(TransportError::Header(format!(
            "declared length {expected} exceeds maximum {MAX_MESSAGE_SIZE} bytes"
        )));
    }
    Ok(expected)
}
