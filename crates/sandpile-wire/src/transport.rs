//! Transport abstraction for line-oriented exchanges
//!
//! The [`LineTransport`] trait provides the two primitives the client needs:
//! write one line, read one line. This allows the same client code to run
//! against a real TCP socket and against an in-memory simulator in tests.
//!
//! ## Implementations
//!
//! - [`TcpLineTransport`]: Buffered TCP stream (in this module)
//! - [`MockSandpileServer`](crate::MockSandpileServer): In-memory simulator for testing

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info, instrument};

use crate::error::{WireError, WireResult};

/// Transport trait for newline-framed text exchanges
///
/// Implementations are exclusively owned by one client; `&mut self` on
/// every method keeps at most one operation in flight.
#[async_trait]
pub trait LineTransport: Send {
    /// Write `line` followed by a single newline
    ///
    /// `line` must not contain a newline itself. This is not checked here:
    /// a violation desynchronizes the stream for good.
    async fn send_line(&mut self, line: &str) -> WireResult<()>;

    /// Read one newline-terminated line and return it without the terminator
    ///
    /// Blocks until a full line is available. There is no timeout.
    async fn recv_line(&mut self) -> WireResult<String>;

    /// Release the underlying stream
    ///
    /// Default implementation does nothing.
    async fn shutdown(&mut self) -> WireResult<()> {
        Ok(())
    }

    /// Human-readable description of the remote end (for logging)
    fn peer(&self) -> String;

    /// Host and port to dial for a replacement connection
    ///
    /// Default implementation has none.
    fn endpoint(&self) -> Option<(String, u16)> {
        None
    }
}

/// A TCP stream wrapped with a line-buffered reader
pub struct TcpLineTransport {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: String,
    endpoint: Option<(String, u16)>,
}

impl TcpLineTransport {
    /// Open a stream socket to `host:port`
    ///
    /// # Errors
    ///
    /// `WireError::Connection` if the endpoint refuses or is unreachable.
    #[instrument(level = "debug")]
    pub async fn connect(host: &str, port: u16) -> WireResult<Self> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| WireError::Connection(format!("{}:{}: {}", host, port, e)))?;
        let mut transport = Self::from_stream(stream)?;
        transport.endpoint = Some((host.to_string(), port));
        Ok(transport)
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: TcpStream) -> WireResult<Self> {
        stream.set_nodelay(true)?;
        let addr = stream.peer_addr().ok();
        let peer = addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let endpoint = addr.map(|addr| (addr.ip().to_string(), addr.port()));
        let (read_half, writer) = stream.into_split();

        info!(peer = %peer, "Connected to simulator");

        Ok(Self {
            reader: BufReader::new(read_half),
            writer,
            peer,
            endpoint,
        })
    }
}

#[async_trait]
impl LineTransport for TcpLineTransport {
    async fn send_line(&mut self, line: &str) -> WireResult<()> {
        let mut framed = String::with_capacity(line.len() + 1);
        framed.push_str(line);
        framed.push('\n');
        self.writer.write_all(framed.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn recv_line(&mut self) -> WireResult<String> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).await?;
        if read == 0 {
            return Err(WireError::Connection(format!(
                "{} closed the connection",
                self.peer
            )));
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(line)
    }

    async fn shutdown(&mut self) -> WireResult<()> {
        debug!(peer = %self.peer, "Shutting down stream");
        self.writer.shutdown().await?;
        Ok(())
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }

    fn endpoint(&self) -> Option<(String, u16)> {
        self.endpoint.clone()
    }
}
