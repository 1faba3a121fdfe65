//! # Sandpile Wire
//!
//! Line-oriented protocol client for a remote sandpile simulator.
//!
//! This crate owns everything that touches the byte stream: command
//! serialization, reply parsing, the acknowledgement discipline, and the
//! repaint-on-mutation convention. It works purely in server index space.
//!
//! ## Key Types
//!
//! - [`Command`]: Closed set of commands the simulator understands
//! - [`WireClient`]: One command in flight, one reply line per command
//! - [`LineTransport`]: Send a line / receive a line
//! - [`TcpLineTransport`]: The real socket
//! - [`MockSandpileServer`]: In-memory simulator for tests

pub mod client;
pub mod error;
pub mod mock_server;
pub mod protocol;
pub mod transport;

// Re-export main types
pub use client::WireClient;
pub use error::{WireError, WireResult};
pub use mock_server::{MockSandpileServer, MockServerHandle};
pub use protocol::{Command, ConfigName, DEFAULT_HOST, DEFAULT_PORT, SpecialConfig};
pub use transport::{LineTransport, TcpLineTransport};

pub use tokio_util::sync::CancellationToken;
