//! # Sandpile Session
//!
//! User-facing façade for driving a remote sandpile simulator by vertex
//! label instead of server index.
//!
//! # Quick Start
//!
//! ```ignore
//! use sandpile_session::{GraphSession, SessionConfig};
//! use sandpile_core::LabelledGraph;
//!
//! let config = SessionConfig::load_from("session.toml")?;
//! let mut session = GraphSession::connect(&config, "sink".to_string()).await?;
//!
//! let graph = LabelledGraph::new()
//!     .with_vertex("a".to_string(), (0.0, 0.0))
//!     .with_vertex("b".to_string(), (1.0, 0.0))
//!     .with_vertex("sink".to_string(), (0.5, 1.0))
//!     .with_edge("a".to_string(), "b".to_string(), 1)
//!     .with_edge("a".to_string(), "sink".to_string(), 1)
//!     .with_edge("b".to_string(), "a".to_string(), 1)
//!     .with_edge("b".to_string(), "sink".to_string(), 1);
//! session.import_graph(&graph).await?;
//!
//! session.add_sand(&"a".to_string(), 5).await?;
//! session.stabilize().await?;
//! let config = session.get_config().await?;
//! ```
//!
//! # Blocking
//!
//! Every operation waits for the simulator's single reply line. Long
//! operations (stabilization, identity computation) can take arbitrarily
//! long; use [`SessionConfig::deadline_ms`] or
//! [`GraphSession::set_cancellation`] to bound the wait locally.

pub mod config;
pub mod error;
pub mod session;

pub use config::SessionConfig;
pub use error::{ConfigError, SessionError, SessionResult};
pub use session::GraphSession;

pub use sandpile_core::{
    Configuration, GraphSnapshot, GraphSource, IndexLabel, LabelledEdge, LabelledGraph,
    LabelledVertex, Layout, Position, VertexLabel,
};
pub use sandpile_wire::{CancellationToken, ConfigName, WireError};
