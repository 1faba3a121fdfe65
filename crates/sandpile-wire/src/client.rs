//! Index-space command client
//!
//! [`WireClient`] frames commands onto a [`LineTransport`], reads exactly
//! one reply line per command, and enforces the acknowledgement discipline:
//! a mutating command succeeds only if the reply is `done`. With
//! auto-repaint on, every successful mutation is followed by a `repaint`
//! round-trip.
//!
//! The client knows nothing about labels; see `sandpile-session` for the
//! label-space façade.
//!
//! ## Deadlines and cancellation
//!
//! The protocol has no cancel message. A local deadline or cancellation
//! token only stops waiting: the abandoned reply may still arrive later, so
//! the client marks itself desynchronized and refuses further exchanges
//! until it is replaced by a fresh connection.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sandpile_core::{Position, Sand, VertexIndex, WeightedEdge};

use crate::error::{WireError, WireResult};
use crate::protocol::{self, Command, ConfigName, SpecialConfig};
use crate::transport::{LineTransport, TcpLineTransport};

/// A single open connection to the simulator
pub struct WireClient<T: LineTransport = TcpLineTransport> {
    transport: Option<T>,
    auto_repaint: bool,
    deadline: Option<Duration>,
    cancellation: Option<CancellationToken>,
    desynchronized: bool,
}

impl WireClient<TcpLineTransport> {
    /// Connect to a simulator over TCP
    pub async fn connect(host: &str, port: u16) -> WireResult<Self> {
        let transport = TcpLineTransport::connect(host, port).await?;
        Ok(Self::new(transport))
    }
}

impl<T: LineTransport> WireClient<T> {
    /// Wrap an open transport; auto-repaint starts enabled
    pub fn new(transport: T) -> Self {
        Self {
            transport: Some(transport),
            auto_repaint: true,
            deadline: None,
            cancellation: None,
            desynchronized: false,
        }
    }

    pub fn with_auto_repaint(mut self, enabled: bool) -> Self {
        self.auto_repaint = enabled;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn auto_repaint(&self) -> bool {
        self.auto_repaint
    }

    /// Toggle the automatic `repaint` after successful mutations
    pub fn set_auto_repaint(&mut self, enabled: bool) {
        self.auto_repaint = enabled;
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Bound each send and each receive by a local deadline
    pub fn set_deadline(&mut self, deadline: Option<Duration>) {
        self.deadline = deadline;
    }

    /// Install (or remove) a token that abandons a pending exchange
    pub fn set_cancellation(&mut self, token: Option<CancellationToken>) {
        self.cancellation = token;
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Host and port of the open connection, when the transport has one
    pub fn endpoint(&self) -> Option<(String, u16)> {
        self.transport.as_ref().and_then(|t| t.endpoint())
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn is_desynchronized(&self) -> bool {
        self.desynchronized
    }

    /// Borrow the transport (e.g. to inspect a mock)
    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    /// Release the transport; later operations fail with `NotConnected`
    pub async fn close(&mut self) -> WireResult<()> {
        let mut transport = self.transport.take().ok_or(WireError::NotConnected)?;
        info!(peer = %transport.peer(), "Closing connection");
        transport.shutdown().await
    }

    /// Send one raw command line
    pub async fn send(&mut self, command: &Command) -> WireResult<()> {
        let line = command.encode();
        debug!(command = %command.name(), bytes = line.len(), "Sending command");
        let deadline = self.deadline;
        let cancellation = self.cancellation.clone();
        let transport = self.usable_transport()?;
        let result = guarded(deadline, cancellation.as_ref(), transport.send_line(&line)).await;
        self.note_abandoned(&result);
        result
    }

    /// Wait for one reply line
    pub async fn receive(&mut self) -> WireResult<String> {
        let deadline = self.deadline;
        let cancellation = self.cancellation.clone();
        let transport = self.usable_transport()?;
        let result = guarded(deadline, cancellation.as_ref(), transport.recv_line()).await;
        self.note_abandoned(&result);
        if let Ok(reply) = &result {
            debug!(bytes = reply.len(), "Received reply");
        }
        result
    }

    fn usable_transport(&mut self) -> WireResult<&mut T> {
        if self.desynchronized {
            return Err(WireError::Desynchronized);
        }
        self.transport.as_mut().ok_or(WireError::NotConnected)
    }

    fn note_abandoned<R>(&mut self, result: &WireResult<R>) {
        if matches!(result, Err(WireError::Timeout) | Err(WireError::Cancelled)) {
            warn!("Exchange abandoned; connection is now desynchronized");
            self.desynchronized = true;
        }
    }

    async fn exchange(&mut self, command: &Command) -> WireResult<String> {
        self.send(command).await?;
        self.receive().await
    }

    /// Exchange one command and require `done`, without repainting
    async fn acknowledge(&mut self, command: &Command) -> WireResult<()> {
        let reply = self.exchange(command).await?;
        protocol::parse_ack(&reply).inspect_err(|_| {
            warn!(command = %command.name(), reply = %reply, "Command rejected by server");
        })
    }

    /// Run a mutating command, then repaint if auto-repaint is on
    ///
    /// A failure after `done` arrived is reported as
    /// [`WireError::RepaintFailed`]: the mutation itself was applied.
    async fn execute(&mut self, command: Command) -> WireResult<()> {
        self.acknowledge(&command).await?;
        if self.auto_repaint {
            self.acknowledge(&Command::Repaint).await.map_err(|e| {
                warn!(command = %command.name(), error = %e, "Repaint failed after accepted command");
                WireError::RepaintFailed(Box::new(e))
            })?;
        }
        Ok(())
    }

    /// Run a query and parse its payload
    async fn query<R>(&mut self, command: Command, parse: fn(&str) -> Option<R>) -> WireResult<R> {
        let reply = self.exchange(&command).await?;
        parse(&reply).ok_or_else(|| WireError::MalformedReply {
            command: command.name(),
            reply,
        })
    }

    // ========================================================================
    // Simulation control
    // ========================================================================

    /// Ask the simulator to redraw
    pub async fn repaint(&mut self) -> WireResult<()> {
        self.acknowledge(&Command::Repaint).await
    }

    /// Fire every unstable vertex once
    pub async fn update(&mut self) -> WireResult<()> {
        self.execute(Command::Update).await
    }

    /// Fire until stable
    ///
    /// Without a reachable sink this never terminates on the server, and
    /// without a deadline the call waits forever.
    pub async fn stabilize(&mut self) -> WireResult<()> {
        self.execute(Command::Stabilize).await
    }

    pub async fn delete_graph(&mut self) -> WireResult<()> {
        self.execute(Command::DeleteGraph).await
    }

    pub async fn clear_sand(&mut self) -> WireResult<()> {
        self.execute(Command::ClearSand).await
    }

    // ========================================================================
    // Vertices and edges
    // ========================================================================

    pub async fn get_vertices(&mut self) -> WireResult<Vec<Position>> {
        self.query(Command::GetVertices, protocol::parse_positions)
            .await
    }

    pub async fn get_vertex(&mut self, index: VertexIndex) -> WireResult<Position> {
        self.query(Command::GetVertex(index), protocol::parse_position)
            .await
    }

    /// Add one vertex; NaN or infinite coordinates are refused locally
    pub async fn add_vertex(&mut self, position: Position) -> WireResult<()> {
        check_finite(&[position])?;
        self.execute(Command::AddVertex(position)).await
    }

    /// Add a batch of vertices; an empty batch sends nothing
    pub async fn add_vertices(&mut self, positions: &[Position]) -> WireResult<()> {
        if positions.is_empty() {
            return Ok(());
        }
        check_finite(positions)?;
        self.execute(Command::AddVertices(positions.to_vec())).await
    }

    pub async fn get_edges(&mut self) -> WireResult<Vec<WeightedEdge>> {
        self.query(Command::GetEdges, protocol::parse_edges).await
    }

    pub async fn add_edge(&mut self, edge: WeightedEdge) -> WireResult<()> {
        self.execute(Command::AddEdge(edge)).await
    }

    /// Add a batch of edges; an empty batch sends nothing
    pub async fn add_edges(&mut self, edges: &[WeightedEdge]) -> WireResult<()> {
        if edges.is_empty() {
            return Ok(());
        }
        self.execute(Command::AddEdges(edges.to_vec())).await
    }

    // ========================================================================
    // Sand and configurations
    // ========================================================================

    pub async fn get_config(&mut self) -> WireResult<Vec<Sand>> {
        self.query(Command::GetConfig, protocol::parse_sand_vector)
            .await
    }

    pub async fn set_config(&mut self, config: &[Sand]) -> WireResult<()> {
        self.execute(Command::SetConfig(config.to_vec())).await
    }

    pub async fn add_config(&mut self, config: &[Sand]) -> WireResult<()> {
        self.execute(Command::AddConfig(config.to_vec())).await
    }

    /// A configuration stored under `name` in the simulator
    pub async fn get_config_named(&mut self, name: &ConfigName) -> WireResult<Vec<Sand>> {
        self.query(
            Command::GetConfigNamed(name.clone()),
            protocol::parse_sand_vector,
        )
        .await
    }

    pub async fn get_sand(&mut self, index: VertexIndex) -> WireResult<Sand> {
        self.query(Command::GetSand(index), protocol::parse_int)
            .await
    }

    pub async fn set_sand(&mut self, index: VertexIndex, amount: Sand) -> WireResult<()> {
        self.execute(Command::SetSand(index, amount)).await
    }

    pub async fn add_sand(&mut self, index: VertexIndex, amount: Sand) -> WireResult<()> {
        self.execute(Command::AddSand(index, amount)).await
    }

    /// Scatter `amount` grains over the non-sink vertices
    pub async fn add_random_sand(&mut self, amount: Sand) -> WireResult<()> {
        self.execute(Command::AddRandomSand(amount)).await
    }

    pub async fn set_to(&mut self, kind: SpecialConfig) -> WireResult<()> {
        self.execute(Command::SetTo(kind)).await
    }

    pub async fn add_special(&mut self, kind: SpecialConfig) -> WireResult<()> {
        self.execute(Command::AddSpecial(kind)).await
    }

    pub async fn get_special(&mut self, kind: SpecialConfig) -> WireResult<Vec<Sand>> {
        self.query(Command::GetSpecial(kind), protocol::parse_sand_vector)
            .await
    }

    // ========================================================================
    // Vertex sets
    // ========================================================================

    pub async fn get_unstables(&mut self) -> WireResult<Vec<VertexIndex>> {
        self.query(Command::GetUnstables, protocol::parse_indices)
            .await
    }

    pub async fn get_num_unstables(&mut self) -> WireResult<usize> {
        self.query(Command::GetNumUnstables, protocol::parse_count)
            .await
    }

    pub async fn get_sinks(&mut self) -> WireResult<Vec<VertexIndex>> {
        self.query(Command::GetSinks, protocol::parse_indices).await
    }

    pub async fn get_nonsinks(&mut self) -> WireResult<Vec<VertexIndex>> {
        self.query(Command::GetNonsinks, protocol::parse_indices)
            .await
    }

    pub async fn get_selected(&mut self) -> WireResult<Vec<VertexIndex>> {
        self.query(Command::GetSelected, protocol::parse_indices)
            .await
    }

    pub async fn is_sink(&mut self, index: VertexIndex) -> WireResult<bool> {
        self.query(Command::IsSink(index), protocol::parse_bool)
            .await
    }
}

/// The wire grammar has no spelling for NaN or infinity
fn check_finite(positions: &[Position]) -> WireResult<()> {
    match positions.iter().find(|p| !p.is_finite()) {
        Some(p) => Err(WireError::InvalidArgument(format!(
            "non-finite vertex position {}",
            p
        ))),
        None => Ok(()),
    }
}

/// Apply the optional deadline and cancellation token to one step
async fn guarded<R>(
    deadline: Option<Duration>,
    cancellation: Option<&CancellationToken>,
    step: impl Future<Output = WireResult<R>>,
) -> WireResult<R> {
    let timed = async {
        match deadline {
            Some(limit) => tokio::time::timeout(limit, step)
                .await
                .map_err(|_| WireError::Timeout)?,
            None => step.await,
        }
    };

    match cancellation {
        Some(token) => tokio::select! {
            _ = token.cancelled() => Err(WireError::Cancelled),
            result = timed => result,
        },
        None => timed.await,
    }
}
