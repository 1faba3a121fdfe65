//! Label-space session
//!
//! [`GraphSession`] composes a [`WireClient`] with a [`LabelDirectory`]:
//! every request is translated from labels to server indices before it is
//! sent, and every reply is translated back. The directory only changes
//! after the server has acknowledged the mutation it mirrors.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use sandpile_core::{
    Configuration, DirectoryError, GraphSnapshot, GraphSource, IndexLabel, LabelDirectory,
    LabelledEdge, LabelledVertex, Layout, Position, Sand, VertexIndex, VertexLabel, WeightedEdge,
};
use sandpile_wire::{
    CancellationToken, ConfigName, LineTransport, SpecialConfig, TcpLineTransport, WireClient,
    WireError, WireResult,
};

use crate::config::SessionConfig;
use crate::error::SessionResult;

/// One open connection to the simulator, addressed in label space
pub struct GraphSession<L: VertexLabel, T: LineTransport = TcpLineTransport> {
    client: WireClient<T>,
    directory: LabelDirectory<L>,
    layout: Layout,
    endpoint: Option<(String, u16)>,
}

impl<L: VertexLabel> GraphSession<L, TcpLineTransport> {
    /// Connect over TCP using `config`
    ///
    /// `sink` is the label that will stand for every server sink.
    #[instrument(skip(config, sink), fields(host = %config.host, port = config.port))]
    pub async fn connect(config: &SessionConfig, sink: L) -> SessionResult<Self> {
        let client = WireClient::connect(&config.host, config.port)
            .await?
            .with_auto_repaint(config.auto_repaint)
            .with_deadline(config.deadline());
        info!("Session connected");
        Ok(Self::new(client, sink).with_layout(config.layout))
    }

    /// Replace the connection after a desynchronizing timeout or cancellation
    ///
    /// Dials the endpoint of the original connection. Auto-repaint, the
    /// deadline, the cancellation token and the label directory carry over.
    /// If the abandoned command changed the vertex set, re-import or
    /// re-export the graph to resynchronize the directory.
    pub async fn reconnect(&mut self) -> SessionResult<()> {
        let (host, port) = self.endpoint.clone().ok_or(WireError::NotConnected)?;
        if self.client.is_connected() {
            // The old stream may be broken; a failed shutdown is irrelevant
            if let Err(e) = self.client.close().await {
                debug!(error = %e, "Ignoring close failure during reconnect");
            }
        }
        let mut client = WireClient::connect(&host, port).await?;
        client.set_auto_repaint(self.client.auto_repaint());
        client.set_deadline(self.client.deadline());
        client.set_cancellation(self.client.cancellation().cloned());
        self.client = client;
        warn!(host = %host, port, "Session reconnected; label directory retained");
        Ok(())
    }
}

impl<L: VertexLabel, T: LineTransport> GraphSession<L, T> {
    /// Wrap an existing client with an empty directory
    ///
    /// The client's endpoint, if its transport has one, is remembered for
    /// [`reconnect`](GraphSession::reconnect).
    pub fn new(client: WireClient<T>, sink: L) -> Self {
        let endpoint = client.endpoint();
        Self {
            client,
            directory: LabelDirectory::new(sink),
            layout: Layout::default(),
            endpoint,
        }
    }

    /// Set the transform applied to positions on import and `add_vertex`
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn directory(&self) -> &LabelDirectory<L> {
        &self.directory
    }

    pub fn client(&self) -> &WireClient<T> {
        &self.client
    }

    pub fn sink_label(&self) -> &L {
        self.directory.sink_label()
    }

    pub fn auto_repaint(&self) -> bool {
        self.client.auto_repaint()
    }

    pub fn set_auto_repaint(&mut self, enabled: bool) {
        self.client.set_auto_repaint(enabled);
    }

    /// Bound every exchange by a local deadline
    ///
    /// On expiry the session becomes unusable until reconnected.
    pub fn set_deadline(&mut self, deadline: Option<Duration>) {
        self.client.set_deadline(deadline);
    }

    /// Let another task abandon a pending exchange
    pub fn set_cancellation(&mut self, token: Option<CancellationToken>) {
        self.client.set_cancellation(token);
    }

    /// Close the connection; later operations fail
    pub async fn close(&mut self) -> SessionResult<()> {
        self.client.close().await?;
        info!("Session closed");
        Ok(())
    }

    // ========================================================================
    // Simulation control
    // ========================================================================

    pub async fn repaint(&mut self) -> SessionResult<()> {
        Ok(self.client.repaint().await?)
    }

    /// Fire all unstable vertices once
    pub async fn update(&mut self) -> SessionResult<()> {
        Ok(self.client.update().await?)
    }

    /// Fire until stable
    ///
    /// Without a reachable sink the simulator never answers; set a deadline
    /// or cancellation token if that is a possibility.
    pub async fn stabilize(&mut self) -> SessionResult<()> {
        Ok(self.client.stabilize().await?)
    }

    pub async fn clear_sand(&mut self) -> SessionResult<()> {
        Ok(self.client.clear_sand().await?)
    }

    /// Scatter `amount` grains over non-sink vertices (negative is a no-op)
    pub async fn add_random_sand(&mut self, amount: Sand) -> SessionResult<()> {
        Ok(self.client.add_random_sand(amount).await?)
    }

    /// Delete every vertex and edge; the directory is reset once the server
    /// acknowledges, even if the repaint after it fails
    pub async fn delete_graph(&mut self) -> SessionResult<()> {
        let result = self.client.delete_graph().await;
        if acknowledged(&result) {
            self.directory.reset();
        }
        Ok(result?)
    }

    // ========================================================================
    // Whole-graph import / export
    // ========================================================================

    /// Replace the simulator's graph with `source`, using the session layout
    pub async fn import_graph(&mut self, source: &impl GraphSource<L>) -> SessionResult<()> {
        let layout = self.layout;
        self.import_graph_with_layout(source, layout).await
    }

    /// Replace the simulator's graph with `source`
    ///
    /// Vertices receive indices `0..N` in source order. Sink-sourced edges
    /// are skipped and sink-destined edges go to the lowest sink index.
    /// Everything is validated before the first command is sent; redraw is
    /// deferred to a single repaint at the end.
    #[instrument(skip_all)]
    pub async fn import_graph_with_layout(
        &mut self,
        source: &impl GraphSource<L>,
        layout: Layout,
    ) -> SessionResult<()> {
        let vertices = source.vertices();
        let edges = source.edges();

        let mut staged = LabelDirectory::new(self.directory.sink_label().clone());
        let mut positions = Vec::with_capacity(vertices.len());
        for vertex in &vertices {
            staged.register(vertex.label.clone())?;
            let position = layout.apply(vertex.position);
            if !position.is_finite() {
                return Err(WireError::InvalidArgument(format!(
                    "non-finite position {} for {}",
                    position,
                    vertex.label.describe()
                ))
                .into());
            }
            positions.push(position);
        }

        let mut encoded = Vec::with_capacity(edges.len());
        for edge in &edges {
            match staged.encode_edge(edge)? {
                Some(wire_edge) => encoded.push(wire_edge),
                None => debug!(edge = ?edge, "Skipping sink-sourced edge"),
            }
        }

        let repaint = self.client.auto_repaint();
        self.client.set_auto_repaint(false);
        let result = self.replace_graph(staged, &positions, &encoded).await;
        self.client.set_auto_repaint(repaint);
        result?;

        if repaint {
            self.client.repaint().await?;
        }

        info!(
            vertices = positions.len(),
            edges = encoded.len(),
            sinks = self.directory.sink_count(),
            "Imported graph"
        );
        Ok(())
    }

    async fn replace_graph(
        &mut self,
        staged: LabelDirectory<L>,
        positions: &[Position],
        edges: &[WeightedEdge],
    ) -> SessionResult<()> {
        self.client.delete_graph().await?;
        self.directory.reset();
        self.client.add_vertices(positions).await?;
        self.directory = staged;
        self.client.add_edges(edges).await?;
        Ok(())
    }

    /// Read the simulator's graph, labelling each non-sink vertex by index
    pub async fn export_graph(&mut self) -> SessionResult<GraphSnapshot<L>>
    where
        L: IndexLabel,
    {
        self.export_graph_with(L::from_index).await
    }

    /// Read the simulator's graph, labelling each non-sink vertex with
    /// `naming(index)`
    ///
    /// The directory is rebuilt from what the server reports; every sink
    /// index folds into the sink label.
    #[instrument(skip_all)]
    pub async fn export_graph_with(
        &mut self,
        naming: impl FnMut(VertexIndex) -> L,
    ) -> SessionResult<GraphSnapshot<L>> {
        let positions = self.client.get_vertices().await?;
        let sinks: HashSet<VertexIndex> = self.client.get_sinks().await?.into_iter().collect();
        let edges = self.client.get_edges().await?;

        let directory = LabelDirectory::observed(
            self.directory.sink_label().clone(),
            positions.len(),
            &sinks,
            naming,
        )?;
        let (vertices, sink_positions) = directory.split_positions(&positions)?;
        let edges = directory.fold_edges(&edges)?;
        self.directory = directory;

        info!(
            vertices = vertices.len(),
            sinks = sink_positions.len(),
            edges = edges.len(),
            "Exported graph"
        );

        Ok(GraphSnapshot {
            sink: self.directory.sink_label().clone(),
            vertices,
            sinks: sink_positions,
            edges,
        })
    }

    // ========================================================================
    // Vertices and edges
    // ========================================================================

    /// Add one vertex; `label` receives the next server index
    pub async fn add_vertex(&mut self, label: L, position: impl Into<Position>) -> SessionResult<()> {
        if self.directory.contains(&label) {
            return Err(DirectoryError::DuplicateLabel(label.describe()).into());
        }
        let position = self.layout.apply(position.into());
        let result = self.client.add_vertex(position).await;
        if acknowledged(&result) {
            self.directory.register(label)?;
        }
        Ok(result?)
    }

    /// Add (accumulate) one edge
    ///
    /// A sink-sourced edge is skipped. A sink-destined edge goes to the
    /// lowest sink index.
    pub async fn add_edge(&mut self, source: L, target: L, weight: i64) -> SessionResult<()> {
        let edge = LabelledEdge::new(source, target, weight);
        match self.directory.encode_edge(&edge)? {
            Some(wire_edge) => Ok(self.client.add_edge(wire_edge).await?),
            None => {
                debug!(edge = ?edge, "Skipping sink-sourced edge");
                Ok(())
            }
        }
    }

    /// Positions of all non-sink vertices
    pub async fn get_vertices(&mut self) -> SessionResult<Vec<LabelledVertex<L>>> {
        let positions = self.client.get_vertices().await?;
        let (vertices, _) = self.directory.split_positions(&positions)?;
        Ok(vertices)
    }

    pub async fn get_vertex(&mut self, label: &L) -> SessionResult<Position> {
        let index = self.directory.to_index(label)?;
        Ok(self.client.get_vertex(index).await?)
    }

    /// All edges, with sink-destined edges folded into the sink label
    pub async fn get_edges(&mut self) -> SessionResult<Vec<LabelledEdge<L>>> {
        let edges = self.client.get_edges().await?;
        Ok(self.directory.fold_edges(&edges)?)
    }

    // ========================================================================
    // Scalars
    // ========================================================================

    pub async fn get_sand(&mut self, label: &L) -> SessionResult<Sand> {
        let index = self.directory.to_index(label)?;
        Ok(self.client.get_sand(index).await?)
    }

    pub async fn set_sand(&mut self, label: &L, amount: Sand) -> SessionResult<()> {
        let index = self.directory.to_index(label)?;
        Ok(self.client.set_sand(index, amount).await?)
    }

    /// Add (or, if negative, remove) sand; a vertex may go into debt
    pub async fn add_sand(&mut self, label: &L, amount: Sand) -> SessionResult<()> {
        let index = self.directory.to_index(label)?;
        Ok(self.client.add_sand(index, amount).await?)
    }

    pub async fn is_sink(&mut self, label: &L) -> SessionResult<bool> {
        let index = self.directory.to_index(label)?;
        Ok(self.client.is_sink(index).await?)
    }

    // ========================================================================
    // Configurations
    // ========================================================================

    /// The current configuration, without the sink
    pub async fn get_config(&mut self) -> SessionResult<Configuration<L>> {
        let config = self.client.get_config().await?;
        Ok(self.directory.labelled_config(&config)?)
    }

    /// Set the configuration; unmentioned vertices get zero
    pub async fn set_config(&mut self, config: &Configuration<L>) -> SessionResult<()> {
        let dense = self.directory.indexed_config(config)?;
        Ok(self.client.set_config(&dense).await?)
    }

    /// Add a configuration to the current one
    pub async fn add_config(&mut self, config: &Configuration<L>) -> SessionResult<()> {
        let dense = self.directory.indexed_config(config)?;
        Ok(self.client.add_config(&dense).await?)
    }

    /// A configuration stored in the simulator's config manager
    pub async fn get_config_named(&mut self, name: &ConfigName) -> SessionResult<Configuration<L>> {
        let config = self.client.get_config_named(name).await?;
        Ok(self.directory.labelled_config(&config)?)
    }

    async fn set_to(&mut self, kind: SpecialConfig) -> SessionResult<()> {
        Ok(self.client.set_to(kind).await?)
    }

    async fn add_special(&mut self, kind: SpecialConfig) -> SessionResult<()> {
        Ok(self.client.add_special(kind).await?)
    }

    async fn get_special(&mut self, kind: SpecialConfig) -> SessionResult<Configuration<L>> {
        let config = self.client.get_special(kind).await?;
        Ok(self.directory.labelled_config(&config)?)
    }

    pub async fn set_to_max_stable(&mut self) -> SessionResult<()> {
        self.set_to(SpecialConfig::MaxStable).await
    }

    pub async fn add_max_stable(&mut self) -> SessionResult<()> {
        self.add_special(SpecialConfig::MaxStable).await
    }

    pub async fn get_max_stable(&mut self) -> SessionResult<Configuration<L>> {
        self.get_special(SpecialConfig::MaxStable).await
    }

    /// Set the configuration to the identity
    ///
    /// The simulator caches the identity per graph; the first call after a
    /// graph change can take a long time on big graphs.
    pub async fn set_to_identity(&mut self) -> SessionResult<()> {
        self.set_to(SpecialConfig::Identity).await
    }

    pub async fn add_identity(&mut self) -> SessionResult<()> {
        self.add_special(SpecialConfig::Identity).await
    }

    pub async fn get_identity(&mut self) -> SessionResult<Configuration<L>> {
        self.get_special(SpecialConfig::Identity).await
    }

    /// Set the configuration to the minimal burning configuration
    pub async fn set_to_burning(&mut self) -> SessionResult<()> {
        self.set_to(SpecialConfig::Burning).await
    }

    pub async fn add_burning(&mut self) -> SessionResult<()> {
        self.add_special(SpecialConfig::Burning).await
    }

    pub async fn get_burning(&mut self) -> SessionResult<Configuration<L>> {
        self.get_special(SpecialConfig::Burning).await
    }

    pub async fn set_to_dual(&mut self) -> SessionResult<()> {
        self.set_to(SpecialConfig::Dual).await
    }

    pub async fn add_dual(&mut self) -> SessionResult<()> {
        self.add_special(SpecialConfig::Dual).await
    }

    pub async fn get_dual(&mut self) -> SessionResult<Configuration<L>> {
        self.get_special(SpecialConfig::Dual).await
    }

    // ========================================================================
    // Vertex sets
    // ========================================================================

    /// Unstable vertices; never contains the sink
    pub async fn get_unstables(&mut self) -> SessionResult<Vec<L>> {
        let indices = self.client.get_unstables().await?;
        Ok(self.directory.labels_for(&indices)?)
    }

    /// Number of unstable vertices, as counted by the simulator
    pub async fn get_num_unstables(&mut self) -> SessionResult<usize> {
        Ok(self.client.get_num_unstables().await?)
    }

    /// The sink label if the graph has any sink vertex, otherwise nothing
    pub async fn get_sinks(&mut self) -> SessionResult<Vec<L>> {
        let indices = self.client.get_sinks().await?;
        Ok(self.directory.sink_labels_for(&indices)?)
    }

    pub async fn get_nonsinks(&mut self) -> SessionResult<Vec<L>> {
        let indices = self.client.get_nonsinks().await?;
        Ok(self.directory.labels_for(&indices)?)
    }

    /// Vertices currently selected in the simulator's UI
    pub async fn get_selected(&mut self) -> SessionResult<Vec<L>> {
        let indices = self.client.get_selected().await?;
        Ok(self.directory.labels_for(&indices)?)
    }
}

/// The server applied the mutation, whether or not the repaint after it
/// succeeded
fn acknowledged(result: &WireResult<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => e.command_applied(),
    }
}
