//! In-memory simulator implementation for testing
//!
//! Provides a [`LineTransport`] that parses commands and answers them the
//! way the real simulator does, so client and session logic can be tested
//! without a socket.
//!
//! ## Model
//!
//! - Edges accumulate per ordered pair; a weight at or below zero removes
//!   the edge
//! - A sink is a vertex without outgoing edges
//! - A non-sink vertex is unstable when its sand reaches its out-degree
//!   (sum of outgoing weights)
//! - Sinks absorb whatever reaches them
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sandpile_wire::{MockSandpileServer, WireClient};
//!
//! let server = MockSandpileServer::new();
//! let handle = server.handle();
//! let mut client = WireClient::new(server);
//!
//! client.add_vertices(&positions).await?;
//! assert_eq!(handle.received()[0], "add_vertices 0,0 1,0");
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use sandpile_core::{Position, Sand, VertexIndex, WeightedEdge};

use crate::error::{WireError, WireResult};
use crate::protocol::{self, ACK};
use crate::transport::LineTransport;

/// Maximum firing rounds before the mock gives up on `stabilize`
const MAX_ROUNDS: usize = 100_000;

/// Simulator state shared between the transport and its handles
#[derive(Debug, Default)]
struct MockState {
    positions: Vec<Position>,
    edges: Vec<WeightedEdge>,
    sand: Vec<Sand>,
    selected: Vec<VertexIndex>,
    named: HashMap<String, Vec<Sand>>,
    received: Vec<String>,
    scripted: VecDeque<String>,
    rejected: HashMap<String, String>,
    hang_next: bool,
    random_cursor: usize,
}

/// Reply to an incoming command
enum Pending {
    Line(String),
    Hang,
}

/// A simulator living in memory behind the [`LineTransport`] interface
pub struct MockSandpileServer {
    state: Arc<Mutex<MockState>>,
    replies: VecDeque<Pending>,
}

/// Inspection and fault-injection handle for a [`MockSandpileServer`]
#[derive(Clone)]
pub struct MockServerHandle {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockSandpileServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSandpileServer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            replies: VecDeque::new(),
        }
    }

    /// A handle that stays valid after the server is moved into a client
    pub fn handle(&self) -> MockServerHandle {
        MockServerHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl MockServerHandle {
    /// A new transport on the same simulator state, as a second connection
    /// would see it
    pub fn attach(&self) -> MockSandpileServer {
        MockSandpileServer {
            state: Arc::clone(&self.state),
            replies: VecDeque::new(),
        }
    }

    /// Every command line received so far, in order
    pub fn received(&self) -> Vec<String> {
        self.state.lock().received.clone()
    }

    /// Forget the received-command log
    pub fn clear_received(&self) {
        self.state.lock().received.clear();
    }

    /// Answer the next unscripted command with `reply` without processing it
    ///
    /// Calls queue up: each scripted reply is used once, in order.
    pub fn reply_next(&self, reply: impl Into<String>) {
        self.state.lock().scripted.push_back(reply.into());
    }

    /// Reject the next command with the given error text
    pub fn fail_next(&self, reply: impl Into<String>) {
        self.reply_next(reply);
    }

    /// Answer every command named `name` with `reply` until
    /// [`accept_command`](Self::accept_command) is called
    pub fn reject_command(&self, name: impl Into<String>, reply: impl Into<String>) {
        self.state.lock().rejected.insert(name.into(), reply.into());
    }

    pub fn accept_command(&self, name: &str) {
        self.state.lock().rejected.remove(name);
    }

    /// Never answer the next command
    pub fn hang_next(&self) {
        self.state.lock().hang_next = true;
    }

    /// Mark vertices as selected in the simulator's UI
    pub fn select(&self, indices: &[VertexIndex]) {
        self.state.lock().selected = indices.to_vec();
    }

    /// Store a configuration under `name`
    pub fn store_config(&self, name: impl Into<String>, config: Vec<Sand>) {
        self.state.lock().named.insert(name.into(), config);
    }

    pub fn vertex_count(&self) -> usize {
        self.state.lock().positions.len()
    }

    pub fn edges(&self) -> Vec<WeightedEdge> {
        self.state.lock().edges.clone()
    }

    pub fn sand(&self) -> Vec<Sand> {
        self.state.lock().sand.clone()
    }
}

#[async_trait]
impl LineTransport for MockSandpileServer {
    async fn send_line(&mut self, line: &str) -> WireResult<()> {
        let mut state = self.state.lock();
        state.received.push(line.to_string());

        let pending = if state.hang_next {
            state.hang_next = false;
            Pending::Hang
        } else if let Some(reply) = state.scripted.pop_front() {
            Pending::Line(reply)
        } else if let Some(reply) = line
            .split(' ')
            .next()
            .and_then(|name| state.rejected.get(name).cloned())
        {
            Pending::Line(reply)
        } else {
            Pending::Line(state.handle(line))
        };
        drop(state);

        self.replies.push_back(pending);
        Ok(())
    }

    async fn recv_line(&mut self) -> WireResult<String> {
        match self.replies.pop_front() {
            Some(Pending::Line(reply)) => {
                trace!(reply = %reply, "Mock reply");
                Ok(reply)
            }
            Some(Pending::Hang) => std::future::pending().await,
            None => Err(WireError::Connection(
                "no reply pending on mock server".to_string(),
            )),
        }
    }

    fn peer(&self) -> String {
        "mock-sandpile".to_string()
    }
}

fn error(message: impl std::fmt::Display) -> String {
    format!("Error: {}", message)
}

fn join<T: ToString>(values: impl IntoIterator<Item = T>, separator: &str) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

impl MockState {
    fn handle(&mut self, line: &str) -> String {
        let (name, args) = match line.split_once(' ') {
            Some((name, args)) => (name, args),
            None => (line, ""),
        };
        match self.dispatch(name, args) {
            Ok(reply) => reply,
            Err(message) => error(message),
        }
    }

    fn dispatch(&mut self, name: &str, args: &str) -> Result<String, String> {
        let done = || Ok(ACK.to_string());
        match name {
            "repaint" => done(),
            "update" => {
                self.fire_round();
                done()
            }
            "stabilize" => {
                self.stabilize()?;
                done()
            }
            "delete_graph" => {
                self.positions.clear();
                self.edges.clear();
                self.sand.clear();
                self.selected.clear();
                done()
            }
            "clear_sand" => {
                self.sand.iter_mut().for_each(|s| *s = 0);
                done()
            }
            "get_vertices" => Ok(join(self.positions.iter(), " ")),
            "get_vertex" => {
                let index = self.index_arg(args)?;
                Ok(self.positions[index].to_string())
            }
            "add_vertex" => {
                let (x, y) = args.split_once(' ').ok_or("expected x and y")?;
                let x = x.parse().map_err(|_| "bad x")?;
                let y = y.parse().map_err(|_| "bad y")?;
                self.push_vertex(Position::new(x, y));
                done()
            }
            "add_vertices" => {
                let positions = protocol::parse_positions(args).ok_or("bad vertex list")?;
                positions.into_iter().for_each(|p| self.push_vertex(p));
                done()
            }
            "get_edges" => Ok(join(self.edges.iter(), " ")),
            "add_edge" => {
                let parts: Vec<&str> = args.split(' ').collect();
                let edge = protocol::parse_edge(&parts.join(",")).ok_or("bad edge")?;
                self.accumulate(edge)?;
                done()
            }
            "add_edges" => {
                let edges = protocol::parse_edges(args).ok_or("bad edge list")?;
                for edge in &edges {
                    self.check_index(edge.source)?;
                    self.check_index(edge.target)?;
                }
                for edge in edges {
                    self.accumulate(edge)?;
                }
                done()
            }
            "get_config" if args.is_empty() => Ok(join(self.sand.iter(), ",")),
            "get_config" => match args {
                "identity" => Ok(join(self.special("identity")?, ",")),
                name => self
                    .named
                    .get(name)
                    .map(|config| join(config.iter(), ","))
                    .ok_or_else(|| format!("no configuration named {}", name)),
            },
            "set_config" | "add_config" => {
                let config = protocol::parse_sand_vector(args).ok_or("bad configuration")?;
                if config.len() != self.sand.len() {
                    return Err(format!(
                        "configuration has {} entries, graph has {} vertices",
                        config.len(),
                        self.sand.len()
                    ));
                }
                let add = name == "add_config";
                self.apply(&config, add);
                done()
            }
            "get_sand" => {
                let index = self.index_arg(args)?;
                Ok(self.sand[index].to_string())
            }
            "set_sand" | "add_sand" => {
                let (index, amount) = args.split_once(' ').ok_or("expected vertex and amount")?;
                let index = self.index_arg(index)?;
                let amount: Sand = amount.parse().map_err(|_| "bad amount")?;
                if name == "add_sand" {
                    self.sand[index] += amount;
                } else {
                    self.sand[index] = amount;
                }
                done()
            }
            "add_random_sand" => {
                let amount: Sand = args.parse().map_err(|_| "bad amount")?;
                self.scatter(amount);
                done()
            }
            "get_unstables" => Ok(join(self.unstables(), ",")),
            "get_num_unstables" => Ok(self.unstables().len().to_string()),
            "get_sinks" => Ok(join(self.sinks(), ",")),
            "get_nonsinks" => Ok(join(
                (0..self.positions.len()).filter(|&v| !self.is_sink(v)),
                ",",
            )),
            "get_selected" => Ok(join(self.selected.iter(), ",")),
            "is_sink" => {
                let index = self.index_arg(args)?;
                Ok(self.is_sink(index).to_string())
            }
            _ => {
                if let Some(kind) = name.strip_prefix("set_to_") {
                    let config = self.special(kind)?;
                    self.apply(&config, false);
                    done()
                } else if let Some(kind) = name.strip_prefix("add_to_") {
                    let config = self.special(kind)?;
                    self.apply(&config, true);
                    done()
                } else if let Some(kind) = name.strip_prefix("get_") {
                    Ok(join(self.special(kind)?, ","))
                } else {
                    Err(format!("unknown command {}", name))
                }
            }
        }
    }

    fn push_vertex(&mut self, position: Position) {
        self.positions.push(position);
        self.sand.push(0);
    }

    fn check_index(&self, index: VertexIndex) -> Result<VertexIndex, String> {
        if index < self.positions.len() {
            Ok(index)
        } else {
            Err(format!("vertex {} does not exist", index))
        }
    }

    fn index_arg(&self, arg: &str) -> Result<VertexIndex, String> {
        let index = arg
            .trim()
            .parse()
            .map_err(|_| format!("bad vertex {:?}", arg))?;
        self.check_index(index)
    }

    fn accumulate(&mut self, edge: WeightedEdge) -> Result<(), String> {
        self.check_index(edge.source)?;
        self.check_index(edge.target)?;
        let existing = self
            .edges
            .iter()
            .position(|e| e.source == edge.source && e.target == edge.target);
        match existing {
            Some(position) => {
                self.edges[position].weight += edge.weight;
                if self.edges[position].weight <= 0 {
                    self.edges.remove(position);
                }
            }
            None if edge.weight > 0 => self.edges.push(edge),
            None => {}
        }
        Ok(())
    }

    fn out_degree(&self, vertex: VertexIndex) -> Sand {
        self.edges
            .iter()
            .filter(|e| e.source == vertex)
            .map(|e| e.weight)
            .sum()
    }

    fn is_sink(&self, vertex: VertexIndex) -> bool {
        !self.edges.iter().any(|e| e.source == vertex)
    }

    fn sinks(&self) -> Vec<VertexIndex> {
        (0..self.positions.len()).filter(|&v| self.is_sink(v)).collect()
    }

    fn unstables_of(&self, sand: &[Sand]) -> Vec<VertexIndex> {
        (0..sand.len())
            .filter(|&v| !self.is_sink(v) && sand[v] >= self.out_degree(v))
            .collect()
    }

    fn unstables(&self) -> Vec<VertexIndex> {
        self.unstables_of(&self.sand)
    }

    /// Fire every unstable vertex of `sand` once; returns how many fired
    fn fire(&self, sand: &mut [Sand]) -> usize {
        let unstable = self.unstables_of(sand);
        for &v in &unstable {
            for edge in self.edges.iter().filter(|e| e.source == v) {
                sand[v] -= edge.weight;
                sand[edge.target] += edge.weight;
            }
        }
        for v in 0..sand.len() {
            if self.is_sink(v) {
                sand[v] = 0;
            }
        }
        unstable.len()
    }

    fn fire_round(&mut self) {
        let mut sand = std::mem::take(&mut self.sand);
        self.fire(&mut sand);
        self.sand = sand;
    }

    fn stabilized(&self, mut sand: Vec<Sand>) -> Result<Vec<Sand>, String> {
        for _ in 0..MAX_ROUNDS {
            if self.fire(&mut sand) == 0 {
                return Ok(sand);
            }
        }
        Err("configuration did not stabilize".to_string())
    }

    fn stabilize(&mut self) -> Result<(), String> {
        self.sand = self.stabilized(self.sand.clone())?;
        Ok(())
    }

    fn max_stable(&self) -> Vec<Sand> {
        (0..self.positions.len())
            .map(|v| {
                if self.is_sink(v) {
                    0
                } else {
                    self.out_degree(v) - 1
                }
            })
            .collect()
    }

    fn special(&self, kind: &str) -> Result<Vec<Sand>, String> {
        match kind {
            "max_stable" => Ok(self.max_stable()),
            "identity" => {
                let doubled: Vec<Sand> = self.max_stable().iter().map(|s| 2 * s).collect();
                let reduced = self.stabilized(doubled.clone())?;
                let difference = doubled.iter().zip(&reduced).map(|(a, b)| a - b).collect();
                self.stabilized(difference)
            }
            "burning" => Ok((0..self.positions.len())
                .map(|v| {
                    if self.is_sink(v) {
                        return 0;
                    }
                    let from_nonsinks: Sand = self
                        .edges
                        .iter()
                        .filter(|e| e.target == v && !self.is_sink(e.source))
                        .map(|e| e.weight)
                        .sum();
                    (self.out_degree(v) - from_nonsinks).max(0)
                })
                .collect()),
            "dual" => Ok(self
                .max_stable()
                .iter()
                .zip(&self.sand)
                .map(|(max, sand)| max - sand)
                .collect()),
            other => Err(format!("unknown command get_{}", other)),
        }
    }

    fn apply(&mut self, config: &[Sand], add: bool) {
        for (slot, &amount) in self.sand.iter_mut().zip(config) {
            if add {
                *slot += amount;
            } else {
                *slot = amount;
            }
        }
    }

    fn scatter(&mut self, amount: Sand) {
        let targets: Vec<VertexIndex> = (0..self.positions.len())
            .filter(|&v| !self.is_sink(v))
            .collect();
        if targets.is_empty() || amount <= 0 {
            return;
        }
        for _ in 0..amount {
            let v = targets[self.random_cursor % targets.len()];
            self.sand[v] += 1;
            self.random_cursor += 1;
        }
    }
}
