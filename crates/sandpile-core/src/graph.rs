//! Label-space graph values and the import interface
//!
//! A graph crosses the client boundary in label space: vertices are
//! `(label, position)` pairs in the order the server should number them,
//! edges are `(source label, target label, weight)` triples. Any richer
//! graph type in a calling application adapts to [`GraphSource`] rather
//! than this crate depending on it.

use serde::{Deserialize, Serialize};

use crate::label::VertexLabel;
use crate::types::Position;

/// A vertex in label space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelledVertex<L> {
    pub label: L,
    pub position: Position,
}

impl<L> LabelledVertex<L> {
    pub fn new(label: L, position: impl Into<Position>) -> Self {
        Self {
            label,
            position: position.into(),
        }
    }
}

/// A directed, weighted edge in label space
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelledEdge<L> {
    pub source: L,
    pub target: L,
    pub weight: i64,
}

impl<L> LabelledEdge<L> {
    pub fn new(source: L, target: L, weight: i64) -> Self {
        Self {
            source,
            target,
            weight,
        }
    }
}

/// Narrow import interface for anything graph-like
///
/// Vertex order matters: the server assigns indices `0..N` in exactly the
/// order [`GraphSource::vertices`] yields them.
pub trait GraphSource<L: VertexLabel> {
    /// Ordered vertex enumeration
    fn vertices(&self) -> Vec<LabelledVertex<L>>;

    /// Edge enumeration
    fn edges(&self) -> Vec<LabelledEdge<L>>;
}

/// A plain owned graph in label space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelledGraph<L> {
    pub vertices: Vec<LabelledVertex<L>>,
    pub edges: Vec<LabelledEdge<L>>,
}

impl<L> Default for LabelledGraph<L> {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
            edges: Vec::new(),
        }
    }
}

impl<L> LabelledGraph<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a vertex; it will receive the next server index on import
    pub fn with_vertex(mut self, label: L, position: impl Into<Position>) -> Self {
        self.vertices.push(LabelledVertex::new(label, position));
        self
    }

    /// Append a directed edge
    pub fn with_edge(mut self, source: L, target: L, weight: i64) -> Self {
        self.edges.push(LabelledEdge::new(source, target, weight));
        self
    }
}

impl<L: VertexLabel> GraphSource<L> for LabelledGraph<L> {
    fn vertices(&self) -> Vec<LabelledVertex<L>> {
        self.vertices.clone()
    }

    fn edges(&self) -> Vec<LabelledEdge<L>> {
        self.edges.clone()
    }
}

/// The server graph exported into label space
///
/// `vertices` holds only non-sink vertices. Every server sink is folded into
/// the single `sink` label; their positions are kept in `sinks` in index
/// order, and sink-destined edges are merged per source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot<L> {
    pub sink: L,
    pub vertices: Vec<LabelledVertex<L>>,
    pub sinks: Vec<Position>,
    pub edges: Vec<LabelledEdge<L>>,
}

impl<L: VertexLabel> GraphSource<L> for GraphSnapshot<L> {
    /// Non-sink vertices followed by one sink vertex at the first sink
    /// position, when the exported graph had any sinks
    fn vertices(&self) -> Vec<LabelledVertex<L>> {
        let mut vertices = self.vertices.clone();
        if let Some(position) = self.sinks.first() {
            vertices.push(LabelledVertex::new(self.sink.clone(), *position));
        }
        vertices
    }

    fn edges(&self) -> Vec<LabelledEdge<L>> {
        self.edges.clone()
    }
}

/// Affine transform applied to positions before they are sent to the server
///
/// The default is the identity, so positions reach the server unchanged.
/// Graphs drawn in unit coordinates usually want a larger scale, such as
/// `Layout::new(10.0, 0.0, 0.0)`, to spread out on the simulator's canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

impl Layout {
    pub fn new(scale: f64, offset_x: f64, offset_y: f64) -> Self {
        Self {
            scale,
            offset_x,
            offset_y,
        }
    }

    pub fn apply(&self, position: Position) -> Position {
        Position::new(
            self.scale * position.x + self.offset_x,
            self.scale * position.y + self.offset_y,
        )
    }
}
