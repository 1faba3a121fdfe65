//! Index-space values exchanged with the simulator

use std::fmt;

use serde::{Deserialize, Serialize};

/// Dense, zero-based vertex index assigned by the server in creation order
pub type VertexIndex = usize;

/// Signed sand count; negative values are vertex debt
pub type Sand = i64;

/// A 2D vertex position in simulator coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Neither coordinate is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Position {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// A directed, weighted edge between two server indices
///
/// Adding an edge to an already connected ordered pair accumulates into the
/// existing weight on the server; a weight that drops to zero or below
/// removes the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeightedEdge {
    pub source: VertexIndex,
    pub target: VertexIndex,
    pub weight: i64,
}

impl WeightedEdge {
    pub fn new(source: VertexIndex, target: VertexIndex, weight: i64) -> Self {
        Self {
            source,
            target,
            weight,
        }
    }
}

impl fmt::Display for WeightedEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.source, self.target, self.weight)
    }
}
