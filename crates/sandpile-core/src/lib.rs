//! # Sandpile Core
//!
//! Core types, errors, and the label directory shared by the sandpile
//! remote-control client.
//!
//! The external simulator only understands dense, zero-based vertex indices.
//! Callers usually want to talk about vertices by their own identifiers
//! (names, coordinates, ids from another graph library). This crate provides
//! the translation layer between the two.
//!
//! ## Key Types
//!
//! - [`LabelDirectory`]: Sink-aware bijection between caller labels and server indices
//! - [`VertexLabel`]: Any hashable, comparable value usable as a vertex label
//! - [`IndexLabel`]: Labels that can be derived from a bare server index
//! - [`GraphSource`]: Narrow import interface (ordered vertices plus edges)
//! - [`GraphSnapshot`]: Result of exporting the server graph into label space
//! - [`Position`], [`WeightedEdge`]: Index-space wire values

pub mod directory;
pub mod error;
pub mod graph;
pub mod label;
pub mod types;

// Re-export main types
pub use directory::*;
pub use error::*;
pub use graph::*;
pub use label::*;
pub use types::*;
