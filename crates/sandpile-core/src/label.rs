//! Vertex label abstractions
//!
//! This module provides the [`VertexLabel`] trait that abstracts over the
//! identifiers callers use for vertices:
//!
//! - Plain integers (the default labelling of a freshly observed graph)
//! - Strings or any other hashable value chosen by the caller

use std::fmt::Debug;
use std::hash::Hash;

use crate::types::VertexIndex;

/// Trait for vertex label abstraction
///
/// Anything that is cloneable, hashable and comparable for equality can
/// label a vertex. Implemented automatically for every such type.
pub trait VertexLabel: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    /// Short display form used in errors and logs
    fn describe(&self) -> String {
        format!("{:?}", self)
    }
}

impl<T> VertexLabel for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Labels that can be derived directly from a server index
///
/// Used when exporting a graph the caller never imported: every non-sink
/// vertex is labelled with its own index.
pub trait IndexLabel: VertexLabel {
    fn from_index(index: VertexIndex) -> Self;
}

macro_rules! index_label_for_int {
    ($($ty:ty),*) => {
        $(
            impl IndexLabel for $ty {
                fn from_index(index: VertexIndex) -> Self {
                    index as $ty
                }
            }
        )*
    };
}

index_label_for_int!(usize, u32, u64, i32, i64);

impl IndexLabel for String {
    fn from_index(index: VertexIndex) -> Self {
        index.to_string()
    }
}
