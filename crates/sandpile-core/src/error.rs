//! Error types for label translation

use thiserror::Error;

/// Errors raised by the label directory
///
/// These indicate a programming error on the caller's side (a stale or
/// foreign label, an index from a different graph) and are not recoverable
/// by retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("Unknown vertex label: {0}")]
    UnknownLabel(String),

    #[error("Vertex index {index} out of range (directory holds {len} vertices)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Vertex label already registered: {0}")]
    DuplicateLabel(String),

    #[error("Edge targets the sink but no sink vertex is registered")]
    NoSinkVertex,

    #[error("Label for non-sink vertex {index} collides with the sink label")]
    ReservedLabel { index: usize },
}

/// Result type alias for directory operations
pub type DirectoryResult<T> = Result<T, DirectoryError>;
