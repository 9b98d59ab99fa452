//! Error types for message passing.

use crate::adjacency::AdjacencyFormat;
use crate::layer::Hook;
use passage_inspect::InspectError;
use thiserror::Error;

/// Errors raised while configuring an engine or propagating messages.
///
/// Every error is structural and surfaces at the point of detection; a
/// failed call returns no partial result.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid construction-time configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The adjacency matches none of the recognized formats.
    #[error(
        "invalid adjacency ({0}); supported are (1) edge indices as an I64 tensor of shape [2, num_edges], (2) a SparseTensor, or (3) a dense rank-2 tensor"
    )]
    InvalidAdjacency(String),

    /// No combination of implemented hooks and configuration handles the format.
    #[error("could not detect a valid message passing implementation for {format} adjacency")]
    UnresolvedStrategy {
        /// The classified adjacency format.
        format: AdjacencyFormat,
    },

    /// Reverse flow was requested for a matrix adjacency.
    #[error(
        "flow direction target_to_source is invalid for {format} adjacency; pass the transposed matrix and use source_to_target"
    )]
    InvalidFlow {
        /// The classified adjacency format.
        format: AdjacencyFormat,
    },

    /// Explain mode is active but the sparse strategy cannot be used.
    #[error("explain mode supports only the sparse strategy: {reason}")]
    ExplainUnsupported {
        /// Why the sparse strategy is unavailable.
        reason: &'static str,
    },

    /// Frame building or frame access failed.
    #[error(transparent)]
    Inspect(#[from] InspectError),

    /// A tensor disagrees with a size already known for its side of the graph.
    #[error("size mismatch for '{name}': expected {expected} along the node dimension, got {got}")]
    SizeMismatch {
        /// The value whose size disagreed.
        name: String,
        /// The size already known.
        expected: usize,
        /// The size found.
        got: usize,
    },

    /// The engine called a hook the layer does not implement.
    #[error("hook '{0}' is not implemented by this layer")]
    HookNotImplemented(Hook),

    /// A sparse matrix was built from inconsistent parts.
    #[error("invalid sparse matrix: {0}")]
    InvalidSparse(String),

    /// The partial strategy was given a matrix without any stored entry.
    #[error("the partial strategy needs at least one stored adjacency entry")]
    EmptyAdjacency,

    /// An error from the tensor backend.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}

impl EngineError {
    /// Creates a [`Config`](Self::Config) error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an [`InvalidAdjacency`](Self::InvalidAdjacency) error.
    pub fn invalid_adjacency(msg: impl Into<String>) -> Self {
        Self::InvalidAdjacency(msg.into())
    }

    /// Creates an [`InvalidSparse`](Self::InvalidSparse) error.
    pub fn invalid_sparse(msg: impl Into<String>) -> Self {
        Self::InvalidSparse(msg.into())
    }

    /// Returns the parameter name if a hook frame was missing a required argument.
    #[must_use]
    pub fn missing_argument(&self) -> Option<&str> {
        match self {
            Self::Inspect(err) => err.missing_param(),
            _ => None,
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = core::result::Result<T, EngineError>;
