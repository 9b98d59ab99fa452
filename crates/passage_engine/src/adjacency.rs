//! Physical adjacency formats and classification.

use core::fmt;

use candle_core::{DType, Tensor};
use passage_inspect::Value;

use crate::error::{EngineError, Result};
use crate::sparse::SparseTensor;

/// Physical encoding of a graph adjacency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdjacencyFormat {
    /// An `I64` tensor of shape `[2, num_edges]`.
    EdgeList,
    /// A [`SparseTensor`] in row-compressed form.
    SparseMatrix,
    /// Any other rank-2 tensor.
    DenseMatrix,
}

impl AdjacencyFormat {
    /// Number of formats.
    pub const COUNT: usize = 3;

    /// All formats, in cache-slot order.
    pub const ALL: [AdjacencyFormat; Self::COUNT] =
        [Self::EdgeList, Self::SparseMatrix, Self::DenseMatrix];

    /// Returns the string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EdgeList => "edge_list",
            Self::SparseMatrix => "sparse_matrix",
            Self::DenseMatrix => "dense_matrix",
        }
    }

    /// Returns `true` for the two matrix formats.
    #[must_use]
    pub fn is_matrix(self) -> bool {
        matches!(self, Self::SparseMatrix | Self::DenseMatrix)
    }

    pub(crate) fn slot(self) -> usize {
        match self {
            Self::EdgeList => 0,
            Self::SparseMatrix => 1,
            Self::DenseMatrix => 2,
        }
    }
}

impl fmt::Display for AdjacencyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies an adjacency value without copying it.
///
/// - edge list: a rank-2 `I64` tensor with exactly two rows
/// - sparse matrix: a [`SparseTensor`]
/// - dense matrix: any other rank-2 tensor
///
/// # Errors
///
/// Returns [`EngineError::InvalidAdjacency`] for anything else.
pub fn classify(adjacency: &Value) -> Result<AdjacencyFormat> {
    if adjacency.is::<SparseTensor>() {
        return Ok(AdjacencyFormat::SparseMatrix);
    }

    let Some(tensor) = adjacency.downcast_ref::<Tensor>() else {
        return Err(EngineError::invalid_adjacency(format!(
            "got a value of type {}",
            adjacency.type_name()
        )));
    };

    match tensor.dims() {
        [2, _] if tensor.dtype() == DType::I64 => Ok(AdjacencyFormat::EdgeList),
        [_, _] => Ok(AdjacencyFormat::DenseMatrix),
        dims => Err(EngineError::invalid_adjacency(format!(
            "got a tensor of shape {dims:?}"
        ))),
    }
}
