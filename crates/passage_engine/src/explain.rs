//! Edge masking for explanation runs.

use candle_core::Tensor;

use crate::error::{EngineError, Result};

/// Explain context for one `propagate` call.
///
/// Passing an `Explain` forces the sparse strategy. When it carries an
/// `edge_mask` (one logit per edge), every message is scaled by
/// `sigmoid(edge_mask)` before aggregation. The mask is also available to
/// hooks under the reserved name `edge_mask`.
#[derive(Debug, Clone, Default)]
pub struct Explain {
    /// Per-edge mask logits.
    pub edge_mask: Option<Tensor>,
}

impl Explain {
    /// Creates an explain context with a mask.
    #[must_use]
    pub fn with_mask(edge_mask: Tensor) -> Self {
        Self {
            edge_mask: Some(edge_mask),
        }
    }

    /// Scales `messages` by `sigmoid(edge_mask)` along `node_axis`.
    ///
    /// Returns `messages` unchanged when no mask is set.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SizeMismatch`] if the mask does not hold one
    /// entry per message.
    pub(crate) fn apply(&self, messages: Tensor, node_axis: usize) -> Result<Tensor> {
        let Some(mask) = &self.edge_mask else {
            return Ok(messages);
        };

        let edges = messages.dim(node_axis)?;
        if mask.elem_count() != edges {
            return Err(EngineError::SizeMismatch {
                name: "edge_mask".to_string(),
                expected: edges,
                got: mask.elem_count(),
            });
        }

        let mut shape = vec![1_usize; messages.rank()];
        shape[node_axis] = edges;
        let weights = sigmoid(&mask.to_dtype(messages.dtype())?)?.reshape(shape)?;
        Ok(messages.broadcast_mul(&weights)?)
    }
}

fn sigmoid(x: &Tensor) -> Result<Tensor> {
    Ok(x.neg()?.exp()?.affine(1.0, 1.0)?.recip()?)
}
