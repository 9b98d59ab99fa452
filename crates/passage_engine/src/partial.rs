//! Degree buckets for the partial strategy.
//!
//! Rows of a [`SparseTensor`] with at least one stored entry are grouped by
//! degree so that each group can be processed as a dense `B × D` block: `B`
//! rows, each padded to the `D` entries of the widest row in the group. A
//! `neighbor_mask` marks which of the `D` slots are real.

use std::collections::BTreeMap;

use candle_core::{Device, Tensor};

use crate::config::Aggregation;
use crate::error::{EngineError, Result};
use crate::sparse::{SparseTensor, index_tensor};

/// One group of rows processed together by the partial strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegreeBucket {
    rows: Vec<usize>,
    width: usize,
    overflow: bool,
}

impl DegreeBucket {
    /// Returns the row ids in this bucket, ascending.
    #[must_use]
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Returns the padded width, the largest degree in the bucket.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns `true` for the bucket holding rows at or above the degree
    /// cutoff.
    #[must_use]
    pub fn is_overflow(&self) -> bool {
        self.overflow
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the bucket holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Builds the dense views of this bucket over `sparse`.
    pub(crate) fn views(&self, sparse: &SparseTensor, device: &Device) -> Result<BucketViews> {
        let (b, d) = (self.rows.len(), self.width);
        let mut targets = Vec::with_capacity(b * d);
        let mut sources = Vec::with_capacity(b * d);
        let mut positions = Vec::with_capacity(b * d);
        let mut mask = Vec::with_capacity(b * d);

        for &row in &self.rows {
            let entries = sparse.entries(row);
            let degree = entries.len();
            for slot in 0..d {
                targets.push(row);
                if slot < degree {
                    let position = entries.start + slot;
                    sources.push(sparse.col()[position]);
                    positions.push(position);
                    mask.push(1_u8);
                } else {
                    // Padding points at a valid entry and is masked out.
                    sources.push(0);
                    positions.push(entries.start);
                    mask.push(0_u8);
                }
            }
        }

        let neighbor_mask = Tensor::from_vec(mask, (b, d), device)?;
        let edge_weight = match sparse.value() {
            Some(value) => {
                let gathered = value
                    .index_select(&index_tensor(&positions, device)?, 0)?
                    .reshape((b, d))?;
                Some(gathered.mul(&neighbor_mask.to_dtype(gathered.dtype())?)?)
            }
            None => None,
        };

        Ok(BucketViews {
            index: index_tensor(&self.rows, device)?,
            edge_index_i: index_tensor(&targets, device)?.reshape((b, d))?,
            edge_index_j: index_tensor(&sources, device)?.reshape((b, d))?,
            neighbor_mask,
            edge_weight,
        })
    }
}

/// Tensors derived for one bucket.
#[derive(Debug, Clone)]
pub(crate) struct BucketViews {
    /// Row ids, `[B]`.
    pub(crate) index: Tensor,
    /// Row id per slot, `[B, D]`.
    pub(crate) edge_index_i: Tensor,
    /// Neighbour id per slot, `[B, D]`, zero where padded.
    pub(crate) edge_index_j: Tensor,
    /// One where the slot is a real neighbour, `[B, D]`, `U8`.
    pub(crate) neighbor_mask: Tensor,
    /// Stored entry values per slot, zero where padded.
    pub(crate) edge_weight: Option<Tensor>,
}

/// Groups the non-empty rows of `sparse` by degree.
///
/// With `binning`, rows share a bucket when their degrees round up to the
/// same power of two; otherwise when their degrees are equal. Rows with
/// degree `>= max_degree` share one overflow bucket, ordered last. Buckets
/// are ordered by key and rows within a bucket ascend.
///
/// # Errors
///
/// Returns [`EngineError::EmptyAdjacency`] if `sparse` stores no entries.
pub fn degree_buckets(
    sparse: &SparseTensor,
    binning: bool,
    max_degree: Option<usize>,
) -> Result<Vec<DegreeBucket>> {
    if sparse.nnz() == 0 {
        return Err(EngineError::EmptyAdjacency);
    }

    let mut keyed: BTreeMap<(bool, usize), DegreeBucket> = BTreeMap::new();
    for (row, degree) in sparse.degrees().into_iter().enumerate() {
        if degree == 0 {
            continue;
        }
        let overflow = max_degree.is_some_and(|max| degree >= max);
        let key = match (overflow, binning) {
            (true, _) => 0,
            (false, true) => degree.next_power_of_two(),
            (false, false) => degree,
        };
        let bucket = keyed.entry((overflow, key)).or_insert_with(|| DegreeBucket {
            rows: Vec::new(),
            width: 0,
            overflow,
        });
        bucket.rows.push(row);
        bucket.width = bucket.width.max(degree);
    }

    Ok(keyed.into_values().collect())
}

/// Reduces a bucket's messages over the neighbour axis `node_axis + 1`,
/// ignoring padded slots.
///
/// `messages` has shape `[.., B, D, ..]` with `B` at `node_axis`; the result
/// has shape `[.., B, ..]`.
pub(crate) fn masked_reduce(
    messages: &Tensor,
    neighbor_mask: &Tensor,
    node_axis: usize,
    aggr: Aggregation,
) -> Result<Tensor> {
    let slot_axis = node_axis + 1;
    let (b, d) = neighbor_mask.dims2()?;
    for (axis, expected) in [(node_axis, b), (slot_axis, d)] {
        let got = messages.dims().get(axis).copied().unwrap_or_default();
        if got != expected {
            return Err(EngineError::SizeMismatch {
                name: format!("partial messages axis {axis}"),
                expected,
                got,
            });
        }
    }

    let mut shape = vec![1_usize; messages.rank()];
    shape[node_axis] = b;
    shape[slot_axis] = d;
    let mask = neighbor_mask.reshape(shape)?;
    let weights = mask.to_dtype(messages.dtype())?;

    match aggr {
        Aggregation::Add | Aggregation::Sum => {
            Ok(messages.broadcast_mul(&weights)?.sum(slot_axis)?)
        }
        Aggregation::Mean => {
            let sum = messages.broadcast_mul(&weights)?.sum(slot_axis)?;
            let counts = weights.sum(slot_axis)?.maximum(1.0)?;
            Ok(sum.broadcast_div(&counts)?)
        }
        Aggregation::Max => {
            if messages.elem_count() == 0 {
                return Ok(messages.sum(slot_axis)?);
            }
            // Every row has a real slot, so the global minimum never wins.
            let floor = messages
                .flatten_all()?
                .min(0)?
                .broadcast_as(messages.shape())?;
            let kept = mask
                .broadcast_as(messages.shape())?
                .where_cond(messages, &floor)?;
            Ok(kept.max(slot_axis)?)
        }
    }
}

/// Writes bucket results into their rows of a `[.., rows, ..]` output.
pub(crate) fn scatter_rows(
    out: Option<Tensor>,
    bucket_out: &Tensor,
    index: &Tensor,
    node_axis: usize,
    rows: usize,
) -> Result<Tensor> {
    let out = match out {
        Some(out) => out,
        None => {
            let mut shape = bucket_out.dims().to_vec();
            shape[node_axis] = rows;
            Tensor::zeros(shape, bucket_out.dtype(), bucket_out.device())?
        }
    };
    Ok(out.index_add(index, &bucket_out.contiguous()?, node_axis)?)
}
