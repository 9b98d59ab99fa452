//! Grouped reductions used as the default aggregation.

use candle_core::{DType, Tensor};

use crate::config::Aggregation;
use crate::error::{EngineError, Result};

/// Reduces slices of `src` along `dim` into `dim_size` groups given by `index`.
///
/// `index` is a rank-1 integer tensor with one entry per slice of `src`
/// along `dim`. Groups that receive no slice are zero for every reduction.
/// When `dim_size` is `None` it is `max(index) + 1`.
///
/// # Errors
///
/// Fails if `index` does not match `src` along `dim`, or holds an index that
/// is negative or not below `dim_size`.
pub fn scatter(
    src: &Tensor,
    index: &Tensor,
    dim: usize,
    dim_size: Option<usize>,
    aggr: Aggregation,
) -> Result<Tensor> {
    if dim >= src.rank() {
        return Err(EngineError::SizeMismatch {
            name: "scatter source rank".to_string(),
            expected: dim + 1,
            got: src.rank(),
        });
    }

    let groups = index.to_dtype(DType::I64)?.to_vec1::<i64>()?;
    let items = src.dim(dim)?;
    if groups.len() != items {
        return Err(EngineError::SizeMismatch {
            name: "index".to_string(),
            expected: items,
            got: groups.len(),
        });
    }

    let inferred = groups.iter().copied().max().map_or(0, |max| max + 1);
    let dim_size = dim_size.unwrap_or_else(|| usize::try_from(inferred).unwrap_or_default());
    if let Some(&bad) = groups
        .iter()
        .find(|&&g| g < 0 || usize::try_from(g).is_ok_and(|g| g >= dim_size))
    {
        return Err(EngineError::SizeMismatch {
            name: format!("index entry {bad}"),
            expected: dim_size,
            got: usize::try_from(bad).unwrap_or_default() + 1,
        });
    }

    let index = index.to_dtype(DType::I64)?;
    match aggr {
        Aggregation::Add | Aggregation::Sum => scatter_sum(src, &index, dim, dim_size),
        Aggregation::Mean => {
            let sum = scatter_sum(src, &index, dim, dim_size)?;
            let ones = Tensor::ones(items, src.dtype(), src.device())?;
            let counts = Tensor::zeros(dim_size, src.dtype(), src.device())?
                .index_add(&index, &ones, 0)?
                .maximum(1.0)?;
            let mut shape = vec![1_usize; src.rank()];
            shape[dim] = dim_size;
            Ok(sum.broadcast_div(&counts.reshape(shape)?)?)
        }
        Aggregation::Max => scatter_max(src, &groups, dim, dim_size),
    }
}

fn scatter_sum(src: &Tensor, index: &Tensor, dim: usize, dim_size: usize) -> Result<Tensor> {
    let mut shape = src.dims().to_vec();
    shape[dim] = dim_size;
    let out = Tensor::zeros(shape, src.dtype(), src.device())?;
    Ok(out.index_add(index, &src.contiguous()?, dim)?)
}

fn scatter_max(src: &Tensor, groups: &[i64], dim: usize, dim_size: usize) -> Result<Tensor> {
    // Move the grouped axis to the front and flatten the rest.
    let moved = src.transpose(0, dim)?.contiguous()?;
    let mut moved_shape = moved.dims().to_vec();
    let items = moved_shape[0];
    let width: usize = moved_shape[1..].iter().product();

    let rows = moved
        .reshape((items, width))?
        .to_dtype(DType::F64)?
        .to_vec2::<f64>()?;

    let mut out = vec![f64::NEG_INFINITY; dim_size * width];
    let mut touched = vec![false; dim_size];
    for (row, &group) in rows.iter().zip(groups) {
        let group = usize::try_from(group).unwrap_or_default();
        touched[group] = true;
        let slot = &mut out[group * width..(group + 1) * width];
        for (acc, &v) in slot.iter_mut().zip(row) {
            *acc = acc.max(v);
        }
    }
    for (group, _) in touched.iter().enumerate().filter(|(_, hit)| !**hit) {
        out[group * width..(group + 1) * width].fill(0.0);
    }

    moved_shape[0] = dim_size;
    let reduced = Tensor::from_vec(out, moved_shape, src.device())?
        .transpose(0, dim)?
        .contiguous()?
        .to_dtype(src.dtype())?;
    Ok(reduced)
}
