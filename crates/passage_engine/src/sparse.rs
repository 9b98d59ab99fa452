//! Row-compressed sparse adjacency.
//!
//! [`SparseTensor`] stores a `rows × cols` adjacency in CSR form: a row
//! pointer, the column of each stored entry and optional entry values. By
//! convention the matrix is the *transposed* adjacency: row `i` lists the
//! nodes `j` that send messages to `i`, so rows index targets and columns
//! index sources.

use core::ops::Range;

use candle_core::{DType, Device, Tensor};

use crate::error::{EngineError, Result};

/// CSR adjacency matrix.
#[derive(Debug, Clone)]
pub struct SparseTensor {
    rowptr: Vec<usize>,
    col: Vec<usize>,
    value: Option<Tensor>,
    sparse_sizes: (usize, usize),
}

impl SparseTensor {
    /// Builds a matrix from its CSR parts.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidSparse`] if the row pointer does not
    /// describe `sparse_sizes.0` rows over `col`, a column is out of range,
    /// or `value` does not hold one entry per stored element.
    pub fn from_csr(
        rowptr: Vec<usize>,
        col: Vec<usize>,
        value: Option<Tensor>,
        sparse_sizes: (usize, usize),
    ) -> Result<Self> {
        let (rows, cols) = sparse_sizes;
        if rowptr.len() != rows + 1 {
            return Err(EngineError::invalid_sparse(format!(
                "row pointer has {} entries for {rows} rows",
                rowptr.len()
            )));
        }
        if rowptr.first() != Some(&0) || rowptr.last() != Some(&col.len()) {
            return Err(EngineError::invalid_sparse(
                "row pointer must start at 0 and end at the number of entries",
            ));
        }
        if rowptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(EngineError::invalid_sparse("row pointer must be non-decreasing"));
        }
        if let Some(&c) = col.iter().find(|&&c| c >= cols) {
            return Err(EngineError::invalid_sparse(format!(
                "column {c} out of range for {cols} columns"
            )));
        }
        if let Some(value) = &value {
            let len = value.dims().first().copied().unwrap_or_default();
            if len != col.len() {
                return Err(EngineError::invalid_sparse(format!(
                    "value holds {len} entries for {} stored elements",
                    col.len()
                )));
            }
        }

        Ok(Self {
            rowptr,
            col,
            value,
            sparse_sizes,
        })
    }

    /// Builds a matrix from coordinate lists.
    ///
    /// Entries are grouped by row; the order within a row is the input order.
    /// `value`, if given, is permuted along its first axis accordingly.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidSparse`] if `row` and `col` differ in
    /// length or a row is out of range, plus the checks of
    /// [`from_csr`](Self::from_csr).
    pub fn from_edges(
        row: &[usize],
        col: &[usize],
        value: Option<Tensor>,
        sparse_sizes: (usize, usize),
    ) -> Result<Self> {
        let rows = sparse_sizes.0;
        if row.len() != col.len() {
            return Err(EngineError::invalid_sparse(format!(
                "{} row indices for {} column indices",
                row.len(),
                col.len()
            )));
        }
        if let Some(&r) = row.iter().find(|&&r| r >= rows) {
            return Err(EngineError::invalid_sparse(format!(
                "row {r} out of range for {rows} rows"
            )));
        }

        // Counting sort by row keeps the input order within each row.
        let mut rowptr = vec![0_usize; rows + 1];
        for &r in row {
            rowptr[r + 1] += 1;
        }
        for r in 0..rows {
            rowptr[r + 1] += rowptr[r];
        }
        let mut next = rowptr.clone();
        let mut perm = vec![0_usize; row.len()];
        for (position, &r) in row.iter().enumerate() {
            perm[next[r]] = position;
            next[r] += 1;
        }

        let sorted_col = perm.iter().map(|&p| col[p]).collect();
        let value = match value {
            Some(value) => {
                let index = index_tensor(&perm, value.device())?;
                Some(value.index_select(&index, 0)?)
            }
            None => None,
        };

        Self::from_csr(rowptr, sorted_col, value, sparse_sizes)
    }

    /// Builds a matrix holding the non-zero entries of a dense rank-2 tensor.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidSparse`] if `dense` is not rank 2.
    pub fn from_dense(dense: &Tensor) -> Result<Self> {
        let &[rows, cols] = dense.dims() else {
            return Err(EngineError::invalid_sparse(format!(
                "dense adjacency must be rank 2, got shape {:?}",
                dense.dims()
            )));
        };

        let entries = dense.to_dtype(DType::F64)?.to_vec2::<f64>()?;
        let mut rowptr = Vec::with_capacity(rows + 1);
        let mut col = Vec::new();
        let mut flat = Vec::new();
        rowptr.push(0);
        for (r, line) in entries.iter().enumerate() {
            for (c, &weight) in line.iter().enumerate() {
                if weight != 0.0 {
                    col.push(c);
                    flat.push(r * cols + c);
                }
            }
            rowptr.push(col.len());
        }

        let index = index_tensor(&flat, dense.device())?;
        let value = dense.flatten_all()?.index_select(&index, 0)?;
        Self::from_csr(rowptr, col, Some(value), (rows, cols))
    }

    /// Returns `(rows, cols)`.
    #[must_use]
    pub fn sparse_sizes(&self) -> (usize, usize) {
        self.sparse_sizes
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.col.len()
    }

    /// Returns the row pointer.
    #[must_use]
    pub fn rowptr(&self) -> &[usize] {
        &self.rowptr
    }

    /// Returns the column of each stored entry.
    #[must_use]
    pub fn col(&self) -> &[usize] {
        &self.col
    }

    /// Returns the entry values, if stored.
    #[must_use]
    pub fn value(&self) -> Option<&Tensor> {
        self.value.as_ref()
    }

    /// Returns the row of each stored entry.
    #[must_use]
    pub fn row(&self) -> Vec<usize> {
        self.rowptr
            .windows(2)
            .enumerate()
            .flat_map(|(r, w)| core::iter::repeat_n(r, w[1] - w[0]))
            .collect()
    }

    /// Returns the positions of the entries stored in `row`.
    #[must_use]
    pub fn entries(&self, row: usize) -> Range<usize> {
        self.rowptr[row]..self.rowptr[row + 1]
    }

    /// Returns the columns stored in `row`.
    #[must_use]
    pub fn neighbors(&self, row: usize) -> &[usize] {
        &self.col[self.entries(row)]
    }

    /// Returns the number of entries of every row.
    #[must_use]
    pub fn degrees(&self) -> Vec<usize> {
        self.rowptr.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Expands the matrix to a dense `rows × cols` tensor.
    ///
    /// Duplicate entries accumulate; missing values are read as one.
    pub fn to_dense(&self, device: &Device) -> Result<Tensor> {
        let (rows, cols) = self.sparse_sizes;
        let value = match &self.value {
            Some(value) => value.to_device(device)?,
            None => Tensor::ones(self.nnz(), DType::F32, device)?,
        };
        let flat: Vec<usize> = self
            .row()
            .into_iter()
            .zip(&self.col)
            .map(|(r, &c)| r * cols + c)
            .collect();
        let out = Tensor::zeros(rows * cols, value.dtype(), device)?;
        let out = out.index_add(&index_tensor(&flat, device)?, &value, 0)?;
        Ok(out.reshape((rows, cols))?)
    }

    /// Multiplies the matrix with `dense` along its first axis.
    ///
    /// Row `i` of the result is the sum over stored entries `(i, j)` of
    /// `value(i, j) * dense[j]`, with missing values read as one.
    ///
    /// # Errors
    ///
    /// Fails if `dense` has no first axis of length `cols`.
    pub fn matmul(&self, dense: &Tensor) -> Result<Tensor> {
        let (rows, cols) = self.sparse_sizes;
        let got = dense.dims().first().copied().unwrap_or_default();
        if dense.rank() == 0 || got != cols {
            return Err(EngineError::SizeMismatch {
                name: "matmul operand".to_string(),
                expected: cols,
                got,
            });
        }

        let device = dense.device();
        let gathered = dense.index_select(&index_tensor(&self.col, device)?, 0)?;
        let gathered = match &self.value {
            Some(value) => {
                let mut shape = vec![1_usize; gathered.rank()];
                shape[0] = self.nnz();
                let weights = value.to_dtype(gathered.dtype())?.reshape(shape)?;
                gathered.broadcast_mul(&weights)?
            }
            None => gathered,
        };

        let mut out_shape = dense.dims().to_vec();
        out_shape[0] = rows;
        let out = Tensor::zeros(out_shape, gathered.dtype(), device)?;
        Ok(out.index_add(&index_tensor(&self.row(), device)?, &gathered, 0)?)
    }
}

/// Builds a rank-1 `I64` tensor of indices.
pub(crate) fn index_tensor(indices: &[usize], device: &Device) -> Result<Tensor> {
    let data: Vec<i64> = indices.iter().map(|&i| i as i64).collect();
    Ok(Tensor::from_vec(data, indices.len(), device)?)
}
