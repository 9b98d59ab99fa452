//! Assembly of the value pool hooks draw their arguments from.
//!
//! A call's pool is the caller's values plus entries derived from the
//! adjacency: target and source indices, the reduction index, node counts,
//! and per-edge views of node features. A feature `x` requested as `x_i` or
//! `x_j` is gathered along the node axis with the target or source index
//! ("lifting"). A `(Tensor, Tensor)` pair stands for bipartite features,
//! `(source, target)`.

use std::collections::BTreeSet;

use candle_core::{Device, Tensor};
use passage_inspect::{Null, Value, ValuePool};

use crate::config::Flow;
use crate::error::{EngineError, Result};
use crate::partial::BucketViews;
use crate::sparse::{SparseTensor, index_tensor};

/// Bipartite node features, `(source, target)` under the default flow.
pub type Bipartite = (Tensor, Tensor);

// ─────────────────────────────────────────────────────────────────────────────
// Sizes
// ─────────────────────────────────────────────────────────────────────────────

/// Side of an edge a name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    /// Target, suffix `_i`.
    I,
    /// Source, suffix `_j`.
    J,
}

impl Side {
    /// Splits `x_i` into `("x", I)` and `x_j` into `("x", J)`.
    pub(crate) fn split(name: &str) -> Option<(&str, Side)> {
        if let Some(stem) = name.strip_suffix("_i") {
            Some((stem, Side::I))
        } else {
            name.strip_suffix("_j").map(|stem| (stem, Side::J))
        }
    }

    fn other(self) -> Side {
        match self {
            Side::I => Side::J,
            Side::J => Side::I,
        }
    }
}

/// Node counts of the target (`i`) and source (`j`) side of a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Sizes {
    pub(crate) i: Option<usize>,
    pub(crate) j: Option<usize>,
}

impl Sizes {
    /// Sizes of an edge-list call from the caller's `(size_src, size_dst)`
    /// under the default flow.
    pub(crate) fn from_call(size: Option<(usize, usize)>, flow: Flow) -> Self {
        let Some((first, second)) = size else {
            return Self::default();
        };
        let pick = |row: usize| if row == 0 { first } else { second };
        let (i, j) = flow.rows();
        Self {
            i: Some(pick(i)),
            j: Some(pick(j)),
        }
    }

    /// Sizes of a matrix call: rows are targets, columns sources.
    ///
    /// A caller-supplied size must agree with the matrix shape.
    pub(crate) fn from_matrix(shape: (usize, usize), size: Option<(usize, usize)>) -> Result<Self> {
        let (rows, cols) = shape;
        if let Some((src, dst)) = size {
            for (name, expected, got) in [("size_j", cols, src), ("size_i", rows, dst)] {
                if expected != got {
                    return Err(EngineError::SizeMismatch {
                        name: name.to_string(),
                        expected,
                        got,
                    });
                }
            }
        }
        Ok(Self {
            i: Some(rows),
            j: Some(cols),
        })
    }

    fn get(&self, side: Side) -> Option<usize> {
        match side {
            Side::I => self.i,
            Side::J => self.j,
        }
    }

    /// Records the size found for `side`, failing if it disagrees with a
    /// size already known.
    pub(crate) fn check(&mut self, side: Side, name: &str, got: usize) -> Result<()> {
        match self.get(side) {
            Some(expected) if expected != got => Err(EngineError::SizeMismatch {
                name: name.to_string(),
                expected,
                got,
            }),
            Some(_) => Ok(()),
            None => {
                match side {
                    Side::I => self.i = Some(got),
                    Side::J => self.j = Some(got),
                }
                Ok(())
            }
        }
    }

    /// Fills an unknown side from the other one, treating the graph as square.
    pub(crate) fn square(self) -> Self {
        Self {
            i: self.i.or(self.j),
            j: self.j.or(self.i),
        }
    }

    /// Inserts `size_i`, `size_j` and `dim_size` into `pool`.
    pub(crate) fn insert_into(self, pool: &mut ValuePool) {
        let as_value = |size: Option<usize>| size.map_or_else(Value::null, Value::new);
        pool.insert_value("size_i", as_value(self.i));
        pool.insert_value("size_j", as_value(self.j));
        pool.insert_value("dim_size", as_value(self.i));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifting
// ─────────────────────────────────────────────────────────────────────────────

/// Selects entries of `x` along `axis` by an index tensor of any shape.
///
/// The result replaces `axis` of `x` with the shape of `index`.
pub(crate) fn gather(x: &Tensor, axis: usize, index: &Tensor) -> Result<Tensor> {
    let flat = index.flatten_all()?;
    let selected = x.index_select(&flat, axis)?;

    let dims = x.dims();
    let mut shape = dims[..axis].to_vec();
    shape.extend_from_slice(index.dims());
    shape.extend_from_slice(&dims[axis + 1..]);
    Ok(selected.reshape(shape)?)
}

/// Builds pools for one call.
#[derive(Debug, Clone)]
pub(crate) struct Collector {
    node_axis: usize,
    flow: Flow,
    wanted: BTreeSet<String>,
}

impl Collector {
    /// `wanted` holds the non-reserved parameter names of the hooks that will
    /// run.
    pub(crate) fn new(node_axis: usize, flow: Flow, wanted: BTreeSet<String>) -> Self {
        Self {
            node_axis,
            flow,
            wanted,
        }
    }

    /// Pool for an edge list `[2, num_edges]`.
    pub(crate) fn edge_list(
        &self,
        edge_index: &Tensor,
        size: Option<(usize, usize)>,
        values: &ValuePool,
    ) -> Result<ValuePool> {
        let (i, j) = self.flow.rows();
        let index_i = edge_index.get(i)?;
        let index_j = edge_index.get(j)?;

        let mut sizes = Sizes::from_call(size, self.flow);
        let mut pool = values.clone();
        self.lift(&mut pool, &index_i, &index_j, &mut sizes)?;

        pool.insert("adj_t", Null);
        pool.insert("edge_index_i", index_i.clone());
        pool.insert("edge_index_j", index_j);
        pool.insert("index", index_i);
        pool.insert("ptr", Null);
        sizes.square().insert_into(&mut pool);
        Ok(pool)
    }

    /// Pool for a sparse matrix.
    ///
    /// With `with_edges` the pool also carries per-entry indices, the row
    /// pointer and the stored values as `edge_weight`, and features are
    /// lifted. Without, it carries only `adj_t` and the node counts.
    pub(crate) fn sparse_matrix(
        &self,
        adjacency: &Value,
        sparse: &SparseTensor,
        size: Option<(usize, usize)>,
        values: &ValuePool,
        with_edges: bool,
    ) -> Result<ValuePool> {
        let mut sizes = Sizes::from_matrix(sparse.sparse_sizes(), size)?;
        let mut pool = values.clone();
        pool.insert_value("adj_t", adjacency.clone());

        if with_edges {
            let device = device_of(values, sparse);
            let row = index_tensor(&sparse.row(), &device)?;
            let col = index_tensor(sparse.col(), &device)?;
            self.lift(&mut pool, &row, &col, &mut sizes)?;

            pool.insert("edge_index_i", row.clone());
            pool.insert("edge_index_j", col);
            pool.insert("index", row);
            pool.insert("ptr", index_tensor(sparse.rowptr(), &device)?);
            if let Some(value) = sparse.value() {
                pool.insert_if_absent("edge_weight", Value::new(value.clone()));
            }
        }

        sizes.insert_into(&mut pool);
        Ok(pool)
    }

    /// Pool for one degree bucket, on top of the call's matrix pool.
    pub(crate) fn bucket(&self, base: &ValuePool, views: &BucketViews) -> Result<ValuePool> {
        let mut sizes = Sizes {
            i: base.get_as::<usize>("size_i").copied(),
            j: base.get_as::<usize>("size_j").copied(),
        };
        let mut pool = base.clone();
        self.lift(&mut pool, &views.index, &views.edge_index_j, &mut sizes)?;

        pool.insert("index", views.index.clone());
        pool.insert("edge_index_i", views.edge_index_i.clone());
        pool.insert("edge_index_j", views.edge_index_j.clone());
        pool.insert("neighbor_mask", views.neighbor_mask.clone());
        if let Some(weight) = &views.edge_weight {
            pool.insert_if_absent("edge_weight", Value::new(weight.clone()));
        }
        Ok(pool)
    }

    /// Gathers every wanted `_i` / `_j` name whose stem is a node feature.
    fn lift(
        &self,
        pool: &mut ValuePool,
        index_i: &Tensor,
        index_j: &Tensor,
        sizes: &mut Sizes,
    ) -> Result<()> {
        for name in &self.wanted {
            if pool.contains(name) {
                continue;
            }
            let Some((stem, side)) = Side::split(name) else {
                continue;
            };
            let Some(features) = self.features(pool, stem, side, sizes)? else {
                continue;
            };

            let index = match side {
                Side::I => index_i,
                Side::J => index_j,
            };
            let lifted = gather(&features, self.node_axis, index)?;
            tracing::trace!(name = %name, shape = ?lifted.dims(), "lifted node feature");
            pool.insert(name.clone(), lifted);
        }
        Ok(())
    }

    /// Resolves the feature tensor of `stem` for `side`, recording sizes.
    fn features(
        &self,
        pool: &ValuePool,
        stem: &str,
        side: Side,
        sizes: &mut Sizes,
    ) -> Result<Option<Tensor>> {
        if let Some(x) = pool.get_as::<Tensor>(stem) {
            sizes.check(side, stem, x.dim(self.node_axis)?)?;
            return Ok(Some(x.clone()));
        }

        let Some(pair) = pool.get_as::<Bipartite>(stem) else {
            return Ok(None);
        };
        let (i, j) = self.flow.rows();
        let element = |side: Side| {
            let row = if side == Side::I { i } else { j };
            if row == 0 { &pair.0 } else { &pair.1 }
        };
        let other = side.other();
        sizes.check(other, stem, element(other).dim(self.node_axis)?)?;
        let x = element(side);
        sizes.check(side, stem, x.dim(self.node_axis)?)?;
        Ok(Some(x.clone()))
    }
}

/// Device of the first tensor among the call's values, else of the stored
/// matrix values, else the CPU.
pub(crate) fn device_of(values: &ValuePool, sparse: &SparseTensor) -> Device {
    values
        .names()
        .find_map(|name| {
            values
                .get_as::<Tensor>(name)
                .or_else(|| values.get_as::<Bipartite>(name).map(|pair| &pair.0))
        })
        .or(sparse.value())
        .map_or(Device::Cpu, |tensor| tensor.device().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Tensor {
        Tensor::new(&[[1_f32, 10.0], [2.0, 20.0], [3.0, 30.0]], &Device::Cpu).unwrap()
    }

    fn edges() -> Tensor {
        // 0 -> 1, 1 -> 2
        Tensor::new(&[[0_i64, 1], [1, 2]], &Device::Cpu).unwrap()
    }

    fn wanted(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| (*name).to_string()).collect()
    }

    #[test]
    fn split_suffix() {
        assert_eq!(Side::split("x_i"), Some(("x", Side::I)));
        assert_eq!(Side::split("h_j"), Some(("h", Side::J)));
        assert_eq!(Side::split("x"), None);
    }

    #[test]
    fn sizes_from_call_follow_flow() {
        let forward = Sizes::from_call(Some((4, 7)), Flow::SourceToTarget);
        assert_eq!((forward.i, forward.j), (Some(7), Some(4)));
        let reverse = Sizes::from_call(Some((4, 7)), Flow::TargetToSource);
        assert_eq!((reverse.i, reverse.j), (Some(4), Some(7)));
    }

    #[test]
    fn sizes_conflict() {
        let mut sizes = Sizes {
            i: Some(3),
            j: None,
        };
        sizes.check(Side::J, "x", 5).unwrap();
        assert_eq!(sizes.j, Some(5));
        assert!(matches!(
            sizes.check(Side::I, "x", 4),
            Err(EngineError::SizeMismatch { expected: 3, got: 4, .. })
        ));
    }

    #[test]
    fn gather_replaces_axis_with_index_shape() {
        let index = Tensor::new(&[[2_i64, 0], [1, 1]], &Device::Cpu).unwrap();
        let out = gather(&x(), 0, &index).unwrap();
        assert_eq!(out.dims(), &[2, 2, 2]);
        assert_eq!(
            out.to_vec3::<f32>().unwrap(),
            vec![
                vec![vec![3.0, 30.0], vec![1.0, 10.0]],
                vec![vec![2.0, 20.0], vec![2.0, 20.0]]
            ]
        );
    }

    #[test]
    fn edge_list_pool() {
        let collector = Collector::new(0, Flow::SourceToTarget, wanted(&["x_i", "x_j"]));
        let pool = collector
            .edge_list(&edges(), None, &ValuePool::new().with("x", x()))
            .unwrap();

        let x_j = pool.get_as::<Tensor>("x_j").unwrap();
        assert_eq!(x_j.to_vec2::<f32>().unwrap(), vec![vec![1.0, 10.0], vec![2.0, 20.0]]);
        let x_i = pool.get_as::<Tensor>("x_i").unwrap();
        assert_eq!(x_i.to_vec2::<f32>().unwrap(), vec![vec![2.0, 20.0], vec![3.0, 30.0]]);

        assert_eq!(
            pool.get_as::<Tensor>("index").unwrap().to_vec1::<i64>().unwrap(),
            vec![1, 2]
        );
        assert!(pool.get("ptr").unwrap().is_null());
        assert!(pool.get("adj_t").unwrap().is_null());
        assert_eq!(pool.get_as::<usize>("size_i"), Some(&3));
        assert_eq!(pool.get_as::<usize>("dim_size"), Some(&3));
    }

    #[test]
    fn edge_list_without_features_has_null_sizes() {
        let collector = Collector::new(0, Flow::SourceToTarget, wanted(&[]));
        let pool = collector.edge_list(&edges(), None, &ValuePool::new()).unwrap();
        assert!(pool.get("dim_size").unwrap().is_null());
        assert!(pool.get("size_j").unwrap().is_null());
    }

    #[test]
    fn reverse_flow_swaps_rows() {
        let collector = Collector::new(0, Flow::TargetToSource, wanted(&[]));
        let pool = collector.edge_list(&edges(), None, &ValuePool::new()).unwrap();
        assert_eq!(
            pool.get_as::<Tensor>("edge_index_i").unwrap().to_vec1::<i64>().unwrap(),
            vec![0, 1]
        );
    }

    #[test]
    fn bipartite_pair_picks_side() {
        let src = Tensor::new(&[[1_f32], [2.0], [3.0]], &Device::Cpu).unwrap();
        let dst = Tensor::new(&[[7_f32], [8.0], [9.0], [10.0]], &Device::Cpu).unwrap();
        let collector = Collector::new(0, Flow::SourceToTarget, wanted(&["x_i", "x_j"]));
        let pool = collector
            .edge_list(&edges(), None, &ValuePool::new().with("x", (src, dst)))
            .unwrap();

        assert_eq!(
            pool.get_as::<Tensor>("x_j").unwrap().to_vec2::<f32>().unwrap(),
            vec![vec![1.0], vec![2.0]]
        );
        assert_eq!(
            pool.get_as::<Tensor>("x_i").unwrap().to_vec2::<f32>().unwrap(),
            vec![vec![8.0], vec![9.0]]
        );
        assert_eq!(pool.get_as::<usize>("size_i"), Some(&4));
        assert_eq!(pool.get_as::<usize>("size_j"), Some(&3));
    }

    #[test]
    fn conflicting_feature_sizes() {
        let collector = Collector::new(0, Flow::SourceToTarget, wanted(&["x_j"]));
        let err = collector
            .edge_list(&edges(), Some((5, 5)), &ValuePool::new().with("x", x()))
            .unwrap_err();
        assert!(matches!(err, EngineError::SizeMismatch { expected: 5, got: 3, .. }));
    }

    #[test]
    fn caller_values_are_not_lifted_over() {
        let given = Tensor::new(&[[0_f32, 0.0], [0.0, 0.0]], &Device::Cpu).unwrap();
        let collector = Collector::new(0, Flow::SourceToTarget, wanted(&["x_j"]));
        let pool = collector
            .edge_list(
                &edges(),
                None,
                &ValuePool::new().with("x", x()).with("x_j", given),
            )
            .unwrap();
        assert_eq!(
            pool.get_as::<Tensor>("x_j").unwrap().to_vec2::<f32>().unwrap(),
            vec![vec![0.0, 0.0], vec![0.0, 0.0]]
        );
    }

    #[test]
    fn sparse_matrix_pool() {
        let value = Tensor::new(&[0.5_f32, 2.0], &Device::Cpu).unwrap();
        let sparse = SparseTensor::from_edges(&[1, 2], &[0, 1], Some(value), (3, 3)).unwrap();
        let adjacency = Value::new(sparse.clone());
        let collector = Collector::new(0, Flow::SourceToTarget, wanted(&["x_j"]));

        let pool = collector
            .sparse_matrix(&adjacency, &sparse, None, &ValuePool::new().with("x", x()), true)
            .unwrap();
        assert!(pool.get("adj_t").unwrap().ptr_eq(&adjacency));
        assert_eq!(
            pool.get_as::<Tensor>("ptr").unwrap().to_vec1::<i64>().unwrap(),
            vec![0, 0, 1, 2]
        );
        assert_eq!(
            pool.get_as::<Tensor>("edge_weight").unwrap().to_vec1::<f32>().unwrap(),
            vec![0.5, 2.0]
        );
        assert_eq!(pool.get_as::<Tensor>("x_j").unwrap().dims(), &[2, 2]);

        let fused = collector
            .sparse_matrix(&adjacency, &sparse, None, &ValuePool::new(), false)
            .unwrap();
        assert!(!fused.contains("index"));
        assert_eq!(fused.get_as::<usize>("size_i"), Some(&3));
    }

    #[test]
    fn matrix_size_must_match_shape() {
        let sparse = SparseTensor::from_edges(&[1], &[0], None, (3, 2)).unwrap();
        let collector = Collector::new(0, Flow::SourceToTarget, wanted(&[]));
        let adjacency = Value::new(sparse.clone());
        assert!(collector
            .sparse_matrix(&adjacency, &sparse, Some((2, 3)), &ValuePool::new(), true)
            .is_ok());
        assert!(matches!(
            collector.sparse_matrix(&adjacency, &sparse, Some((3, 3)), &ValuePool::new(), true),
            Err(EngineError::SizeMismatch { .. })
        ));
    }
}
