//! Integration tests for adjacency classification and strategy resolution.


use candle_core::{DType, Device, Tensor};
use passage_engine::{AdjacencyFormat, EngineError, Flow, Hook, MessagePassingConfig, Strategy};
use passage_inspect::Value;
use test_utils::{
    FullLayer, FusedOnly, PartialOnly, SumLayer, dense_adj, edge_list, engine, features, pool_x,
    rows_of, run, sparse_adj,
};

// ─────────────────────────────────────────────────────────────────────
// 1. Classification
// ─────────────────────────────────────────────────────────────────────

#[test]
fn classifies_three_formats() {
    let engine = engine(SumLayer, MessagePassingConfig::default());
    let edges = Value::new(edge_list(&[(0, 1), (1, 2)]));
    let sparse = Value::new(sparse_adj(&[(0, 1)], 3, None));
    let dense = Value::new(dense_adj(&[(0, 1)], 3, None));

    assert_eq!(engine.classify(&edges).unwrap(), AdjacencyFormat::EdgeList);
    assert_eq!(engine.classify(&sparse).unwrap(), AdjacencyFormat::SparseMatrix);
    assert_eq!(engine.classify(&dense).unwrap(), AdjacencyFormat::DenseMatrix);
}

#[test]
fn rank_three_tensor_is_invalid() {
    let engine = engine(SumLayer, MessagePassingConfig::default());
    let cube = Tensor::zeros((2, 2, 2), DType::F32, &Device::Cpu).unwrap();
    let err = run(&engine, cube, &pool_x(features(&[&[1.0]]))).unwrap_err();
    assert!(matches!(err, EngineError::InvalidAdjacency(_)), "got: {err}");
}

#[test]
fn foreign_value_is_invalid() {
    let engine = engine(SumLayer, MessagePassingConfig::default());
    let err = engine.classify(&Value::new("edges")).unwrap_err();
    assert!(err.to_string().contains("&str"), "got: {err}");
}

// ─────────────────────────────────────────────────────────────────────
// 2. Resolution order
// ─────────────────────────────────────────────────────────────────────

#[test]
fn sparse_matrix_prefers_fused() {
    let engine = engine(FullLayer, MessagePassingConfig::default());
    assert_eq!(
        engine.resolve_strategy(AdjacencyFormat::SparseMatrix).unwrap(),
        Strategy::Fused
    );
}

#[test]
fn sparse_matrix_falls_back_by_capability() {
    let sparse = engine(SumLayer, MessagePassingConfig::default());
    assert_eq!(
        sparse.resolve_strategy(AdjacencyFormat::SparseMatrix).unwrap(),
        Strategy::Sparse
    );

    let partial = engine(PartialOnly, MessagePassingConfig::default());
    assert_eq!(
        partial.resolve_strategy(AdjacencyFormat::SparseMatrix).unwrap(),
        Strategy::Partial
    );
}

#[test]
fn dense_matrix_uses_partial() {
    let engine = engine(FullLayer, MessagePassingConfig::default());
    assert_eq!(
        engine.resolve_strategy(AdjacencyFormat::DenseMatrix).unwrap(),
        Strategy::Partial
    );
}

#[test]
fn edge_list_is_always_sparse() {
    for strategy in [Strategy::Fused, Strategy::Sparse, Strategy::Partial] {
        let engine = engine(
            FullLayer,
            MessagePassingConfig::default().with_strategy(strategy),
        );
        assert_eq!(
            engine.resolve_strategy(AdjacencyFormat::EdgeList).unwrap(),
            Strategy::Sparse,
            "forced {strategy}"
        );
    }
}

#[test]
fn forced_strategy_is_honoured() {
    let engine = engine(
        FullLayer,
        MessagePassingConfig::default().with_strategy(Strategy::Partial),
    );
    assert_eq!(
        engine.resolve_strategy(AdjacencyFormat::SparseMatrix).unwrap(),
        Strategy::Partial
    );
}

#[test]
fn forced_strategy_is_cached_without_capability_check() {
    let engine = engine(
        SumLayer,
        MessagePassingConfig::default().with_strategy(Strategy::Partial),
    );
    assert_eq!(
        engine.resolve_strategy(AdjacencyFormat::SparseMatrix).unwrap(),
        Strategy::Partial
    );
    assert_eq!(
        engine.cached_strategy(AdjacencyFormat::SparseMatrix),
        Some(Strategy::Partial)
    );
}

#[test]
fn forced_unsupported_strategy_fails_at_dispatch() {
    let engine = engine(
        SumLayer,
        MessagePassingConfig::default().with_strategy(Strategy::Fused),
    );
    let pool = pool_x(features(&[&[1.0], &[2.0]]));
    let err = run(&engine, sparse_adj(&[(0, 1)], 2, None), &pool).unwrap_err();
    assert!(
        matches!(err, EngineError::HookNotImplemented(Hook::MessageAndAggregate)),
        "got: {err}"
    );
    assert_eq!(
        engine.cached_strategy(AdjacencyFormat::SparseMatrix),
        Some(Strategy::Fused)
    );
}

#[test]
fn forced_sparse_runs_on_dense_input() {
    let engine = engine(
        FullLayer,
        MessagePassingConfig::default().with_strategy(Strategy::Sparse),
    );
    assert_eq!(
        engine.resolve_strategy(AdjacencyFormat::DenseMatrix).unwrap(),
        Strategy::Sparse
    );

    let x = features(&[&[1.0], &[10.0], &[100.0]]);
    let dense = dense_adj(&[(0, 2), (1, 2), (2, 0)], 3, Some(&[1.0, 2.0, 3.0]));
    let out = run(&engine, dense, &pool_x(x)).unwrap();
    assert_eq!(rows_of(&out), vec![vec![300.0], vec![0.0], vec![21.0]]);
}

#[test]
fn fused_only_layer_rejects_dense_input() {
    let engine = engine(FusedOnly, MessagePassingConfig::default());
    let x = features(&[&[1.0], &[2.0]]);
    let err = run(&engine, dense_adj(&[(0, 1)], 2, None), &pool_x(x)).unwrap_err();

    assert!(matches!(
        err,
        EngineError::UnresolvedStrategy {
            format: AdjacencyFormat::DenseMatrix
        }
    ));
    assert_eq!(engine.cached_strategy(AdjacencyFormat::DenseMatrix), None);
}

#[test]
fn no_aggregation_without_aggregate_hook_is_unresolved() {
    let engine = engine(PartialOnly, MessagePassingConfig::default().with_aggr(None));
    assert!(!engine.supports_partial());
    assert!(matches!(
        engine.resolve_strategy(AdjacencyFormat::DenseMatrix),
        Err(EngineError::UnresolvedStrategy { .. })
    ));
}

#[test]
fn required_names_cover_only_declared_parameters() {
    let fused = engine(FusedOnly, MessagePassingConfig::default());
    let names: Vec<_> = fused.inspector().required_names(None).into_iter().collect();
    assert_eq!(names, vec!["x".to_string()]);

    let sparse = engine(SumLayer, MessagePassingConfig::default());
    let names: Vec<_> = sparse.inspector().required_names(None).into_iter().collect();
    assert_eq!(names, vec!["edge_weight".to_string(), "x_j".to_string()]);
}

// ─────────────────────────────────────────────────────────────────────
// 3. Caching
// ─────────────────────────────────────────────────────────────────────

#[test]
fn resolution_is_cached_per_format() {
    let engine = engine(FullLayer, MessagePassingConfig::default());
    assert_eq!(engine.strategy_derivations(), 0);

    let first = engine.resolve_strategy(AdjacencyFormat::SparseMatrix).unwrap();
    let second = engine.resolve_strategy(AdjacencyFormat::SparseMatrix).unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.strategy_derivations(), 1);
    assert_eq!(
        engine.cached_strategy(AdjacencyFormat::SparseMatrix),
        Some(Strategy::Fused)
    );

    engine.resolve_strategy(AdjacencyFormat::EdgeList).unwrap();
    assert_eq!(engine.strategy_derivations(), 2);
    assert_eq!(engine.cached_strategy(AdjacencyFormat::DenseMatrix), None);
}

#[test]
fn propagate_populates_cache_once() {
    let engine = engine(SumLayer, MessagePassingConfig::default());
    let pool = pool_x(features(&[&[1.0], &[2.0], &[3.0]]));

    for _ in 0..3 {
        run(&engine, edge_list(&[(0, 1), (1, 2)]), &pool).unwrap();
    }
    assert_eq!(engine.strategy_derivations(), 1);
    assert_eq!(
        engine.cached_strategy(AdjacencyFormat::EdgeList),
        Some(Strategy::Sparse)
    );
}

#[test]
fn failed_resolution_is_retried() {
    let engine = engine(FusedOnly, MessagePassingConfig::default());
    assert!(engine.resolve_strategy(AdjacencyFormat::DenseMatrix).is_err());
    assert!(engine.resolve_strategy(AdjacencyFormat::DenseMatrix).is_err());
    assert_eq!(engine.strategy_derivations(), 2);
}

// ─────────────────────────────────────────────────────────────────────
// 4. Flow
// ─────────────────────────────────────────────────────────────────────

#[test]
fn reverse_flow_rejected_for_matrices() {
    let engine = engine(
        FullLayer,
        MessagePassingConfig::default().with_flow(Flow::TargetToSource),
    );
    let pool = pool_x(features(&[&[1.0], &[2.0]]));

    let err = run(&engine, sparse_adj(&[(0, 1)], 2, None), &pool).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidFlow {
            format: AdjacencyFormat::SparseMatrix
        }
    ));

    let err = run(&engine, dense_adj(&[(0, 1)], 2, None), &pool).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidFlow {
            format: AdjacencyFormat::DenseMatrix
        }
    ));
}

#[test]
fn reverse_flow_rejected_for_sparse_strategy() {
    let engine = engine(
        SumLayer,
        MessagePassingConfig::default().with_flow(Flow::TargetToSource),
    );
    assert_eq!(
        engine.resolve_strategy(AdjacencyFormat::SparseMatrix).unwrap(),
        Strategy::Sparse
    );

    let pool = pool_x(features(&[&[1.0], &[2.0]]));
    let err = run(&engine, sparse_adj(&[(0, 1)], 2, None), &pool).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidFlow {
            format: AdjacencyFormat::SparseMatrix
        }
    ));
}

#[test]
fn reverse_flow_accepted_for_edge_lists() {
    let engine = engine(
        SumLayer,
        MessagePassingConfig::default().with_flow(Flow::TargetToSource),
    );
    let pool = pool_x(features(&[&[1.0], &[2.0]]));

    // Under reverse flow, (0, 1) sends from 1 to 0.
    let out = run(&engine, edge_list(&[(0, 1)]), &pool).unwrap();
    assert_eq!(rows_of(&out), vec![vec![2.0], vec![0.0]]);
}

// ─────────────────────────────────────────────────────────────────────
// 5. Configuration
// ─────────────────────────────────────────────────────────────────────

#[test]
fn invalid_config_rejected_at_construction() {
    let err = passage_engine::MessagePassing::new(
        SumLayer,
        MessagePassingConfig::default().with_node_dim(-1),
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
}

#[test]
fn config_from_json_drives_resolution() {
    let config = MessagePassingConfig::from_json(r#"{ "strategy": "partial", "aggr": "max" }"#)
        .unwrap();
    let engine = engine(FullLayer, config);
    assert_eq!(
        engine.resolve_strategy(AdjacencyFormat::SparseMatrix).unwrap(),
        Strategy::Partial
    );
}
