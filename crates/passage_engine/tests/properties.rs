//! Property tests: every strategy computes the same aggregation for the same
//! graph, and strategy resolution is stable.


use passage_engine::{AdjacencyFormat, Aggregation, MessagePassingConfig, Strategy as Exec};
use proptest::prelude::*;
use test_utils::{
    FullLayer, PartialOnly, SumLayer, dense_adj, edge_list, engine, features, pool_x, rows_of,
    run, sparse_adj,
};

/// A graph of `1..=6` nodes with up to 12 edges, integer node features and
/// integer edge weights, so every reduction order is exact.
fn graph() -> impl Strategy<Value = (usize, Vec<(usize, usize)>, Vec<f32>, Vec<Vec<f32>>)> {
    (1_usize..=6).prop_flat_map(|nodes| {
        let edge = (0..nodes, 0..nodes);
        (
            Just(nodes),
            prop::collection::vec(edge, 0..=12),
            prop::collection::vec(prop::collection::vec(-4_i8..=4, 2), nodes),
        )
            .prop_flat_map(|(nodes, edges, x)| {
                let weights = prop::collection::vec(1_i8..=3, edges.len());
                (Just(nodes), Just(edges), weights, Just(x))
            })
            .prop_map(|(nodes, edges, weights, x)| {
                let weights = weights.into_iter().map(f32::from).collect();
                let x = x
                    .into_iter()
                    .map(|row| row.into_iter().map(f32::from).collect())
                    .collect();
                (nodes, edges, weights, x)
            })
    })
}

fn x_of(rows: &[Vec<f32>]) -> candle_core::Tensor {
    let refs: Vec<&[f32]> = rows.iter().map(Vec::as_slice).collect();
    features(&refs)
}

fn weight_tensor(weights: &[f32]) -> candle_core::Tensor {
    candle_core::Tensor::new(weights, &candle_core::Device::Cpu).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn strategies_agree_on_weighted_sum((nodes, edges, weights, x) in graph()) {
        prop_assume!(!edges.is_empty());

        let sparse = engine(SumLayer, MessagePassingConfig::default());
        let from_edges = sparse
            .propagate(
                &passage_inspect::Value::new(edge_list(&edges)),
                Some((nodes, nodes)),
                &pool_x(x_of(&x)).with("edge_weight", weight_tensor(&weights)),
                None,
            )
            .unwrap();

        let full = engine(FullLayer, MessagePassingConfig::default());
        let fused = run(&full, sparse_adj(&edges, nodes, Some(&weights)), &pool_x(x_of(&x))).unwrap();

        let partial = engine(PartialOnly, MessagePassingConfig::default());
        let from_dense = run(&partial, dense_adj(&edges, nodes, Some(&weights)), &pool_x(x_of(&x))).unwrap();

        prop_assert_eq!(rows_of(&from_edges), rows_of(&fused));
        prop_assert_eq!(rows_of(&from_edges), rows_of(&from_dense));
    }

    #[test]
    fn partial_matches_sparse_for_mean_and_max(
        (nodes, edges, weights, x) in graph(),
        use_max in any::<bool>(),
        binning in any::<bool>(),
    ) {
        prop_assume!(!edges.is_empty());
        let aggr = if use_max { Aggregation::Max } else { Aggregation::Mean };
        let config = MessagePassingConfig::default()
            .with_aggr(Some(aggr))
            .with_partial_binning(binning);
        let adj = sparse_adj(&edges, nodes, Some(&weights));

        let sparse = engine(FullLayer, config.clone().with_strategy(Exec::Sparse));
        let partial = engine(FullLayer, config.with_strategy(Exec::Partial));

        let a = run(&sparse, adj.clone(), &pool_x(x_of(&x))).unwrap();
        let b = run(&partial, adj, &pool_x(x_of(&x))).unwrap();
        prop_assert_eq!(rows_of(&a), rows_of(&b));
    }

    #[test]
    fn resolution_is_stable(
        forced in prop::option::of(prop::sample::select(vec![
            Exec::Fused,
            Exec::Sparse,
            Exec::Partial,
        ])),
        order in Just(AdjacencyFormat::ALL.to_vec()).prop_shuffle(),
    ) {
        let mut config = MessagePassingConfig::default();
        if let Some(strategy) = forced {
            config = config.with_strategy(strategy);
        }
        let engine = engine(FullLayer, config);

        let mut resolved = 0;
        for format in order {
            let first = engine.resolve_strategy(format).ok();
            let second = engine.resolve_strategy(format).ok();
            prop_assert_eq!(first, second);
            prop_assert_eq!(engine.cached_strategy(format), first);
            if first.is_some() {
                resolved += 1;
            }
            if format == AdjacencyFormat::EdgeList {
                prop_assert_eq!(first, Some(Exec::Sparse));
            }
        }
        prop_assert!(engine.strategy_derivations() >= resolved);
        prop_assert!(engine.strategy_derivations() <= 2 * AdjacencyFormat::COUNT);
    }
}
