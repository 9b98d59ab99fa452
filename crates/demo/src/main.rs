//! Message passing demo.
//!
//! Runs a weighted-sum layer over the same six-edge graph encoded as an edge
//! list, a sparse matrix and a dense matrix, and logs which strategy each
//! call took and what it produced.
//!
//! # Usage
//!
//! ```bash
//! PASSAGE_TRACING='{ "level": "debug", "format": "compact" }' passage-demo
//! ```
//!
//! `PASSAGE_TRACING` may also be set in a `.env` file.

use candle_core::{Device, Tensor};
use passage_core::{TracingError, TracingSetup};
use passage_engine::{
    Aggregation, Explain, Hook, HookTable, Layer, MessagePassing, MessagePassingConfig,
    PropagateEvent, Result, SparseTensor,
};
use passage_inspect::{ArgumentFrame, Value, ValuePool};

/// `(source, target)` pairs.
const EDGES: [(usize, usize); 6] = [(0, 1), (2, 1), (3, 1), (1, 0), (0, 3), (2, 3)];
const WEIGHTS: [f32; 6] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
const NODES: usize = 4;

/// Sums `edge_weight * x_j` over incoming edges, with all three execution
/// paths implemented.
struct WeightedSum;

impl WeightedSum {
    fn scaled(frame: &ArgumentFrame) -> Result<Tensor> {
        let x_j = frame.get::<Tensor>("x_j")?;
        let Some(weight) = frame.get_optional::<Tensor>("edge_weight")? else {
            return Ok(x_j.clone());
        };
        let mut weight = weight.to_dtype(x_j.dtype())?;
        while weight.rank() < x_j.rank() {
            weight = weight.unsqueeze(weight.rank())?;
        }
        Ok(x_j.broadcast_mul(&weight)?)
    }
}

impl Layer for WeightedSum {
    fn hooks(&self) -> HookTable {
        HookTable::new()
            .implement(Hook::MessageAndAggregate, |sig| sig.param("adj_t").param("x"))
            .implement(Hook::Message, |sig| sig.param("x_j").optional_param("edge_weight"))
            .implement(Hook::PartialMessage, |sig| {
                sig.param("x_j").optional_param("edge_weight")
            })
    }

    fn name(&self) -> &str {
        "WeightedSum"
    }

    fn message_and_aggregate(&self, frame: &ArgumentFrame) -> Result<Tensor> {
        frame.get::<SparseTensor>("adj_t")?.matmul(frame.get::<Tensor>("x")?)
    }

    fn message(&self, frame: &ArgumentFrame) -> Result<Tensor> {
        Self::scaled(frame)
    }

    fn partial_message(&self, frame: &ArgumentFrame) -> Result<Tensor> {
        Self::scaled(frame)
    }
}

fn tracing_setup() -> (TracingSetup, Option<TracingError>) {
    match std::env::var("PASSAGE_TRACING") {
        Ok(json) => match TracingSetup::from_json(&json) {
            Ok(setup) => (setup, None),
            Err(err) => (TracingSetup::default(), Some(err)),
        },
        Err(_) => (TracingSetup::default(), None),
    }
}

fn run(device: &Device) -> Result<()> {
    let engine = MessagePassing::new(
        WeightedSum,
        MessagePassingConfig::default().with_aggr(Some(Aggregation::Add)),
    )?;
    engine
        .observers()
        .register("log", |event: &PropagateEvent| {
            if let PropagateEvent::Completed { duration } = event {
                tracing::debug!(?duration, "propagate completed");
            }
        })
        .map_err(|err| passage_engine::EngineError::config(err.to_string()))?;
    tracing::info!(%engine, "engine ready");

    let x = Tensor::new(&[[1_f32, 0.0], [0.0, 1.0], [2.0, 2.0], [-1.0, 3.0]], device)?;
    let weights = Tensor::new(&WEIGHTS, device)?;
    let sources: Vec<usize> = EDGES.iter().map(|&(s, _)| s).collect();
    let targets: Vec<usize> = EDGES.iter().map(|&(_, t)| t).collect();

    // Edge list: [2, E] with sources in row 0.
    let flat: Vec<i64> = sources.iter().chain(&targets).map(|&n| n as i64).collect();
    let edge_index = Tensor::from_vec(flat, (2, EDGES.len()), device)?;
    let edge_pool = ValuePool::new()
        .with("x", x.clone())
        .with("edge_weight", weights.clone());

    // Matrices are transposed: row = target, column = source.
    let adj_t = SparseTensor::from_edges(&targets, &sources, Some(weights), (NODES, NODES))?;
    let dense = adj_t.to_dense(device)?;
    let matrix_pool = ValuePool::new().with("x", x);

    let calls: [(&str, Value, &ValuePool); 3] = [
        ("edge list", Value::new(edge_index.clone()), &edge_pool),
        ("sparse matrix", Value::new(adj_t), &matrix_pool),
        ("dense matrix", Value::new(dense), &matrix_pool),
    ];
    for (label, adjacency, pool) in calls {
        let format = engine.classify(&adjacency)?;
        let out = engine.propagate(&adjacency, Some((NODES, NODES)), pool, None)?;
        tracing::info!(
            input = label,
            strategy = ?engine.cached_strategy(format),
            output = ?out.to_vec2::<f32>()?,
            "propagated"
        );
    }

    // Silence the edges into node 1 except the one from node 2.
    let mask = Tensor::new(&[-20_f32, 20.0, -20.0, 20.0, 20.0, 20.0], device)?;
    let explained = engine.propagate(
        &Value::new(edge_index),
        Some((NODES, NODES)),
        &edge_pool,
        Some(&Explain::with_mask(mask)),
    )?;
    tracing::info!(output = ?explained.to_vec2::<f32>()?, "propagated with edge mask");

    tracing::info!(
        derivations = engine.strategy_derivations(),
        "strategy cache populated"
    );
    Ok(())
}

fn main() {
    let _ = dotenvy::dotenv();

    let (setup, settings_error) = tracing_setup();
    if let Err(err) = setup.init() {
        tracing::warn!(%err, "tracing not installed");
    }
    if let Some(err) = settings_error {
        tracing::warn!(%err, "ignoring PASSAGE_TRACING");
    }

    if let Err(err) = run(&Device::Cpu) {
        tracing::error!(%err, "demo failed");
        std::process::exit(1);
    }
}
