//! Message passing dispatch for `passage`.
//!
//! [`MessagePassing`] wraps a [`Layer`] and, per call, negotiates how to run
//! it: it classifies the adjacency encoding, picks an execution [`Strategy`]
//! from the hooks the layer implements and the configured preference, gathers
//! the named arguments every hook declares, and invokes the hooks in order.
//!
//! # Example
//!
//! ```
//! use candle_core::{Device, Tensor};
//! use passage_engine::{
//!     Hook, HookTable, Layer, MessagePassing, MessagePassingConfig, Result,
//! };
//! use passage_inspect::{ArgumentFrame, Value, ValuePool};
//!
//! /// Sums neighbour features.
//! struct SumNeighbors;
//!
//! impl Layer for SumNeighbors {
//!     fn hooks(&self) -> HookTable {
//!         HookTable::new().implement(Hook::Message, |sig| sig.param("x_j"))
//!     }
//!
//!     fn message(&self, frame: &ArgumentFrame) -> Result<Tensor> {
//!         Ok(frame.get::<Tensor>("x_j")?.clone())
//!     }
//! }
//!
//! let engine = MessagePassing::new(SumNeighbors, MessagePassingConfig::default()).unwrap();
//!
//! // 0 -> 1, 0 -> 2, 1 -> 2
//! let edges = Tensor::new(&[[0_i64, 0, 1], [1, 2, 2]], &Device::Cpu).unwrap();
//! let x = Tensor::new(&[[1_f32], [10.0], [100.0]], &Device::Cpu).unwrap();
//!
//! let out = engine
//!     .propagate(&Value::new(edges), None, &ValuePool::new().with("x", x), None)
//!     .unwrap();
//! assert_eq!(out.to_vec2::<f32>().unwrap(), vec![vec![0.0], vec![1.0], vec![11.0]]);
//! ```
//!
//! # Architecture
//!
//! - [`adjacency`] - format classification
//! - [`strategy`] - execution strategies and the per-format cache
//! - [`layer`] - the hook contract and capability record
//! - [`collect`] - value pools and `_i` / `_j` lifting
//! - [`scatter`](mod@scatter), [`sparse`], [`partial`] - reference kernels
//! - [`events`], [`observers`] - call instrumentation

pub mod adjacency;
pub mod collect;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod explain;
pub mod layer;
pub mod observers;
pub mod partial;
pub mod scatter;
pub mod sparse;
pub mod strategy;

pub use adjacency::{AdjacencyFormat, classify};
pub use collect::Bipartite;
pub use config::{Aggregation, Flow, MessagePassingConfig};
pub use engine::{ENGINE_RESERVED, MessagePassing};
pub use error::{EngineError, Result};
pub use events::{PropagateEvent, Stage};
pub use explain::Explain;
pub use layer::{Hook, HookTable, Layer};
pub use observers::{ObserverError, Observers};
pub use partial::{DegreeBucket, degree_buckets};
pub use scatter::scatter;
pub use sparse::SparseTensor;
pub use strategy::Strategy;
