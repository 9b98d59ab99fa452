//! # Passage Internal Library
//!
//! Re-exports the core passage crates for convenience.

/// Layer 1: hook signatures and argument frames.
pub use passage_inspect;

/// Layer 2: classification, strategy resolution and dispatch.
pub use passage_engine;

/// Runtime setup for binaries.
pub use passage_core;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use passage_core::{TracingFormat, TracingSetup};
    pub use passage_engine::{
        AdjacencyFormat, Aggregation, Explain, Flow, Hook, HookTable, Layer, MessagePassing,
        MessagePassingConfig, PropagateEvent, SparseTensor, Strategy,
    };
    pub use passage_inspect::{ArgumentFrame, HookSignature, Value, ValuePool};
}
