//! Message passing dispatch for graph neural network layers.
//!
//! A layer declares which hooks it implements and which named inputs each
//! hook takes; [`passage_engine::MessagePassing`] picks how to execute it for
//! every adjacency it is called with.

pub use passage_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use passage_internal::prelude::*;
}
