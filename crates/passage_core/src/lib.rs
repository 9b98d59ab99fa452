//! Runtime setup shared by everything that drives a `passage` engine.
//!
//! The engine crates only emit `tracing` events and spans; installing a
//! subscriber is left to the binary. [`TracingSetup`] is that installer.

pub mod tracing_setup;

pub use tracing_setup::{TracingError, TracingFormat, TracingSetup};
