//! Hook signature inspection for `passage`.
//!
//! This crate records, once, which named parameters each layer hook declares
//! and answers two questions cheaply afterwards:
//!
//! - Which named inputs could any of these hooks need? ([`Inspector::required_names`])
//! - Given a pool of named values, what exact frame does one hook receive?
//!   ([`Inspector::build_frame`])
//!
//! Signatures are explicit parameter tables built at registration time; no
//! runtime introspection is involved.
//!
//! # Example
//!
//! ```
//! use passage_inspect::{HookSignature, Inspector, ValuePool};
//!
//! let mut inspector = Inspector::new();
//! inspector.register(
//!     HookSignature::new("message").param("x").param_with_default("y", 5_i64),
//!     false,
//! );
//!
//! let pool = ValuePool::new().with("x", 10_i64);
//! let frame = inspector.build_frame("message", &pool).unwrap();
//! assert_eq!(*frame.get::<i64>("x").unwrap(), 10);
//! assert_eq!(*frame.get::<i64>("y").unwrap(), 5);
//! ```
//!
//! # Architecture
//!
//! - [`Value`] / [`ValuePool`] - type-erased named values
//! - [`HookSignature`] - ordered parameter table with defaults
//! - [`Inspector`] - signature registry, reserved names, frame building
//! - [`ArgumentFrame`] - typed access to one hook's arguments

pub mod error;
pub mod frame;
pub mod inspector;
pub mod signature;
pub mod value;

pub use error::InspectError;
pub use frame::ArgumentFrame;
pub use inspector::{Inspector, RESERVED_NAMES};
pub use signature::HookSignature;
pub use value::{Null, Value, ValuePool};
