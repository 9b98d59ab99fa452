//! The hook contract implemented by concrete layers.
//!
//! A layer implements any subset of six hooks and declares that subset, with
//! the named parameters of each hook, in a [`HookTable`]. The engine never
//! probes a layer for methods at runtime: the table is the capability record.
//!
//! # Example
//!
//! ```
//! use candle_core::Tensor;
//! use passage_engine::layer::{Hook, HookTable, Layer};
//! use passage_engine::Result;
//! use passage_inspect::ArgumentFrame;
//!
//! struct Identity;
//!
//! impl Layer for Identity {
//!     fn hooks(&self) -> HookTable {
//!         HookTable::new().implement(Hook::Message, |sig| sig.param("x_j"))
//!     }
//!
//!     fn message(&self, frame: &ArgumentFrame) -> Result<Tensor> {
//!         Ok(frame.get::<Tensor>("x_j")?.clone())
//!     }
//! }
//!
//! assert!(Identity.hooks().is_implemented(Hook::Message));
//! assert!(!Identity.hooks().is_implemented(Hook::Aggregate));
//! ```

use core::fmt;

use candle_core::Tensor;
use passage_inspect::{ArgumentFrame, HookSignature};

use crate::error::{EngineError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Hook
// ─────────────────────────────────────────────────────────────────────────────

/// One overridable step of message passing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Computes messages and their aggregation in one step.
    MessageAndAggregate,
    /// Computes one message per edge.
    Message,
    /// Reduces per-edge messages per target node.
    Aggregate,
    /// Computes messages for one degree bucket.
    PartialMessage,
    /// Reduces the messages of one degree bucket over its neighbour axis.
    PartialAggregate,
    /// Transforms the aggregated result.
    Update,
}

impl Hook {
    /// All hooks in registration order.
    pub const ALL: [Hook; 6] = [
        Self::MessageAndAggregate,
        Self::Message,
        Self::Aggregate,
        Self::PartialMessage,
        Self::PartialAggregate,
        Self::Update,
    ];

    /// Returns the hook name used in signatures and frames.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::MessageAndAggregate => "message_and_aggregate",
            Self::Message => "message",
            Self::Aggregate => "aggregate",
            Self::PartialMessage => "partial_message",
            Self::PartialAggregate => "partial_aggregate",
            Self::Update => "update",
        }
    }

    /// Returns `true` for hooks whose first parameter is the bound input
    /// tensor rather than a named value.
    #[must_use]
    pub fn binds_inputs(self) -> bool {
        matches!(self, Self::Aggregate | Self::PartialAggregate | Self::Update)
    }

    /// Returns the signature used when the layer does not implement the hook.
    #[must_use]
    pub fn base_signature(self) -> HookSignature {
        let sig = HookSignature::new(self.name());
        match self {
            Self::MessageAndAggregate | Self::Message | Self::PartialMessage => sig,
            Self::Aggregate => sig
                .param(INPUTS)
                .param("index")
                .optional_param("ptr")
                .optional_param("dim_size"),
            Self::PartialAggregate | Self::Update => sig.param(INPUTS),
        }
    }

    fn position(self) -> usize {
        match self {
            Self::MessageAndAggregate => 0,
            Self::Message => 1,
            Self::Aggregate => 2,
            Self::PartialMessage => 3,
            Self::PartialAggregate => 4,
            Self::Update => 5,
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name of the bound input parameter.
const INPUTS: &str = "inputs";

// ─────────────────────────────────────────────────────────────────────────────
// HookTable
// ─────────────────────────────────────────────────────────────────────────────

/// Which hooks a layer implements, and the parameters each one declares.
#[derive(Debug, Clone, Default)]
pub struct HookTable {
    signatures: [Option<HookSignature>; 6],
}

impl HookTable {
    /// Creates a table with no implemented hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `hook` as implemented.
    ///
    /// `declare` receives an empty signature for the hook and adds its named
    /// parameters. For hooks that [bind an input](Hook::binds_inputs) the
    /// signature already starts with the bound parameter, so only the named
    /// ones are declared. Declaring a hook again replaces the previous entry.
    #[must_use]
    pub fn implement<F>(mut self, hook: Hook, declare: F) -> Self
    where
        F: FnOnce(HookSignature) -> HookSignature,
    {
        let seed = HookSignature::new(hook.name());
        let seed = if hook.binds_inputs() {
            seed.param(INPUTS)
        } else {
            seed
        };
        self.signatures[hook.position()] = Some(declare(seed));
        self
    }

    /// Returns whether `hook` is implemented.
    #[must_use]
    pub fn is_implemented(&self, hook: Hook) -> bool {
        self.signatures[hook.position()].is_some()
    }

    /// Returns the declared signature of `hook`, if implemented.
    #[must_use]
    pub fn signature(&self, hook: Hook) -> Option<&HookSignature> {
        self.signatures[hook.position()].as_ref()
    }

    /// Returns the implemented hooks in registration order.
    pub fn implemented(&self) -> impl Iterator<Item = Hook> + '_ {
        Hook::ALL.into_iter().filter(|hook| self.is_implemented(*hook))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Layer
// ─────────────────────────────────────────────────────────────────────────────

/// A concrete message passing layer.
///
/// Only the hooks listed in [`hooks`](Self::hooks) are ever called by the
/// engine. The defaults fail with [`EngineError::HookNotImplemented`], except
/// [`update`](Self::update), which returns its input unchanged.
///
/// Every hook receives the [`ArgumentFrame`] built from its declared
/// parameters; `aggregate`, `partial_aggregate` and `update` also receive the
/// result of the previous step as `inputs`.
pub trait Layer {
    /// Returns the capability record of this layer.
    fn hooks(&self) -> HookTable;

    /// Returns a display name for logs.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    /// Computes the aggregated messages directly from the adjacency.
    fn message_and_aggregate(&self, frame: &ArgumentFrame) -> Result<Tensor> {
        let _ = frame;
        Err(EngineError::HookNotImplemented(Hook::MessageAndAggregate))
    }

    /// Computes one message per edge, stacked along the node dimension.
    fn message(&self, frame: &ArgumentFrame) -> Result<Tensor> {
        let _ = frame;
        Err(EngineError::HookNotImplemented(Hook::Message))
    }

    /// Reduces messages per target node.
    fn aggregate(&self, inputs: &Tensor, frame: &ArgumentFrame) -> Result<Tensor> {
        let _ = (inputs, frame);
        Err(EngineError::HookNotImplemented(Hook::Aggregate))
    }

    /// Computes the messages of one degree bucket.
    fn partial_message(&self, frame: &ArgumentFrame) -> Result<Tensor> {
        let _ = frame;
        Err(EngineError::HookNotImplemented(Hook::PartialMessage))
    }

    /// Reduces the messages of one degree bucket over the neighbour axis.
    fn partial_aggregate(&self, inputs: &Tensor, frame: &ArgumentFrame) -> Result<Tensor> {
        let _ = (inputs, frame);
        Err(EngineError::HookNotImplemented(Hook::PartialAggregate))
    }

    /// Transforms the aggregated result.
    fn update(&self, inputs: Tensor, frame: &ArgumentFrame) -> Result<Tensor> {
        let _ = frame;
        Ok(inputs)
    }
}
