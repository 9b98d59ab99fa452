//! The message passing engine.
//!
//! [`MessagePassing`] wraps a [`Layer`] and runs one message passing step per
//! [`propagate`](MessagePassing::propagate) call:
//!
//! 1. classify the adjacency ([`AdjacencyFormat`])
//! 2. resolve the execution [`Strategy`], cached per format
//! 3. check flow and explain constraints
//! 4. collect the value pool and lift `_i` / `_j` features
//! 5. invoke the strategy's hooks with frames built by the [`Inspector`]
//! 6. invoke `update` on the aggregate
//!
//! # Strategy resolution
//!
//! | Adjacency | Resolution order |
//! |-----------|------------------|
//! | edge list | always `sparse` |
//! | sparse matrix | forced, else `fused`, `sparse`, `partial` by capability |
//! | dense matrix | forced, else `partial` by capability |
//!
//! A forced strategy is taken as is. If the layer lacks a hook the strategy
//! needs, the call fails when that hook is invoked. Dense input is converted
//! to row storage for whichever strategy runs.

use core::fmt;
use std::collections::BTreeSet;
use std::time::Instant;

use candle_core::Tensor;
use passage_inspect::{ArgumentFrame, Inspector, Value, ValuePool};
use tracing::field;

use crate::adjacency::{self, AdjacencyFormat};
use crate::collect::{Collector, device_of};
use crate::config::{Flow, MessagePassingConfig};
use crate::error::{EngineError, Result};
use crate::events::{PropagateEvent, Stage};
use crate::explain::Explain;
use crate::layer::{Hook, HookTable, Layer};
use crate::observers::Observers;
use crate::partial::{self, degree_buckets};
use crate::scatter::scatter;
use crate::sparse::SparseTensor;
use crate::strategy::{Strategy, StrategyCache};

/// Names the engine derives on top of the inspector's reserved set.
pub const ENGINE_RESERVED: [&str; 1] = ["neighbor_mask"];

/// A layer wrapped with its hook signatures, configuration and strategy cache.
///
/// Signatures are recorded once in [`new`](Self::new). The strategy for each
/// adjacency format is derived on first use and then reused for the life of
/// the engine.
pub struct MessagePassing<L> {
    layer: L,
    config: MessagePassingConfig,
    hooks: HookTable,
    inspector: Inspector,
    cache: StrategyCache,
    observers: Observers,
}

impl<L: Layer> fmt::Debug for MessagePassing<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagePassing")
            .field("layer", &self.layer.name())
            .field("config", &self.config)
            .field("hooks", &self.hooks.implemented().collect::<Vec<_>>())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<L: Layer> fmt::Display for MessagePassing<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let aggr = self.config.aggr.map_or("none", |aggr| aggr.as_str());
        write!(
            f,
            "{}(aggr={aggr}, flow={})",
            self.layer.name(),
            self.config.flow
        )
    }
}

impl<L: Layer> MessagePassing<L> {
    /// Wraps `layer` after validating `config`.
    ///
    /// Registers one signature per hook: the layer's declaration for hooks it
    /// implements, the base signature otherwise. The bound input of
    /// `aggregate`, `partial_aggregate` and `update` is dropped from the
    /// record.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if `config` is invalid.
    pub fn new(layer: L, config: MessagePassingConfig) -> Result<Self> {
        config.validate()?;

        let hooks = layer.hooks();
        let mut inspector = Inspector::new().with_reserved(ENGINE_RESERVED);
        for hook in Hook::ALL {
            let signature = hooks
                .signature(hook)
                .cloned()
                .unwrap_or_else(|| hook.base_signature());
            inspector.register(signature, hook.binds_inputs());
            if hooks.is_implemented(hook) {
                inspector.mark_overridden(hook.name());
            }
        }

        tracing::debug!(
            layer = layer.name(),
            hooks = ?hooks.implemented().map(Hook::name).collect::<Vec<_>>(),
            aggr = ?config.aggr,
            flow = %config.flow,
            "created message passing engine"
        );

        Ok(Self {
            layer,
            config,
            hooks,
            inspector,
            cache: StrategyCache::default(),
            observers: Observers::new(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the wrapped layer.
    #[must_use]
    pub fn layer(&self) -> &L {
        &self.layer
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MessagePassingConfig {
        &self.config
    }

    /// Returns the signature registry.
    #[must_use]
    pub fn inspector(&self) -> &Inspector {
        &self.inspector
    }

    /// Returns the observer registry.
    #[must_use]
    pub fn observers(&self) -> &Observers {
        &self.observers
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Capabilities
    // ─────────────────────────────────────────────────────────────────────────

    fn implements(&self, hook: Hook) -> bool {
        self.inspector.is_overridden(hook.name())
    }

    /// Returns `true` if the layer implements `message_and_aggregate`.
    #[must_use]
    pub fn supports_fused(&self) -> bool {
        self.implements(Hook::MessageAndAggregate)
    }

    /// Returns `true` if the layer implements `message` and either implements
    /// `aggregate` or an aggregation is configured.
    #[must_use]
    pub fn supports_sparse(&self) -> bool {
        self.implements(Hook::Message)
            && (self.implements(Hook::Aggregate) || self.config.aggr.is_some())
    }

    /// Returns `true` if the layer implements `partial_message` and either
    /// implements `partial_aggregate` or an aggregation is configured.
    #[must_use]
    pub fn supports_partial(&self) -> bool {
        self.implements(Hook::PartialMessage)
            && (self.implements(Hook::PartialAggregate) || self.config.aggr.is_some())
    }

    fn supports(&self, strategy: Strategy) -> bool {
        match strategy {
            Strategy::Fused => self.supports_fused(),
            Strategy::Sparse => self.supports_sparse(),
            Strategy::Partial => self.supports_partial(),
        }
    }

    /// Returns the named inputs a caller may supply for `strategy`: the
    /// parameters of the hooks that strategy invokes, minus reserved names.
    ///
    /// Names ending in `_i` or `_j` can also be satisfied by their stem.
    #[must_use]
    pub fn required_names(&self, strategy: Strategy) -> BTreeSet<String> {
        let hooks: Vec<&str> = hooks_for(strategy).iter().map(|hook| hook.name()).collect();
        self.inspector.required_names(Some(&hooks))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Strategy resolution
    // ─────────────────────────────────────────────────────────────────────────

    /// Classifies an adjacency value.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidAdjacency`] for unrecognized values.
    pub fn classify(&self, adjacency: &Value) -> Result<AdjacencyFormat> {
        adjacency::classify(adjacency)
    }

    /// Returns the strategy for `format`, deriving and caching it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnresolvedStrategy`] if no strategy applies. A
    /// failed resolution is not cached.
    pub fn resolve_strategy(&self, format: AdjacencyFormat) -> Result<Strategy> {
        self.resolve(format).map(|(strategy, _)| strategy)
    }

    /// Returns the cached strategy for `format`, if resolved.
    #[must_use]
    pub fn cached_strategy(&self, format: AdjacencyFormat) -> Option<Strategy> {
        self.cache.get(format)
    }

    /// Returns how many times a strategy was derived rather than read from
    /// the cache.
    #[must_use]
    pub fn strategy_derivations(&self) -> usize {
        self.cache.derivations()
    }

    fn resolve(&self, format: AdjacencyFormat) -> Result<(Strategy, bool)> {
        let (strategy, cached) = self
            .cache
            .get_or_derive(format, || self.derive_strategy(format))?;
        if cached {
            tracing::trace!(%format, %strategy, "strategy cache hit");
        } else {
            tracing::debug!(%format, %strategy, "derived strategy");
        }
        Ok((strategy, cached))
    }

    fn derive_strategy(&self, format: AdjacencyFormat) -> Result<Strategy> {
        let unresolved = EngineError::UnresolvedStrategy { format };

        if format == AdjacencyFormat::EdgeList {
            return Ok(Strategy::Sparse);
        }

        if let Some(forced) = self.config.strategy {
            if !self.supports(forced) {
                tracing::debug!(%format, %forced, "forced strategy not supported by the layer");
            }
            return Ok(forced);
        }

        let candidates: &[Strategy] = match format {
            AdjacencyFormat::SparseMatrix => {
                &[Strategy::Fused, Strategy::Sparse, Strategy::Partial]
            }
            AdjacencyFormat::DenseMatrix => &[Strategy::Partial],
            AdjacencyFormat::EdgeList => &[Strategy::Sparse],
        };
        candidates
            .iter()
            .copied()
            .find(|strategy| self.supports(*strategy))
            .ok_or(unresolved)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Propagation
    // ─────────────────────────────────────────────────────────────────────────

    /// Runs one message passing step.
    ///
    /// # Arguments
    ///
    /// * `adjacency` - An edge list, [`SparseTensor`] or dense matrix.
    /// * `size` - `(size_src, size_dst)` for edge lists; optional, and if
    ///   given for a matrix it must match the matrix shape.
    /// * `values` - Named inputs for the hooks (`x`, `edge_weight`, ...).
    /// * `explain` - Forces the sparse strategy and masks messages.
    ///
    /// The output has `size_i` rows along the node axis. For matrices that
    /// is the row count. For edge lists it comes from `size`, else from a
    /// lifted `_i` / `_j` feature (an unknown side takes the other side's
    /// count). Without either, it is the largest target index plus one, so
    /// pass `size` when trailing nodes without incoming edges must appear.
    ///
    /// # Errors
    ///
    /// Any failure aborts the call without a partial result:
    /// [`InvalidAdjacency`](EngineError::InvalidAdjacency),
    /// [`UnresolvedStrategy`](EngineError::UnresolvedStrategy),
    /// [`ExplainUnsupported`](EngineError::ExplainUnsupported),
    /// [`InvalidFlow`](EngineError::InvalidFlow),
    /// [`Inspect`](EngineError::Inspect) for missing arguments, and errors
    /// raised by the layer's hooks or the tensor backend.
    pub fn propagate(
        &self,
        adjacency: &Value,
        size: Option<(usize, usize)>,
        values: &ValuePool,
        explain: Option<&Explain>,
    ) -> Result<Tensor> {
        let span = tracing::debug_span!(
            "propagate",
            layer = self.layer.name(),
            format = field::Empty,
            strategy = field::Empty,
        );
        let _enter = span.enter();
        let started = Instant::now();

        let mut stage = Stage::Start;
        match self.run(adjacency, size, values, explain, &mut stage) {
            Ok(out) => {
                self.observers.notify(&PropagateEvent::Completed {
                    duration: started.elapsed(),
                });
                Ok(out)
            }
            Err(err) => {
                tracing::warn!(%stage, error = %err, "propagate failed");
                self.observers.notify(&PropagateEvent::Failed {
                    stage,
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn run(
        &self,
        adjacency: &Value,
        size: Option<(usize, usize)>,
        values: &ValuePool,
        explain: Option<&Explain>,
        stage: &mut Stage,
    ) -> Result<Tensor> {
        let span = tracing::Span::current();

        let format = adjacency::classify(adjacency)?;
        span.record("format", format.as_str());
        self.advance(stage, Stage::Classified, PropagateEvent::Classified { format });

        let (resolved, cached) = self.resolve(format)?;
        self.advance(
            stage,
            Stage::StrategyResolved,
            PropagateEvent::StrategyResolved {
                format,
                strategy: resolved,
                cached,
            },
        );

        let strategy = match explain {
            Some(_) if format == AdjacencyFormat::DenseMatrix => {
                return Err(EngineError::ExplainUnsupported {
                    reason: "dense adjacency has no per-edge messages",
                });
            }
            Some(_) if !self.supports_sparse() => {
                return Err(EngineError::ExplainUnsupported {
                    reason: "the layer does not support the sparse strategy",
                });
            }
            Some(_) => Strategy::Sparse,
            None => resolved,
        };
        if format.is_matrix() && self.config.flow == Flow::TargetToSource {
            return Err(EngineError::InvalidFlow { format });
        }
        span.record("strategy", strategy.as_str());
        self.advance(stage, Stage::Validated, PropagateEvent::Validated { strategy });

        let (aggregated, pool) = match strategy {
            Strategy::Fused => self.run_fused(adjacency, format, size, values)?,
            Strategy::Sparse => self.run_sparse(adjacency, format, size, values, explain)?,
            Strategy::Partial => self.run_partial(adjacency, format, size, values)?,
        };
        self.advance(stage, Stage::Dispatched, PropagateEvent::Dispatched { strategy });

        let frame = self.frame(Hook::Update, &pool)?;
        let out = self.layer.update(aggregated, &frame)?;
        self.advance(stage, Stage::Updated, PropagateEvent::Updated);

        *stage = Stage::Done;
        Ok(out)
    }

    fn advance(&self, stage: &mut Stage, next: Stage, event: PropagateEvent) {
        *stage = next;
        self.observers.notify(&event);
    }

    /// Builds the frame of `hook` and announces the invocation.
    fn frame(&self, hook: Hook, pool: &ValuePool) -> Result<ArgumentFrame> {
        let frame = self.inspector.build_frame(hook.name(), pool)?;
        self.observers.notify(&PropagateEvent::HookInvoked { hook });
        Ok(frame)
    }

    fn collector(&self, strategy: Strategy) -> Collector {
        Collector::new(
            self.config.node_axis(),
            self.config.flow,
            self.required_names(strategy),
        )
    }

    fn run_fused(
        &self,
        adjacency: &Value,
        format: AdjacencyFormat,
        size: Option<(usize, usize)>,
        values: &ValuePool,
    ) -> Result<(Tensor, ValuePool)> {
        let (adj_t, sparse) = row_storage(adjacency, format)?;
        let pool = self
            .collector(Strategy::Fused)
            .sparse_matrix(&adj_t, &sparse, size, values, false)?;

        let frame = self.frame(Hook::MessageAndAggregate, &pool)?;
        let out = self.layer.message_and_aggregate(&frame)?;
        Ok((out, pool))
    }

    fn run_sparse(
        &self,
        adjacency: &Value,
        format: AdjacencyFormat,
        size: Option<(usize, usize)>,
        values: &ValuePool,
        explain: Option<&Explain>,
    ) -> Result<(Tensor, ValuePool)> {
        let collector = self.collector(Strategy::Sparse);
        let mut pool = match format {
            AdjacencyFormat::EdgeList => {
                let edge_index = adjacency
                    .downcast_ref::<Tensor>()
                    .ok_or(EngineError::UnresolvedStrategy { format })?;
                collector.edge_list(edge_index, size, values)?
            }
            AdjacencyFormat::SparseMatrix | AdjacencyFormat::DenseMatrix => {
                let (adj_t, sparse) = row_storage(adjacency, format)?;
                collector.sparse_matrix(&adj_t, &sparse, size, values, true)?
            }
        };
        if let Some(mask) = explain.and_then(|explain| explain.edge_mask.as_ref()) {
            pool.insert("edge_mask", mask.clone());
        }

        let frame = self.frame(Hook::Message, &pool)?;
        let mut messages = self.layer.message(&frame)?;
        if let Some(explain) = explain {
            messages = explain.apply(messages, self.config.node_axis())?;
        }

        let aggregated = if self.implements(Hook::Aggregate) {
            let frame = self.frame(Hook::Aggregate, &pool)?;
            self.layer.aggregate(&messages, &frame)?
        } else {
            let aggr = self
                .config
                .aggr
                .ok_or(EngineError::HookNotImplemented(Hook::Aggregate))?;
            let index = pool.get_as::<Tensor>("index").ok_or_else(|| {
                passage_inspect::InspectError::missing_argument(Hook::Aggregate.name(), "index")
            })?;
            let dim_size = pool.get_as::<usize>("dim_size").copied();
            scatter(&messages, index, self.config.node_axis(), dim_size, aggr)?
        };
        Ok((aggregated, pool))
    }

    fn run_partial(
        &self,
        adjacency: &Value,
        format: AdjacencyFormat,
        size: Option<(usize, usize)>,
        values: &ValuePool,
    ) -> Result<(Tensor, ValuePool)> {
        let (adj_t, sparse) = row_storage(adjacency, format)?;

        let buckets = degree_buckets(
            &sparse,
            self.config.partial_binning,
            self.config.max_degree(),
        )?;
        tracing::debug!(
            buckets = buckets.len(),
            widths = ?buckets.iter().map(partial::DegreeBucket::width).collect::<Vec<_>>(),
            "bucketed rows by degree"
        );

        let collector = self.collector(Strategy::Partial);
        let base = collector.sparse_matrix(&adj_t, &sparse, size, values, false)?;
        let device = device_of(values, &sparse);
        let node_axis = self.config.node_axis();
        let rows = sparse.sparse_sizes().0;

        let mut out = None;
        for bucket in &buckets {
            let views = bucket.views(&sparse, &device)?;
            let pool = collector.bucket(&base, &views)?;

            let frame = self.frame(Hook::PartialMessage, &pool)?;
            let messages = self.layer.partial_message(&frame)?;

            let reduced = if self.implements(Hook::PartialAggregate) {
                let frame = self.frame(Hook::PartialAggregate, &pool)?;
                self.layer.partial_aggregate(&messages, &frame)?
            } else {
                let aggr = self
                    .config
                    .aggr
                    .ok_or(EngineError::HookNotImplemented(Hook::PartialAggregate))?;
                partial::masked_reduce(&messages, &views.neighbor_mask, node_axis, aggr)?
            };
            out = Some(partial::scatter_rows(out, &reduced, &views.index, node_axis, rows)?);
        }

        let aggregated = out.ok_or(EngineError::EmptyAdjacency)?;
        Ok((aggregated, base))
    }
}

/// Hooks a strategy invokes, in order.
fn hooks_for(strategy: Strategy) -> &'static [Hook] {
    match strategy {
        Strategy::Fused => &[Hook::MessageAndAggregate, Hook::Update],
        Strategy::Sparse => &[Hook::Message, Hook::Aggregate, Hook::Update],
        Strategy::Partial => &[Hook::PartialMessage, Hook::PartialAggregate, Hook::Update],
    }
}

/// Returns the matrix as row storage together with the `adj_t` value hooks
/// receive.
///
/// Dense input is converted once per call; `adj_t` then holds the converted
/// matrix.
fn row_storage(adjacency: &Value, format: AdjacencyFormat) -> Result<(Value, SparseTensor)> {
    match format {
        AdjacencyFormat::SparseMatrix => {
            let sparse = adjacency
                .downcast_ref::<SparseTensor>()
                .ok_or(EngineError::UnresolvedStrategy { format })?;
            Ok((adjacency.clone(), sparse.clone()))
        }
        AdjacencyFormat::DenseMatrix => {
            let dense = adjacency
                .downcast_ref::<Tensor>()
                .ok_or(EngineError::UnresolvedStrategy { format })?;
            let sparse = SparseTensor::from_dense(dense)?;
            Ok((Value::new(sparse.clone()), sparse))
        }
        AdjacencyFormat::EdgeList => Err(EngineError::UnresolvedStrategy { format }),
    }
}
