//! Engine configuration.
//!
//! [`MessagePassingConfig`] is set once when an engine is built and is
//! immutable afterwards. It can be assembled with the builder methods or read
//! from JSON, where every option uses its string form:
//!
//! ```
//! use passage_engine::config::{Aggregation, Flow, MessagePassingConfig};
//!
//! let config = MessagePassingConfig::from_json(
//!     r#"{ "aggr": "mean", "flow": "target_to_source", "node_dim": 0 }"#,
//! )
//! .unwrap();
//! assert_eq!(config.aggr, Some(Aggregation::Mean));
//! assert_eq!(config.flow, Flow::TargetToSource);
//! ```

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::strategy::Strategy;

// ─────────────────────────────────────────────────────────────────────────────
// Aggregation
// ─────────────────────────────────────────────────────────────────────────────

/// Reduction applied to messages grouped by target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Sum of messages.
    Add,
    /// Sum of messages (alias of `Add`).
    Sum,
    /// Mean of messages; nodes without messages receive zero.
    Mean,
    /// Elementwise maximum; nodes without messages receive zero.
    Max,
}

impl Aggregation {
    /// Returns the string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Max => "max",
        }
    }

    /// Parses an optional aggregation, where `"none"` means no aggregation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] for unknown names.
    pub fn parse_optional(s: &str) -> Result<Option<Self>> {
        match s {
            "none" => Ok(None),
            other => other.parse().map(Some),
        }
    }
}

impl FromStr for Aggregation {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "add" => Ok(Self::Add),
            "sum" => Ok(Self::Sum),
            "mean" => Ok(Self::Mean),
            "max" => Ok(Self::Max),
            other => Err(EngineError::config(format!(
                "unknown aggregation '{other}', expected one of add, sum, mean, max, none"
            ))),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Flow
// ─────────────────────────────────────────────────────────────────────────────

/// Which endpoint of an edge sends the message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    /// Row 0 of an edge list holds sources, row 1 targets.
    #[default]
    SourceToTarget,
    /// Row 0 of an edge list holds targets, row 1 sources.
    TargetToSource,
}

impl Flow {
    /// Returns the string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SourceToTarget => "source_to_target",
            Self::TargetToSource => "target_to_source",
        }
    }

    /// Returns the edge-list rows `(i, j)` holding targets and sources.
    #[must_use]
    pub fn rows(self) -> (usize, usize) {
        match self {
            Self::SourceToTarget => (1, 0),
            Self::TargetToSource => (0, 1),
        }
    }
}

impl FromStr for Flow {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "source_to_target" => Ok(Self::SourceToTarget),
            "target_to_source" => Ok(Self::TargetToSource),
            other => Err(EngineError::config(format!(
                "unknown flow '{other}', expected source_to_target or target_to_source"
            ))),
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MessagePassingConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration of a [`MessagePassing`](crate::MessagePassing) engine.
///
/// # Fields
///
/// - `aggr` - Default reduction, used when the layer does not implement
///   `aggregate` / `partial_aggregate`. `None` disables the fallback.
/// - `flow` - Message direction for edge lists.
/// - `strategy` - Forced execution strategy for matrix adjacencies.
/// - `node_dim` - Axis of node features that indexes nodes. Must be ≥ 0.
/// - `partial_max_deg` - Degree at which rows go into the overflow bucket of
///   the partial strategy; `-1` disables the cutoff.
/// - `partial_binning` - Whether partial-strategy buckets group degrees into
///   power-of-two bins instead of exact degrees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessagePassingConfig {
    /// Default reduction.
    pub aggr: Option<Aggregation>,
    /// Message direction.
    pub flow: Flow,
    /// Forced strategy.
    pub strategy: Option<Strategy>,
    /// Node axis of feature tensors.
    pub node_dim: i64,
    /// Overflow-bucket cutoff, `-1` for none.
    pub partial_max_deg: i64,
    /// Power-of-two degree binning.
    pub partial_binning: bool,
}

impl Default for MessagePassingConfig {
    fn default() -> Self {
        Self {
            aggr: Some(Aggregation::Add),
            flow: Flow::SourceToTarget,
            strategy: None,
            node_dim: 0,
            partial_max_deg: -1,
            partial_binning: true,
        }
    }
}

/// String-typed form read from JSON before validation.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default = "RawConfig::default_aggr")]
    aggr: Option<String>,
    #[serde(default)]
    flow: Option<String>,
    #[serde(default, alias = "format")]
    strategy: Option<String>,
    #[serde(default)]
    node_dim: Option<i64>,
    #[serde(default)]
    partial_max_deg: Option<i64>,
    #[serde(default)]
    partial_binning: Option<bool>,
}

impl RawConfig {
    fn default_aggr() -> Option<String> {
        Some("add".to_string())
    }
}

impl MessagePassingConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default reduction.
    #[must_use]
    pub fn with_aggr(mut self, aggr: Option<Aggregation>) -> Self {
        self.aggr = aggr;
        self
    }

    /// Sets the message direction.
    #[must_use]
    pub fn with_flow(mut self, flow: Flow) -> Self {
        self.flow = flow;
        self
    }

    /// Forces an execution strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Sets the node axis of feature tensors.
    #[must_use]
    pub fn with_node_dim(mut self, node_dim: i64) -> Self {
        self.node_dim = node_dim;
        self
    }

    /// Sets the overflow-bucket cutoff of the partial strategy.
    #[must_use]
    pub fn with_partial_max_deg(mut self, max_deg: i64) -> Self {
        self.partial_max_deg = max_deg;
        self
    }

    /// Enables or disables power-of-two degree binning.
    #[must_use]
    pub fn with_partial_binning(mut self, enabled: bool) -> Self {
        self.partial_binning = enabled;
        self
    }

    /// Checks the numeric options.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if `node_dim` is negative or
    /// `partial_max_deg` is neither `-1` nor positive.
    pub fn validate(&self) -> Result<()> {
        if self.node_dim < 0 {
            return Err(EngineError::config(format!(
                "node_dim must be non-negative, got {}",
                self.node_dim
            )));
        }
        if self.partial_max_deg != -1 && self.partial_max_deg < 1 {
            return Err(EngineError::config(format!(
                "partial_max_deg must be -1 or positive, got {}",
                self.partial_max_deg
            )));
        }
        Ok(())
    }

    /// Reads and validates a configuration from JSON.
    ///
    /// Missing keys keep their defaults; `"aggr": null` or `"aggr": "none"`
    /// disables the default reduction. `"format"` is accepted as an alias of
    /// `"strategy"`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] for malformed JSON, unknown keys,
    /// unknown option values, or values rejected by [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(json)
            .map_err(|err| EngineError::config(format!("malformed configuration: {err}")))?;

        let defaults = Self::default();
        let config = Self {
            aggr: match raw.aggr.as_deref() {
                Some(name) => Aggregation::parse_optional(name)?,
                None => None,
            },
            flow: match raw.flow.as_deref() {
                Some(name) => name.parse()?,
                None => defaults.flow,
            },
            strategy: raw
                .strategy
                .as_deref()
                .map(str::parse::<Strategy>)
                .transpose()?,
            node_dim: raw.node_dim.unwrap_or(defaults.node_dim),
            partial_max_deg: raw.partial_max_deg.unwrap_or(defaults.partial_max_deg),
            partial_binning: raw.partial_binning.unwrap_or(defaults.partial_binning),
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns `node_dim` as an axis index.
    pub(crate) fn node_axis(&self) -> usize {
        usize::try_from(self.node_dim).unwrap_or_default()
    }

    /// Returns the overflow cutoff, if any.
    pub(crate) fn max_degree(&self) -> Option<usize> {
        usize::try_from(self.partial_max_deg).ok()
    }
}
