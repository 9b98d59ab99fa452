//! Execution strategies and the per-format strategy cache.

use core::fmt;
use core::str::FromStr;
use core::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::adjacency::AdjacencyFormat;
use crate::error::{EngineError, Result};

/// How one message passing call is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One hook computes message and aggregation together.
    Fused,
    /// Per-edge messages followed by a grouped reduction.
    Sparse,
    /// Degree-bucketed messages and reductions.
    Partial,
}

impl Strategy {
    /// Returns the string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fused => "fused",
            Self::Sparse => "sparse",
            Self::Partial => "partial",
        }
    }
}

impl FromStr for Strategy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fused" => Ok(Self::Fused),
            "sparse" => Ok(Self::Sparse),
            "partial" => Ok(Self::Partial),
            other => Err(EngineError::config(format!(
                "unknown strategy '{other}', expected fused, sparse or partial"
            ))),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one cache slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Slot {
    #[default]
    Unresolved,
    Resolved(Strategy),
}

/// Strategy decisions keyed by adjacency format.
///
/// One slot per format. A slot is written at most once; later lookups return
/// the stored strategy without re-deriving it, even if the inputs to the
/// derivation could have changed.
#[derive(Debug, Default)]
pub(crate) struct StrategyCache {
    slots: Mutex<[Slot; AdjacencyFormat::COUNT]>,
    derivations: AtomicUsize,
}

impl StrategyCache {
    /// Returns the cached strategy for `format`, if resolved.
    pub(crate) fn get(&self, format: AdjacencyFormat) -> Option<Strategy> {
        match self.slots.lock()[format.slot()] {
            Slot::Resolved(strategy) => Some(strategy),
            Slot::Unresolved => None,
        }
    }

    /// Returns the cached strategy, deriving and storing it on first use.
    ///
    /// The boolean is `true` when the value came from the cache. A failed
    /// derivation leaves the slot unresolved.
    pub(crate) fn get_or_derive<F>(&self, format: AdjacencyFormat, derive: F) -> Result<(Strategy, bool)>
    where
        F: FnOnce() -> Result<Strategy>,
    {
        let mut slots = self.slots.lock();
        if let Slot::Resolved(strategy) = slots[format.slot()] {
            return Ok((strategy, true));
        }

        self.derivations.fetch_add(1, Ordering::Relaxed);
        let strategy = derive()?;
        slots[format.slot()] = Slot::Resolved(strategy);
        Ok((strategy, false))
    }

    /// Returns how many times a derivation ran.
    pub(crate) fn derivations(&self) -> usize {
        self.derivations.load(Ordering::Relaxed)
    }
}
