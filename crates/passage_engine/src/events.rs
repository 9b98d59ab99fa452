//! Events emitted while a message passing call runs.
//!
//! Observers receive `&PropagateEvent` and match on the variants they care
//! about:
//!
//! ```
//! use passage_engine::events::PropagateEvent;
//!
//! fn handle_event(event: &PropagateEvent) {
//!     match event {
//!         PropagateEvent::StrategyResolved { strategy, cached, .. } => {
//!             println!("running {strategy} (cached: {cached})");
//!         }
//!         PropagateEvent::Failed { stage, error } => {
//!             println!("failed after {stage}: {error}");
//!         }
//!         _ => {}
//!     }
//! }
//! ```

use core::fmt;
use core::time::Duration;

use crate::adjacency::AdjacencyFormat;
use crate::layer::Hook;
use crate::strategy::Strategy;

/// Progress of one call through the propagation state machine.
///
/// `Start → Classified → StrategyResolved → Validated → Dispatched → Updated
/// → Done`. A failure at any point ends the call; the stage reached so far is
/// reported with the error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Nothing has run yet.
    #[default]
    Start,
    /// The adjacency format is known.
    Classified,
    /// The execution strategy is known.
    StrategyResolved,
    /// Flow and explain constraints hold.
    Validated,
    /// The aggregate has been computed.
    Dispatched,
    /// The update hook has run.
    Updated,
    /// The call returned a result.
    Done,
}

impl Stage {
    /// Returns the string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Classified => "classified",
            Self::StrategyResolved => "strategy_resolved",
            Self::Validated => "validated",
            Self::Dispatched => "dispatched",
            Self::Updated => "updated",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A step of one `propagate` call.
#[derive(Debug, Clone, PartialEq)]
pub enum PropagateEvent {
    /// The adjacency was classified.
    Classified {
        /// The detected format.
        format: AdjacencyFormat,
    },

    /// The execution strategy was chosen.
    StrategyResolved {
        /// The detected format.
        format: AdjacencyFormat,
        /// The chosen strategy.
        strategy: Strategy,
        /// Whether the strategy came from the per-format cache.
        cached: bool,
    },

    /// Flow and explain constraints were checked.
    Validated {
        /// The strategy that will run, after explain overrides.
        strategy: Strategy,
    },

    /// A layer hook is about to be invoked.
    HookInvoked {
        /// The hook.
        hook: Hook,
    },

    /// The aggregate was computed.
    Dispatched {
        /// The strategy that ran.
        strategy: Strategy,
    },

    /// The update hook returned.
    Updated,

    /// The call finished.
    Completed {
        /// Wall time of the call.
        duration: Duration,
    },

    /// The call failed.
    Failed {
        /// The last stage reached before the failure.
        stage: Stage,
        /// The error message.
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names() {
        assert_eq!(Stage::default(), Stage::Start);
        assert_eq!(Stage::StrategyResolved.to_string(), "strategy_resolved");
    }
}
