//! Registry of propagation observers.
//!
//! Observers react to [`PropagateEvent`]s without influencing the call. Use
//! them for logging, metrics or test assertions:
//!
//! ```
//! use passage_engine::events::PropagateEvent;
//! use passage_engine::observers::Observers;
//!
//! let observers = Observers::new();
//! observers
//!     .register("logger", |event: &PropagateEvent| {
//!         if let PropagateEvent::Failed { error, .. } = event {
//!             eprintln!("propagate failed: {error}");
//!         }
//!     })
//!     .unwrap();
//! assert_eq!(observers.len(), 1);
//! ```

use core::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::events::PropagateEvent;

// ─────────────────────────────────────────────────────────────────────────────
// ObserverError
// ─────────────────────────────────────────────────────────────────────────────

/// Error returned when registering an observer fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverError {
    /// An observer with this name is already registered.
    DuplicateName {
        /// The rejected name.
        name: String,
    },
}

impl fmt::Display for ObserverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObserverError::DuplicateName { name } => {
                write!(f, "observer '{name}' is already registered")
            }
        }
    }
}

impl core::error::Error for ObserverError {}

// ─────────────────────────────────────────────────────────────────────────────
// Observers
// ─────────────────────────────────────────────────────────────────────────────

type Callback = Arc<dyn Fn(&PropagateEvent) + Send + Sync>;

struct Entry {
    name: String,
    callback: Callback,
}

/// Named callbacks invoked for every [`PropagateEvent`] of an engine.
///
/// Observers run in registration order on the thread that calls
/// `propagate`.
#[derive(Default)]
pub struct Observers {
    entries: RwLock<Vec<Entry>>,
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("names", &self.names())
            .finish()
    }
}

impl Observers {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer under a unique name.
    ///
    /// # Errors
    ///
    /// Returns [`ObserverError::DuplicateName`] if `name` is taken.
    pub fn register<F>(&self, name: impl Into<String>, observer: F) -> Result<&Self, ObserverError>
    where
        F: Fn(&PropagateEvent) + Send + Sync + 'static,
    {
        let name = name.into();
        let mut entries = self.entries.write();
        if entries.iter().any(|entry| entry.name == name) {
            return Err(ObserverError::DuplicateName { name });
        }
        entries.push(Entry {
            name,
            callback: Arc::new(observer),
        });
        Ok(self)
    }

    /// Removes an observer, returning whether it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|entry| entry.name != name);
        entries.len() != before
    }

    /// Returns the registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Returns the number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no observer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Delivers an event to every observer.
    pub(crate) fn notify(&self, event: &PropagateEvent) {
        // Snapshot so observers may register or unregister while running.
        let callbacks: Vec<Callback> = self
            .entries
            .read()
            .iter()
            .map(|entry| Arc::clone(&entry.callback))
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }
}
