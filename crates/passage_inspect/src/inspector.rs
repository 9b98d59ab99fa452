//! Signature registry and frame builder.

use crate::error::InspectError;
use crate::frame::ArgumentFrame;
use crate::signature::HookSignature;
use crate::value::{Value, ValuePool};
use hashbrown::HashSet;
use indexmap::IndexMap;
use std::collections::BTreeSet;

/// Parameter names owned by the framework.
///
/// These are derived by the engine for every call and are never part of what
/// a caller must supply, even when a hook declares them.
pub const RESERVED_NAMES: [&str; 9] = [
    "adj_t",
    "edge_index_i",
    "edge_index_j",
    "size_i",
    "size_j",
    "ptr",
    "index",
    "dim_size",
    "edge_mask",
];

/// Registry of hook signatures.
///
/// Built once when a layer is wrapped; afterwards only read. Frame lookup is
/// by name, while recorded parameter order is kept so frames are assembled
/// deterministically.
#[derive(Debug, Clone)]
pub struct Inspector {
    signatures: IndexMap<String, HookSignature>,
    overridden: HashSet<String>,
    reserved: HashSet<String>,
}

impl Default for Inspector {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector {
    /// Creates an inspector with the default [`RESERVED_NAMES`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            signatures: IndexMap::new(),
            overridden: HashSet::new(),
            reserved: RESERVED_NAMES.iter().map(|name| (*name).to_string()).collect(),
        }
    }

    /// Adds further framework-owned names to the reserved set.
    #[must_use]
    pub fn with_reserved<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved.extend(names.into_iter().map(Into::into));
        self
    }

    /// Records a hook's parameters.
    ///
    /// With `drop_first`, the leading parameter (the positionally bound input)
    /// is discarded from the record. Registering the same hook name again
    /// replaces the previous record.
    pub fn register(&mut self, mut signature: HookSignature, drop_first: bool) {
        if drop_first {
            signature.pop_first();
        }
        tracing::trace!(
            hook = signature.name(),
            params = ?signature.param_names().collect::<Vec<_>>(),
            "registered hook signature"
        );
        self.signatures
            .insert(signature.name().to_string(), signature);
    }

    /// Marks a hook as implemented by the concrete layer.
    pub fn mark_overridden(&mut self, hook: impl Into<String>) {
        self.overridden.insert(hook.into());
    }

    /// Returns whether the concrete layer implements `hook`.
    #[must_use]
    pub fn is_overridden(&self, hook: &str) -> bool {
        self.overridden.contains(hook)
    }

    /// Returns whether `name` is framework-owned.
    #[must_use]
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(name)
    }

    /// Returns the recorded signature of `hook`.
    #[must_use]
    pub fn signature(&self, hook: &str) -> Option<&HookSignature> {
        self.signatures.get(hook)
    }

    /// Returns the registered hook names in registration order.
    pub fn hooks(&self) -> impl Iterator<Item = &str> {
        self.signatures.keys().map(String::as_str)
    }

    /// Returns the union of parameter names of the given hooks, minus the
    /// reserved names.
    ///
    /// With `None`, every registered hook is considered. Names of hooks that
    /// were never registered are ignored.
    #[must_use]
    pub fn required_names(&self, hooks: Option<&[&str]>) -> BTreeSet<String> {
        let selected: Vec<&HookSignature> = match hooks {
            Some(names) => names
                .iter()
                .filter_map(|name| self.signatures.get(*name))
                .collect(),
            None => self.signatures.values().collect(),
        };

        selected
            .into_iter()
            .flat_map(HookSignature::param_names)
            .filter(|name| !self.reserved.contains(*name))
            .map(str::to_string)
            .collect()
    }

    /// Builds the argument frame of `hook` from a pool of values.
    ///
    /// Every recorded parameter takes the pool value if present, else its
    /// default. The frame contains exactly the hook's parameters.
    ///
    /// # Errors
    ///
    /// - [`InspectError::UnknownHook`] if `hook` was never registered.
    /// - [`InspectError::MissingArgument`] if a parameter is absent from the
    ///   pool and has no default.
    pub fn build_frame(&self, hook: &str, pool: &ValuePool) -> Result<ArgumentFrame, InspectError> {
        let signature = self
            .signatures
            .get(hook)
            .ok_or_else(|| InspectError::UnknownHook(hook.to_string()))?;

        let mut values: IndexMap<String, Value> = IndexMap::with_capacity(signature.len());
        for (name, default) in signature.params() {
            let value = match (pool.get(name), default) {
                (Some(value), _) => value.clone(),
                (None, Some(default)) => default.clone(),
                (None, None) => return Err(InspectError::missing_argument(hook, name)),
            };
            values.insert(name.to_string(), value);
        }

        tracing::trace!(hook, params = values.len(), "built argument frame");
        Ok(ArgumentFrame::new(hook, values))
    }
}
