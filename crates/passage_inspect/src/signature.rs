//! Parameter tables for layer hooks.
//!
//! A [`HookSignature`] lists the parameters one hook declares, in declaration
//! order, each either required or carrying a default value.

use crate::value::Value;
use indexmap::IndexMap;

/// Ordered parameter table of one hook.
#[derive(Debug, Clone)]
pub struct HookSignature {
    /// Hook name.
    name: String,
    /// Parameter name to default; `None` marks a required parameter.
    params: IndexMap<String, Option<Value>>,
}

impl HookSignature {
    /// Creates an empty signature for the named hook.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: IndexMap::new(),
        }
    }

    /// Adds a required parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.insert(name.into(), None);
        self
    }

    /// Adds a parameter with a default value.
    #[must_use]
    pub fn param_with_default<T: Send + Sync + 'static>(
        mut self,
        name: impl Into<String>,
        default: T,
    ) -> Self {
        self.params.insert(name.into(), Some(Value::new(default)));
        self
    }

    /// Adds a parameter whose default is [`Value::null`].
    #[must_use]
    pub fn optional_param(mut self, name: impl Into<String>) -> Self {
        self.params.insert(name.into(), Some(Value::null()));
        self
    }

    /// Returns the hook name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the parameters in declaration order with their defaults.
    pub fn params(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.params
            .iter()
            .map(|(name, default)| (name.as_str(), default.as_ref()))
    }

    /// Returns the parameter names in declaration order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// Returns whether the hook declares `name`.
    #[must_use]
    pub fn has_param(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Returns the default of `name`, if it has one.
    #[must_use]
    pub fn default_of(&self, name: &str) -> Option<&Value> {
        self.params.get(name).and_then(Option::as_ref)
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` if the hook declares no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Removes the leading parameter, returning its name.
    pub(crate) fn pop_first(&mut self) -> Option<String> {
        self.params.shift_remove_index(0).map(|(name, _)| name)
    }
}
