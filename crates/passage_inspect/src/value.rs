//! Type-erased named values.
//!
//! Hooks draw their arguments from an open vocabulary of names, so values are
//! stored type-erased and recovered with a downcast at the point of use.
//! [`Value`] is reference counted: cloning a pool or binding the same value
//! into several frames never copies the underlying data.

use core::any::Any;
use core::fmt;
use indexmap::IndexMap;
use std::sync::Arc;

/// Marker stored by [`Value::null`].
///
/// Used as the default of optional hook parameters (an optional pointer, an
/// unknown output size) and by the engine for derived entries that do not
/// apply to the current adjacency format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Null;

/// A shareable, type-erased value.
#[derive(Clone)]
pub struct Value {
    data: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    /// Wraps a value.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            data: Arc::new(value),
            type_name: core::any::type_name::<T>(),
        }
    }

    /// Returns the explicit "nothing" value.
    #[must_use]
    pub fn null() -> Self {
        Self::new(Null)
    }

    /// Returns `true` if this is [`Value::null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.is::<Null>()
    }

    /// Returns `true` if the stored value is a `T`.
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.data.is::<T>()
    }

    /// Returns a reference to the stored value if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    /// Returns the type name of the stored value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if both values share the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({})", self.type_name)
    }
}

/// Insertion-ordered pool of named values available to a call.
#[derive(Debug, Clone, Default)]
pub struct ValuePool {
    values: IndexMap<String, Value>,
}

impl ValuePool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: IndexMap::new(),
        }
    }

    /// Adds a value, returning the pool for chaining.
    #[must_use]
    pub fn with<T: Send + Sync + 'static>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts a value, replacing any previous value under the same name.
    pub fn insert<T: Send + Sync + 'static>(&mut self, name: impl Into<String>, value: T) {
        self.values.insert(name.into(), Value::new(value));
    }

    /// Inserts an already wrapped [`Value`].
    pub fn insert_value(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Inserts a value only if the name is not already present.
    ///
    /// Returns `true` if the value was inserted.
    pub fn insert_if_absent(&mut self, name: impl Into<String>, value: Value) -> bool {
        let name = name.into();
        if self.values.contains_key(&name) {
            return false;
        }
        self.values.insert(name, value);
        true
    }

    /// Returns the value stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns the value stored under `name` if it is a `T`.
    #[must_use]
    pub fn get_as<T: 'static>(&self, name: &str) -> Option<&T> {
        self.values.get(name).and_then(Value::downcast_ref::<T>)
    }

    /// Returns whether a value is stored under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Removes and returns the value stored under `name`.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.shift_remove(name)
    }

    /// Returns the names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, Value)> for ValuePool {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
