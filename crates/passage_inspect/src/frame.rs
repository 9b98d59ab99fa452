//! Argument frames handed to hooks.

use crate::error::InspectError;
use crate::value::Value;
use indexmap::IndexMap;

/// The concrete arguments of one hook invocation.
///
/// Holds exactly the parameters the hook declares, in declaration order.
#[derive(Debug, Clone)]
pub struct ArgumentFrame {
    hook: String,
    values: IndexMap<String, Value>,
}

impl ArgumentFrame {
    pub(crate) fn new(hook: impl Into<String>, values: IndexMap<String, Value>) -> Self {
        Self {
            hook: hook.into(),
            values,
        }
    }

    /// Returns the hook this frame was built for.
    #[must_use]
    pub fn hook(&self) -> &str {
        &self.hook
    }

    /// Returns the value bound to a parameter.
    ///
    /// # Errors
    ///
    /// Fails with [`InspectError::NotInFrame`] if the hook does not declare
    /// `name`, or [`InspectError::TypeMismatch`] if the value is not a `T`.
    pub fn get<T: 'static>(&self, name: &str) -> Result<&T, InspectError> {
        let value = self.value(name).ok_or_else(|| InspectError::NotInFrame {
            hook: self.hook.clone(),
            param: name.to_string(),
        })?;
        value.downcast_ref::<T>().ok_or_else(|| self.mismatch::<T>(name, value))
    }

    /// Returns the value bound to a parameter, or `None` if it is null.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn get_optional<T: 'static>(&self, name: &str) -> Result<Option<&T>, InspectError> {
        match self.value(name) {
            None => Err(InspectError::NotInFrame {
                hook: self.hook.clone(),
                param: name.to_string(),
            }),
            Some(value) if value.is_null() => Ok(None),
            Some(value) => value
                .downcast_ref::<T>()
                .map(Some)
                .ok_or_else(|| self.mismatch::<T>(name, value)),
        }
    }

    /// Returns the raw value bound to a parameter.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns whether the frame binds `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Returns the bound parameter names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Returns the number of bound parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the frame binds no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn mismatch<T: 'static>(&self, name: &str, value: &Value) -> InspectError {
        InspectError::TypeMismatch {
            hook: self.hook.clone(),
            param: name.to_string(),
            expected: core::any::type_name::<T>(),
            actual: value.type_name(),
        }
    }
}
