//! Error types for signature inspection and frame building.

use thiserror::Error;

/// Errors that can occur while building or reading argument frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InspectError {
    /// A hook parameter has neither a supplied value nor a default.
    #[error("required parameter '{param}' of hook '{hook}' is empty")]
    MissingArgument {
        /// The hook whose frame was being built.
        hook: String,
        /// The parameter without a value.
        param: String,
    },

    /// No signature was registered under this hook name.
    #[error("no signature registered for hook '{0}'")]
    UnknownHook(String),

    /// The parameter is not part of the hook's frame.
    #[error("parameter '{param}' is not declared by hook '{hook}'")]
    NotInFrame {
        /// The hook owning the frame.
        hook: String,
        /// The requested parameter.
        param: String,
    },

    /// The value bound to a parameter has a different type than requested.
    #[error("parameter '{param}' of hook '{hook}' holds {actual}, expected {expected}")]
    TypeMismatch {
        /// The hook owning the frame.
        hook: String,
        /// The requested parameter.
        param: String,
        /// The requested type.
        expected: &'static str,
        /// The type actually stored.
        actual: &'static str,
    },
}

impl InspectError {
    /// Creates a [`MissingArgument`](Self::MissingArgument).
    pub fn missing_argument(hook: impl Into<String>, param: impl Into<String>) -> Self {
        Self::MissingArgument {
            hook: hook.into(),
            param: param.into(),
        }
    }

    /// Returns the parameter name if this is a [`MissingArgument`](Self::MissingArgument).
    #[must_use]
    pub fn missing_param(&self) -> Option<&str> {
        match self {
            Self::MissingArgument { param, .. } => Some(param),
            _ => None,
        }
    }
}
