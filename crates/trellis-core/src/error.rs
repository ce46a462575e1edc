//! Error types for the Trellis core.

use thiserror::Error;

/// The error type carried through handler invocation and group binding.
///
/// Resolver and business-function errors are boxed without wrapping, so the
/// original error can still be recovered with `downcast_ref`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while filling a [`Slot`](crate::resolve::Slot).
#[derive(Debug, Error)]
pub enum BindError {
    /// The value offered to the slot does not have the slot's type.
    #[error("slot type mismatch: expected '{expected}', got '{got}'")]
    TypeMismatch {
        /// Type the slot holds.
        expected: &'static str,
        /// Type that was offered.
        got: &'static str,
    },

    /// The slot was not created for request data and cannot be decoded.
    #[error("'{0}' cannot be decoded from request data")]
    NotDecodable(&'static str),

    /// Request data did not match the slot's type.
    #[error("failed to decode '{type_name}': {source}")]
    Decode {
        /// Type the data was decoded into.
        type_name: &'static str,
        /// Underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },

    /// The resolver reported success but never filled the dependency slot.
    #[error("dependency '{0}' was not provided by the resolver")]
    Unresolved(&'static str),

    /// Custom resolution error.
    #[error("{0}")]
    Custom(String),
}

impl BindError {
    /// Creates a custom resolution error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Result type for slot operations.
pub type BindResult<T> = Result<T, BindError>;
