//! Runtime error types.

use thiserror::Error;
use trellis_core::{BindError, BoxError};

use crate::config::ConfigError;

/// Errors that can occur while setting up the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A route group failed to bind. Groups bound before it stay registered.
    #[error("Failed to bind route groups: {0}")]
    Bind(#[source] BoxError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors returned when dispatching a request through a route table.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// No route matches the path.
    #[error("No route for {method} {path}")]
    NotFound { method: String, path: String },

    /// A route matches the path but not the method.
    #[error("Method {method} not allowed for {path} (allowed: {})", allowed.join(", "))]
    MethodNotAllowed {
        method: String,
        path: String,
        allowed: Vec<String>,
    },

    /// The resolver or the business function failed.
    #[error("{0}")]
    Handler(#[source] BoxError),
}

impl DispatchError {
    /// Short machine-readable classification of the error.
    ///
    /// Handler errors caused by request binding report `bad_request`; every
    /// other handler error reports `internal`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::MethodNotAllowed { .. } => "method_not_allowed",
            Self::Handler(err) if err.downcast_ref::<BindError>().is_some() => "bad_request",
            Self::Handler(_) => "internal",
        }
    }

    /// The handler error, if this is one.
    pub fn handler_error(&self) -> Option<&BoxError> {
        match self {
            Self::Handler(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind() {
        let not_found = DispatchError::NotFound {
            method: "GET".into(),
            path: "/x".into(),
        };
        assert_eq!(not_found.kind(), "not_found");
        assert_eq!(not_found.to_string(), "No route for GET /x");

        let bind = DispatchError::Handler(BindError::custom("bad json").into());
        assert_eq!(bind.kind(), "bad_request");
        assert_eq!(bind.to_string(), "bad json");

        let other = DispatchError::Handler("database down".into());
        assert_eq!(other.kind(), "internal");
    }

    #[test]
    fn test_method_not_allowed_message() {
        let err = DispatchError::MethodNotAllowed {
            method: "PATCH".into(),
            path: "/users/1".into(),
            allowed: vec!["GET".into(), "PUT".into()],
        };
        assert_eq!(
            err.to_string(),
            "Method PATCH not allowed for /users/1 (allowed: GET, PUT)"
        );
    }
}
