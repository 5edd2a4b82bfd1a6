//! Unified error type.

use crate::callbacks::Stage;
use crate::method::Method;

/// A boxed, thread-safe error raised by user code (handlers and callbacks).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type surfaced by micro's fallible operations.
///
/// Only two variants ever reach application code directly:
/// [`DuplicateParameter`](Error::DuplicateParameter) from
/// [`App::set`](crate::App::set) at setup time, and
/// [`Callback`](Error::Callback) from [`App::run`](crate::App::run) when a
/// lifecycle callback itself fails. The other variants are handed to the
/// registered `error` callbacks and absorbed there.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No registered route matches the request method and path.
    #[error("no route found for {method} {path}")]
    RouteNotFound { method: String, path: String },

    /// A parameter key was set twice.
    #[error("parameter `{0}` has already been defined")]
    DuplicateParameter(String),

    /// The matched handler returned an error.
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),

    /// A lifecycle callback returned an error.
    #[error("{stage} callback failed: {source}")]
    Callback {
        stage: Stage,
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub(crate) fn route_not_found(method: &str, path: &str) -> Self {
        Self::RouteNotFound { method: method.to_owned(), path: path.to_owned() }
    }

    pub(crate) fn not_routed(method: Method, path: &str) -> Self {
        Self::route_not_found(method.as_str(), path)
    }

    /// `true` for [`Error::RouteNotFound`]. Handy inside `error` callbacks
    /// that render a 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RouteNotFound { .. })
    }

    /// `true` if this error came from a failing lifecycle callback.
    pub fn is_callback(&self) -> bool {
        matches!(self, Self::Callback { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_not_found_message() {
        let err = Error::not_routed(Method::Get, "/missing");
        assert_eq!(err.to_string(), "no route found for GET /missing");
        assert!(err.is_not_found());
        assert!(!err.is_callback());
    }

    #[test]
    fn callback_error_keeps_source() {
        let err = Error::Callback { stage: Stage::Before, source: "boom".into() };
        assert_eq!(err.to_string(), "before callback failed: boom");
        assert!(std::error::Error::source(&err).is_some());
    }
}
