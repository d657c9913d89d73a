//! Router errors.

use thiserror::Error;

/// Result alias for router operations.
pub type RouterResult<T> = Result<T, RouterError>;

/// Errors raised while building a router.
///
/// Matching never fails; only registration does.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// A method token is not part of the supported vocabulary.
    #[error("Router error: unknown method token '{token}'")]
    UnknownMethod {
        /// The offending token.
        token: String,
    },

    /// A method string contained no tokens.
    #[error("Router error: empty method list")]
    EmptyMethod,

    /// A `(method, path)` pair is already registered.
    #[error("Router error: duplicate route {method} {path}")]
    DuplicateRoute {
        /// HTTP method.
        method: String,
        /// Path pattern.
        path: String,
    },

    /// A catch-all segment is followed by more segments.
    #[error("Router error: wildcard must be the last segment in '{path}'")]
    WildcardNotLast {
        /// Path pattern.
        path: String,
    },

    /// Two patterns use different parameter names at the same position.
    #[error("Router error: parameter '{new}' conflicts with '{existing}' in '{path}'")]
    ParamConflict {
        /// Path pattern being inserted.
        path: String,
        /// Name already in the tree.
        existing: String,
        /// Name in the new pattern.
        new: String,
    },

    /// A pattern segment is malformed.
    #[error("Router error: invalid segment '{segment}' in '{path}'")]
    InvalidSegment {
        /// Path pattern.
        path: String,
        /// Offending segment.
        segment: String,
    },
}
