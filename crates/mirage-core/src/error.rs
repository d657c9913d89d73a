//! Error types for Mirage.
//!
//! Two families of errors exist:
//!
//! - [`BootError`] is raised while routes and collections are assembled.
//!   It is fatal: the application refuses to start.
//! - [`ApiError`] is raised while a request is handled. Every variant maps
//!   to a dev code, and the dispatcher turns it into exactly one failure
//!   [`Envelope`].
//!
//! | Variant | Dev code |
//! |---|---|
//! | `RouteNotFound` | `f00103-404` |
//! | `Rejected` | carried by the middleware |
//! | `Handler` | carried by the handler |
//! | `ServiceResolution` | `f00001-500` |
//! | `InvalidDevCode` | `f00201-500` |

use thiserror::Error;

use crate::dev_code::{codes, DevCode, DevCodeError};
use crate::envelope::Envelope;

/// Result type alias using [`ApiError`].
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias using [`BootError`].
pub type BootResult<T> = Result<T, BootError>;

/// Classification of request-time errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No route matched.
    NotFound,
    /// A middleware rejected the request.
    Rejected,
    /// The route action failed.
    Handler,
    /// A service could not be resolved.
    Service,
    /// A response could not be built.
    Response,
}

/// Errors raised while a request is being dispatched.
///
/// # Example
///
/// ```
/// use mirage_core::{ApiError, ErrorKind};
///
/// let err = ApiError::reject("f00401-401", "invalid username or password");
/// assert_eq!(err.kind(), ErrorKind::Rejected);
/// assert_eq!(err.http_code(), 401);
/// ```
#[derive(Error, Debug)]
pub enum ApiError {
    /// No route matched the request.
    #[error("Route not Found: {uri}")]
    RouteNotFound {
        /// The request URI.
        uri: String,
    },

    /// A middleware refused the request.
    #[error("Request rejected: {message}")]
    Rejected {
        /// Dev code sent to the client.
        dev_code: DevCode,
        /// Developer message.
        message: String,
    },

    /// The route action failed.
    #[error("Handler error: {message}")]
    Handler {
        /// Dev code sent to the client.
        dev_code: DevCode,
        /// Developer message.
        message: String,
        /// The underlying error, never sent to clients.
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A named service is not registered or has the wrong type.
    #[error("Service error: {message}")]
    ServiceResolution {
        /// Name of the requested service.
        name: String,
        /// What went wrong.
        message: String,
    },

    /// A dev code built at request time was malformed.
    #[error("Response error: {0}")]
    InvalidDevCode(#[from] DevCodeError),
}

impl ApiError {
    /// Creates a route-not-found error.
    #[must_use]
    pub fn not_found(uri: impl Into<String>) -> Self {
        Self::RouteNotFound { uri: uri.into() }
    }

    /// Creates a middleware rejection from a raw dev code.
    ///
    /// A malformed `dev_code` yields [`ApiError::InvalidDevCode`] instead.
    #[must_use]
    pub fn reject(dev_code: &str, message: impl Into<String>) -> Self {
        match DevCode::parse(dev_code) {
            Ok(dev_code) => Self::Rejected {
                dev_code,
                message: message.into(),
            },
            Err(e) => Self::InvalidDevCode(e),
        }
    }

    /// Creates a handler error from a raw dev code.
    #[must_use]
    pub fn handler(dev_code: &str, message: impl Into<String>) -> Self {
        match DevCode::parse(dev_code) {
            Ok(dev_code) => Self::Handler {
                dev_code,
                message: message.into(),
                source: None,
            },
            Err(e) => Self::InvalidDevCode(e),
        }
    }

    /// Creates a handler error that keeps its underlying cause.
    pub fn handler_with_source(
        dev_code: &str,
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        match DevCode::parse(dev_code) {
            Ok(dev_code) => Self::Handler {
                dev_code,
                message: message.into(),
                source: Some(source.into()),
            },
            Err(e) => Self::InvalidDevCode(e),
        }
    }

    /// Creates a general `f00000-500` handler error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::handler(codes::GENERAL_ERROR, message)
    }

    /// Creates a service resolution error.
    #[must_use]
    pub fn service(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ServiceResolution {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RouteNotFound { .. } => ErrorKind::NotFound,
            Self::Rejected { .. } => ErrorKind::Rejected,
            Self::Handler { .. } => ErrorKind::Handler,
            Self::ServiceResolution { .. } => ErrorKind::Service,
            Self::InvalidDevCode(_) => ErrorKind::Response,
        }
    }

    /// Returns the dev code reported to the client.
    #[must_use]
    pub fn dev_code(&self) -> DevCode {
        match self {
            Self::Rejected { dev_code, .. } | Self::Handler { dev_code, .. } => dev_code.clone(),
            Self::RouteNotFound { .. } => DevCode::known("f00103", 404),
            Self::ServiceResolution { .. } => DevCode::known("f00001", 500),
            Self::InvalidDevCode(_) => DevCode::known("f00201", 500),
        }
    }

    /// Returns the HTTP status reported to the client.
    #[must_use]
    pub fn http_code(&self) -> u16 {
        self.dev_code().http_code()
    }

    /// Returns the developer message.
    #[must_use]
    pub fn dev_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } | Self::Handler { message, .. } => message.clone(),
            Self::RouteNotFound { uri } => format!("Route not Found: {uri}"),
            Self::ServiceResolution { name, message } => format!("service '{name}': {message}"),
            Self::InvalidDevCode(e) => e.to_string(),
        }
    }

    /// Converts this error into a failure envelope with an empty output.
    #[must_use]
    pub fn to_envelope(&self) -> Envelope {
        Envelope::from_parts(None, self.dev_code(), self.dev_message())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let message = err.to_string();
        Self::handler_with_source(codes::GENERAL_ERROR, message, err)
    }
}

/// Errors raised while routes and collections are booted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BootError {
    /// A route failed validation.
    #[error("Boot error: invalid route '{route}': {reason}")]
    InvalidRoute {
        /// Description of the offending route.
        route: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A route declares a method token outside the supported set.
    #[error("Boot error: unknown method '{token}' on route '{route}'")]
    UnknownMethod {
        /// Description of the offending route.
        route: String,
        /// The unknown token.
        token: String,
    },

    /// Two routes share the same method and full path.
    #[error("Boot error: duplicate route {method} {path}")]
    DuplicateRoute {
        /// HTTP method.
        method: String,
        /// Fully-qualified path.
        path: String,
    },

    /// Two collections share a prefix and therefore an id.
    #[error("Boot error: collection '{prefix}' is already registered")]
    DuplicateCollection {
        /// Collection prefix.
        prefix: String,
    },

    /// The router refused a path.
    #[error("Boot error: path '{path}' conflicts: {reason}")]
    PathConflict {
        /// Fully-qualified path.
        path: String,
        /// Conflict description.
        reason: String,
    },

    /// The application settings were rejected.
    #[error("Boot error: invalid configuration: {reason}")]
    Config {
        /// Validation failure.
        reason: String,
    },

    /// A framework service could not be built.
    #[error("Boot error: service '{name}' could not be built: {reason}")]
    Service {
        /// Service name.
        name: String,
        /// What went wrong.
        reason: String,
    },
}

impl BootError {
    /// Creates an invalid route error.
    #[must_use]
    pub fn invalid_route(route: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRoute {
            route: route.into(),
            reason: reason.into(),
        }
    }

    /// Creates a duplicate route error.
    #[must_use]
    pub fn duplicate_route(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self::DuplicateRoute {
            method: method.into(),
            path: path.into(),
        }
    }
}
