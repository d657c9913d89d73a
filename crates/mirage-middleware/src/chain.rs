//! Ordered middleware chains.

use std::fmt;

use mirage_core::{ApiError, RequestContext};
use thiserror::Error;

use crate::middleware::SharedMiddleware;

/// A middleware stopped the request.
#[derive(Debug, Error)]
#[error("Middleware '{middleware}' rejected the request: {error}")]
pub struct Rejection {
    /// Name of the rejecting middleware.
    pub middleware: &'static str,
    /// The error it returned.
    #[source]
    pub error: ApiError,
}

impl Rejection {
    /// Returns the underlying error.
    #[must_use]
    pub fn into_error(self) -> ApiError {
        self.error
    }
}

/// Middlewares run in insertion order until one fails.
///
/// # Example
///
/// ```
/// use mirage_core::RequestContext;
/// use mirage_middleware::{middleware_fn, MiddlewareChain};
///
/// # tokio_test::block_on(async {
/// let chain = MiddlewareChain::new()
///     .with(middleware_fn("first", |_| Ok(())))
///     .with(middleware_fn("second", |_| Ok(())));
///
/// assert_eq!(chain.names(), vec!["first", "second"]);
/// assert!(chain.check(&mut RequestContext::mock()).await.is_ok());
/// # });
/// ```
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    stages: Vec<SharedMiddleware>,
}

impl MiddlewareChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware.
    #[must_use]
    pub fn with(mut self, middleware: SharedMiddleware) -> Self {
        self.stages.push(middleware);
        self
    }

    /// Appends a middleware in place.
    pub fn push(&mut self, middleware: SharedMiddleware) {
        self.stages.push(middleware);
    }

    /// Returns the middleware names in run order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|m| m.name()).collect()
    }

    /// Returns the number of middlewares.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs every middleware in order.
    ///
    /// The first error stops the chain; later middlewares never see the
    /// request.
    pub async fn check(&self, ctx: &mut RequestContext) -> Result<(), Rejection> {
        for stage in &self.stages {
            let name = stage.name();
            tracing::debug!(middleware = name, request_id = %ctx.request_id(), "checking middleware");
            if let Err(error) = stage.check(ctx).await {
                tracing::debug!(
                    middleware = name,
                    request_id = %ctx.request_id(),
                    dev_code = %error.dev_code(),
                    "middleware rejected request"
                );
                return Err(Rejection {
                    middleware: name,
                    error,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("stages", &self.names())
            .finish()
    }
}

impl FromIterator<SharedMiddleware> for MiddlewareChain {
    fn from_iter<I: IntoIterator<Item = SharedMiddleware>>(iter: I) -> Self {
        Self {
            stages: iter.into_iter().collect(),
        }
    }
}

/// The process-wide hook run before any route middleware.
///
/// The default hook does nothing.
#[derive(Clone, Default)]
pub struct BeforeHook {
    inner: Option<SharedMiddleware>,
}

impl BeforeHook {
    /// A hook that lets every request through.
    #[must_use]
    pub fn noop() -> Self {
        Self::default()
    }

    /// Wraps a middleware as the before hook.
    #[must_use]
    pub fn new(middleware: SharedMiddleware) -> Self {
        Self {
            inner: Some(middleware),
        }
    }

    /// Returns `true` if no hook is installed.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.inner.is_none()
    }

    /// Runs the hook.
    pub async fn run(&self, ctx: &mut RequestContext) -> Result<(), Rejection> {
        let Some(hook) = &self.inner else {
            return Ok(());
        };
        hook.check(ctx).await.map_err(|error| Rejection {
            middleware: hook.name(),
            error,
        })
    }
}

impl fmt::Debug for BeforeHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeforeHook")
            .field("hook", &self.inner.as_ref().map(|h| h.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::middleware_fn;
    use mirage_core::codes;
    use std::sync::{Arc, Mutex};

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str, fail: bool) -> SharedMiddleware {
        let log = Arc::clone(log);
        middleware_fn(name, move |_ctx| {
            log.lock().unwrap().push(name);
            if fail {
                Err(ApiError::reject(codes::AUTH_INVALID_CREDENTIALS, name))
            } else {
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_chain_runs_in_order_and_stops_at_first_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: MiddlewareChain = vec![
            recorder(&log, "a", false),
            recorder(&log, "b", false),
            recorder(&log, "c", true),
            recorder(&log, "d", false),
        ]
        .into_iter()
        .collect();

        let rejection = chain.check(&mut RequestContext::mock()).await.unwrap_err();
        assert_eq!(rejection.middleware, "c");
        assert_eq!(rejection.into_error().dev_code().code(), "f00401");
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_empty_chain_passes() {
        let chain = MiddlewareChain::new();
        assert!(chain.is_empty());
        assert!(chain.check(&mut RequestContext::mock()).await.is_ok());
    }

    #[tokio::test]
    async fn test_before_hook() {
        assert!(BeforeHook::noop().is_noop());
        assert!(BeforeHook::noop().run(&mut RequestContext::mock()).await.is_ok());

        let log = Arc::new(Mutex::new(Vec::new()));
        let hook = BeforeHook::new(recorder(&log, "global", true));
        let rejection = hook.run(&mut RequestContext::mock()).await.unwrap_err();
        assert_eq!(rejection.middleware, "global");
        assert_eq!(format!("{hook:?}"), "BeforeHook { hook: Some(\"global\") }");
    }
}
