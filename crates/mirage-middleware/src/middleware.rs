//! The middleware contract.
//!
//! A middleware runs after routing and before the route action. It either
//! returns `Ok(())` to let the request through or an [`ApiError`] to stop
//! it. There is no third outcome: a middleware cannot answer the request
//! itself or skip the rest of the chain while allowing the action to run.
//!
//! # Example
//!
//! ```
//! use mirage_core::{codes, ApiError, ApiResult, BoxFuture, RequestContext};
//! use mirage_middleware::Middleware;
//!
//! struct RequireJson;
//!
//! impl Middleware for RequireJson {
//!     fn name(&self) -> &'static str {
//!         "require_json"
//!     }
//!
//!     fn check<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, ApiResult<()>> {
//!         Box::pin(async move {
//!             match ctx.header("content-type") {
//!                 Some(ct) if ct.starts_with("application/json") => Ok(()),
//!                 _ => Err(ApiError::reject(codes::REQUEST_INVALID, "json body expected")),
//!             }
//!         })
//!     }
//! }
//! ```
//!
//! [`ApiError`]: mirage_core::ApiError

use std::sync::Arc;

use mirage_core::{ApiResult, BoxFuture, RequestContext};

/// A shared, type-erased middleware.
pub type SharedMiddleware = Arc<dyn Middleware>;

/// A pre-dispatch check.
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Checks the request.
    ///
    /// The context is mutable so a middleware can attach what it learned,
    /// for example decoded claims.
    fn check<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, ApiResult<()>>;
}

/// A middleware backed by a synchronous closure.
///
/// Created with [`middleware_fn`].
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F> {
    /// Creates a closure middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> std::fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnMiddleware")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut RequestContext) -> ApiResult<()> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn check<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, ApiResult<()>> {
        let result = (self.func)(ctx);
        Box::pin(std::future::ready(result))
    }
}

/// Wraps a closure as a shared middleware.
///
/// ```
/// use mirage_middleware::{middleware_fn, Middleware};
///
/// let tag = middleware_fn("tag", |ctx| {
///     ctx.extensions_mut().insert("tagged");
///     Ok(())
/// });
/// assert_eq!(tag.name(), "tag");
/// ```
pub fn middleware_fn<F>(name: &'static str, func: F) -> SharedMiddleware
where
    F: Fn(&mut RequestContext) -> ApiResult<()> + Send + Sync + 'static,
{
    Arc::new(FnMiddleware::new(name, func))
}
