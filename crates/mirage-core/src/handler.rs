//! Route action contracts.
//!
//! A route action is either a [`Handler`] owned by the route or an action
//! name dispatched on the collection's [`Controller`]. Both return an
//! [`Envelope`] or an [`ApiError`]; there is no untyped output.
//!
//! [`ApiError`]: crate::ApiError

use std::future::Future;
use std::pin::Pin;

use crate::context::RequestContext;
use crate::envelope::Envelope;
use crate::error::ApiResult;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A route-level action.
///
/// Closures returning a future are wrapped with [`handler_fn`].
pub trait Handler: Send + Sync + 'static {
    /// Runs the action.
    fn call(&self, ctx: RequestContext) -> BoxFuture<'static, ApiResult<Envelope>>;
}

/// A default controller that resolves actions by name.
///
/// # Example
///
/// ```rust
/// use mirage_core::{ApiError, ApiResult, BoxFuture, Controller, Envelope, RequestContext};
/// use serde_json::json;
///
/// struct Users;
///
/// impl Controller for Users {
///     fn handle<'a>(&'a self, action: &'a str, ctx: RequestContext) -> BoxFuture<'a, ApiResult<Envelope>> {
///         Box::pin(async move {
///             match action {
///                 "getUser" => Ok(Envelope::ok(json!({"id": ctx.path_param("id")}))),
///                 other => Err(ApiError::internal(format!("unknown action {other}"))),
///             }
///         })
///     }
///
///     fn has_action(&self, action: &str) -> bool {
///         action == "getUser"
///     }
/// }
/// ```
pub trait Controller: Send + Sync + 'static {
    /// Runs `action`.
    fn handle<'a>(
        &'a self,
        action: &'a str,
        ctx: RequestContext,
    ) -> BoxFuture<'a, ApiResult<Envelope>>;

    /// Returns `true` if `action` can be dispatched.
    ///
    /// Checked once per route when its collection boots. The default accepts
    /// every name.
    fn has_action(&self, _action: &str) -> bool {
        true
    }
}

/// A closure-based [`Handler`].
pub struct FnHandler<F> {
    func: F,
}

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<Envelope>> + Send + 'static,
{
    fn call(&self, ctx: RequestContext) -> BoxFuture<'static, ApiResult<Envelope>> {
        Box::pin((self.func)(ctx))
    }
}

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

/// Wraps an async closure as a [`Handler`].
///
/// ```rust
/// use mirage_core::{handler_fn, Envelope, Handler};
/// use serde_json::json;
///
/// let handler = handler_fn(|ctx| async move {
///     Ok(Envelope::ok(json!({"path": ctx.path()})))
/// });
/// # let _ = handler;
/// ```
pub const fn handler_fn<F, Fut>(func: F) -> FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<Envelope>> + Send + 'static,
{
    FnHandler { func }
}
