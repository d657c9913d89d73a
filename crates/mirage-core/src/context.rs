//! Request context types.
//!
//! The [`RequestContext`] carries all per-request state through the before
//! hooks, the route middlewares and into the route action.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::ids::RouteName;
use crate::services::ServiceRegistry;

/// A unique identifier for each request, using UUID v7.
///
/// # Example
///
/// ```
/// use mirage_core::RequestId;
///
/// let id = RequestId::new();
/// println!("Request ID: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new time-ordered request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Metadata of the route a request was matched to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute {
    /// Composite route name.
    pub name: RouteName,
    /// Prefix of the owning collection.
    pub prefix: String,
    /// Fully-qualified path pattern.
    pub pattern: String,
    /// Action name.
    pub action: String,
    /// Authorization tags.
    pub accesses: Vec<String>,
}

/// Per-request state.
///
/// A context is created by the dispatcher for each request after routing.
/// Middlewares receive it mutably and may attach claims or extensions for
/// the action to read.
#[derive(Debug)]
pub struct RequestContext {
    request_id: RequestId,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
    path_params: Vec<(String, String)>,
    route: Option<Arc<MatchedRoute>>,
    claims: Option<Value>,
    services: Arc<ServiceRegistry>,
    extensions: http::Extensions,
    started_at: Instant,
}

impl RequestContext {
    /// Creates a context from a request and the shared service registry.
    #[must_use]
    pub fn new(request: http::Request<Bytes>, services: Arc<ServiceRegistry>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            request_id: RequestId::new(),
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            remote_addr: None,
            path_params: Vec::new(),
            route: None,
            claims: None,
            services,
            extensions: parts.extensions,
            started_at: Instant::now(),
        }
    }

    /// Creates a `GET /` context with an empty registry, for tests.
    #[must_use]
    pub fn mock() -> Self {
        Self::new(
            http::Request::new(Bytes::new()),
            Arc::new(ServiceRegistry::new()),
        )
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the request method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URI.
    #[must_use]
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the URI path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Returns the raw query string.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Returns the request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the request headers mutably.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns a header value as text. Header names are case-insensitive.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the raw body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the peer address, when known.
    #[must_use]
    pub const fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Sets the peer address.
    pub fn set_remote_addr(&mut self, addr: SocketAddr) {
        self.remote_addr = Some(addr);
    }

    /// Returns the path parameters in declaration order.
    #[must_use]
    pub fn path_params(&self) -> &[(String, String)] {
        &self.path_params
    }

    /// Returns a path parameter by name.
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets the path parameters.
    pub fn set_path_params(&mut self, params: Vec<(String, String)>) {
        self.path_params = params;
    }

    /// Returns the matched route.
    #[must_use]
    pub fn route(&self) -> Option<&MatchedRoute> {
        self.route.as_deref()
    }

    /// Binds the matched route.
    pub fn set_route(&mut self, route: Arc<MatchedRoute>) {
        self.route = Some(route);
    }

    /// Returns the authenticated claims.
    #[must_use]
    pub const fn claims(&self) -> Option<&Value> {
        self.claims.as_ref()
    }

    /// Stores authenticated claims.
    pub fn set_claims(&mut self, claims: Value) {
        self.claims = Some(claims);
    }

    /// Returns the service registry.
    #[must_use]
    pub const fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    /// Resolves a named service.
    ///
    /// # Errors
    ///
    /// Returns a service resolution error when the service is unknown or
    /// has a different type.
    pub fn service<T: Send + Sync + 'static>(&self, name: &str) -> ApiResult<Arc<T>> {
        Ok(self.services.resolve::<T>(name)?)
    }

    /// Returns typed extensions.
    #[must_use]
    pub const fn extensions(&self) -> &http::Extensions {
        &self.extensions
    }

    /// Returns typed extensions mutably.
    pub fn extensions_mut(&mut self) -> &mut http::Extensions {
        &mut self.extensions
    }

    /// Returns the time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn request(uri: &str) -> http::Request<Bytes> {
        http::Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("M-Auth", "token")
            .body(Bytes::from_static(b"{}"))
            .unwrap()
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn test_context_exposes_request_parts() {
        let ctx = RequestContext::new(request("/users/42?x=1"), Arc::new(ServiceRegistry::new()));
        assert_eq!(*ctx.method(), Method::POST);
        assert_eq!(ctx.path(), "/users/42");
        assert_eq!(ctx.query(), Some("x=1"));
        assert_eq!(ctx.header("m-auth"), Some("token"));
        assert_eq!(ctx.body().as_ref(), b"{}");
        assert!(ctx.route().is_none());
    }

    #[test]
    fn test_path_params() {
        let mut ctx = RequestContext::mock();
        ctx.set_path_params(vec![("id".into(), "42".into())]);
        assert_eq!(ctx.path_param("id"), Some("42"));
        assert_eq!(ctx.path_param("other"), None);
    }

    #[test]
    fn test_route_binding_and_claims() {
        let mut ctx = RequestContext::mock();
        ctx.set_route(Arc::new(MatchedRoute {
            name: RouteName::new(1, 2),
            prefix: "/users".into(),
            pattern: "/users/:id".into(),
            action: "getUser".into(),
            accesses: vec!["users.read".into()],
        }));
        ctx.set_claims(serde_json::json!({"rn": "admin"}));

        assert_eq!(ctx.route().unwrap().action, "getUser");
        assert_eq!(ctx.claims().unwrap()["rn"], "admin");
    }

    #[test]
    fn test_service_lookup_errors() {
        let ctx = RequestContext::mock();
        let err = ctx.service::<String>("missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Service);
    }

    #[test]
    fn test_extensions() {
        let mut ctx = RequestContext::mock();
        ctx.extensions_mut().insert(7_u32);
        assert_eq!(ctx.extensions().get::<u32>(), Some(&7));
    }
}
