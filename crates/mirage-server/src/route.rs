//! Route declarations.
//!
//! A [`Route`] is built while the application is assembled and handed to a
//! [`RouteCollection`](crate::RouteCollection). Nothing is validated until
//! the collection boots; after that the route is immutable.
//!
//! # Example
//!
//! ```rust
//! use mirage_core::{handler_fn, Envelope};
//! use mirage_middleware::middleware_fn;
//! use mirage_server::Route;
//! use serde_json::json;
//!
//! let route = Route::get("/:id", "getUser")
//!     .handler(handler_fn(|ctx| async move {
//!         Ok(Envelope::ok(json!({ "id": ctx.path_param("id") })))
//!     }))
//!     .middleware(middleware_fn("audit", |_| Ok(())))
//!     .access("read");
//!
//! assert_eq!(route.method(), "get");
//! assert_eq!(route.accesses(), ["read"]);
//! ```

use std::fmt;
use std::sync::Arc;

use http::Method;

use mirage_core::{fingerprint, BootError, BootResult, Controller, Handler};
use mirage_middleware::SharedMiddleware;
use mirage_router::{parse_methods, RouterError};

/// One endpoint of a collection.
#[derive(Clone)]
pub struct Route {
    path: String,
    method: String,
    action: String,
    handler: Option<Arc<dyn Handler>>,
    middlewares: Vec<SharedMiddleware>,
    accesses: Vec<String>,
}

impl Route {
    /// Declares a route.
    ///
    /// `method` is a method token or a comma-joined list such as
    /// `"get,post"`, in any case. `path` is relative to the collection
    /// prefix. `action` names the handler; without a route-level
    /// [`handler`](Self::handler) it is dispatched on the collection's
    /// controller.
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
            action: action.into(),
            handler: None,
            middlewares: Vec::new(),
            accesses: Vec::new(),
        }
    }

    /// Declares a `GET` route.
    pub fn get(path: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new("get", path, action)
    }

    /// Declares a `POST` route.
    pub fn post(path: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new("post", path, action)
    }

    /// Declares a `PUT` route.
    pub fn put(path: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new("put", path, action)
    }

    /// Declares a `PATCH` route.
    pub fn patch(path: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new("patch", path, action)
    }

    /// Declares a `DELETE` route.
    pub fn delete(path: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new("delete", path, action)
    }

    /// Sets the route's own handler.
    pub fn handler(mut self, handler: impl Handler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Sets the route's own handler from a shared one.
    pub fn shared_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Appends a middleware. Middlewares run in the order they are added.
    pub fn middleware(mut self, middleware: SharedMiddleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Appends several middlewares.
    pub fn middlewares<I>(mut self, middlewares: I) -> Self
    where
        I: IntoIterator<Item = SharedMiddleware>,
    {
        self.middlewares.extend(middlewares);
        self
    }

    /// Adds an authorization tag.
    pub fn access(mut self, tag: impl Into<String>) -> Self {
        self.accesses.push(tag.into());
        self
    }

    /// Adds several authorization tags.
    pub fn accesses_from<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accesses.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Returns the stable route id.
    ///
    /// This is the fingerprint of `path:METHOD:action` with the method
    /// declaration upper-cased, so `"get"` and `"GET"` give the same id.
    ///
    /// ```rust
    /// use mirage_server::Route;
    ///
    /// assert_eq!(Route::get("/:id", "getUser").id(), Route::new("GET", "/:id", "getUser").id());
    /// assert_ne!(Route::get("/:id", "getUser").id(), Route::post("/:id", "getUser").id());
    /// ```
    #[must_use]
    pub fn id(&self) -> u32 {
        let method = self.method.trim().to_ascii_uppercase();
        fingerprint(&[&self.path, &method, &self.action])
    }

    /// Returns the mount-relative path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the method declaration as written.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the action name.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Returns the route-level handler, if one is set.
    #[must_use]
    pub fn route_handler(&self) -> Option<&Arc<dyn Handler>> {
        self.handler.as_ref()
    }

    /// Returns the middlewares in run order.
    #[must_use]
    pub fn middleware_list(&self) -> &[SharedMiddleware] {
        &self.middlewares
    }

    /// Returns the authorization tags.
    #[must_use]
    pub fn accesses(&self) -> &[String] {
        &self.accesses
    }

    /// Validates the route and returns its parsed methods.
    pub(crate) fn validate(&self, controller: Option<&dyn Controller>) -> BootResult<Vec<Method>> {
        let methods = parse_methods(&self.method).map_err(|e| match e {
            RouterError::UnknownMethod { token } => BootError::UnknownMethod {
                route: self.to_string(),
                token,
            },
            other => BootError::invalid_route(self.to_string(), other.to_string()),
        })?;

        // The dispatcher answers every OPTIONS request as a preflight.
        if methods.contains(&Method::OPTIONS) {
            return Err(BootError::invalid_route(
                self.to_string(),
                "OPTIONS is reserved for CORS preflight",
            ));
        }

        if !self.path.is_empty() && !self.path.starts_with('/') {
            return Err(BootError::invalid_route(
                self.to_string(),
                "path must be empty or start with '/'",
            ));
        }

        if self.action.trim().is_empty() {
            return Err(BootError::invalid_route(self.to_string(), "action name is empty"));
        }

        if self.handler.is_none() {
            match controller {
                None => {
                    return Err(BootError::invalid_route(
                        self.to_string(),
                        "no route handler and no collection controller",
                    ))
                }
                Some(controller) if !controller.has_action(&self.action) => {
                    return Err(BootError::invalid_route(
                        self.to_string(),
                        format!("controller has no action '{}'", self.action),
                    ))
                }
                Some(_) => {}
            }
        }

        Ok(methods)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.method, self.path, self.action)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let middlewares: Vec<&str> = self.middlewares.iter().map(|m| m.name()).collect();
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("action", &self.action)
            .field("has_handler", &self.handler.is_some())
            .field("middlewares", &middlewares)
            .field("accesses", &self.accesses)
            .finish()
    }
}
