//! Route collections.
//!
//! A collection groups routes under a prefix and optionally a default
//! [`Controller`]. Booting a collection validates every route first and
//! only then registers them, so one malformed route fails the whole
//! collection before anything reaches the router.

use std::fmt;
use std::sync::Arc;

use http::Method;
use indexmap::IndexMap;

use mirage_core::{
    fingerprint, ApiResult, BootError, BootResult, Controller, Envelope, Handler, MatchedRoute,
    RequestContext, RouteName,
};
use mirage_middleware::MiddlewareChain;
use mirage_router::{Router, RouterError};

use crate::route::Route;

/// Routes mounted under a common prefix.
///
/// # Example
///
/// ```rust
/// use mirage_core::{handler_fn, Envelope};
/// use mirage_server::{Route, RouteCollection};
/// use serde_json::json;
///
/// let users = RouteCollection::new("/users")
///     .route(Route::get("/:id", "getUser").handler(handler_fn(|_ctx| async {
///         Ok(Envelope::ok(json!({})))
///     })));
///
/// assert_eq!(users.prefix(), "/users");
/// assert_eq!(users.len(), 1);
/// ```
#[derive(Clone)]
pub struct RouteCollection {
    prefix: String,
    controller: Option<Arc<dyn Controller>>,
    routes: Vec<Route>,
    id: u32,
}

impl RouteCollection {
    /// Creates an empty collection mounted at `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let id = fingerprint(&[&prefix]);
        Self {
            prefix,
            controller: None,
            routes: Vec::new(),
            id,
        }
    }

    /// Sets the default controller for routes without their own handler.
    pub fn controller(mut self, controller: impl Controller) -> Self {
        self.controller = Some(Arc::new(controller));
        self
    }

    /// Sets the default controller from a shared one.
    pub fn shared_controller(mut self, controller: Arc<dyn Controller>) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Appends a route.
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Returns the prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the collection id, the fingerprint of the prefix.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Returns the routes in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if the collection has no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Validates every route, then registers them with `router`.
    pub(crate) fn boot(self, router: &mut Router) -> BootResult<BootedCollection> {
        if !self.prefix.is_empty() && !self.prefix.starts_with('/') {
            return Err(BootError::invalid_route(
                format!("collection {}", self.prefix),
                "prefix must be empty or start with '/'",
            ));
        }

        let mut validated = Vec::with_capacity(self.routes.len());
        for route in self.routes {
            let methods = route.validate(self.controller.as_deref())?;
            validated.push((route, methods));
        }

        let mut routes: IndexMap<u32, Arc<BootedRoute>> = IndexMap::with_capacity(validated.len());
        for (route, methods) in validated {
            let route_id = route.id();
            let full_path = join_path(&self.prefix, route.path());

            if routes.contains_key(&route_id) {
                return Err(BootError::duplicate_route(
                    route.method().to_ascii_uppercase(),
                    full_path,
                ));
            }

            let name = RouteName::new(self.id, route_id);
            let encoded = name.encode();
            for method in &methods {
                router
                    .insert(method.clone(), &full_path, &encoded)
                    .map_err(|e| boot_error(&route, &full_path, e))?;
            }

            let action = match (route.route_handler(), &self.controller) {
                (Some(handler), _) => Action::Handler(Arc::clone(handler)),
                (None, Some(controller)) => Action::Controller(Arc::clone(controller)),
                (None, None) => {
                    return Err(BootError::invalid_route(
                        route.to_string(),
                        "no route handler and no collection controller",
                    ))
                }
            };

            tracing::debug!(
                collection = %self.prefix,
                route = %name,
                path = %full_path,
                action = route.action(),
                middlewares = route.middleware_list().len(),
                "route registered"
            );

            let booted = BootedRoute {
                matched: Arc::new(MatchedRoute {
                    name,
                    prefix: self.prefix.clone(),
                    pattern: full_path,
                    action: route.action().to_string(),
                    accesses: route.accesses().to_vec(),
                }),
                methods,
                chain: route.middleware_list().iter().cloned().collect(),
                action,
            };
            routes.insert(route_id, Arc::new(booted));
        }

        Ok(BootedCollection {
            id: self.id,
            prefix: self.prefix,
            routes,
        })
    }
}

impl fmt::Debug for RouteCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteCollection")
            .field("prefix", &self.prefix)
            .field("id", &self.id)
            .field("has_controller", &self.controller.is_some())
            .field("routes", &self.routes)
            .finish()
    }
}

/// Joins a prefix and a mount-relative path without doubling the slash.
fn join_path(prefix: &str, path: &str) -> String {
    let joined = match prefix.strip_suffix('/') {
        Some(trimmed) if path.starts_with('/') => format!("{trimmed}{path}"),
        _ => format!("{prefix}{path}"),
    };
    if joined.is_empty() {
        "/".to_string()
    } else {
        joined
    }
}

fn boot_error(route: &Route, full_path: &str, err: RouterError) -> BootError {
    match err {
        RouterError::DuplicateRoute { method, path } => BootError::DuplicateRoute { method, path },
        RouterError::UnknownMethod { token } => BootError::UnknownMethod {
            route: route.to_string(),
            token,
        },
        RouterError::EmptyMethod => BootError::invalid_route(route.to_string(), err.to_string()),
        other => BootError::PathConflict {
            path: full_path.to_string(),
            reason: other.to_string(),
        },
    }
}

/// How a booted route produces its envelope.
#[derive(Clone)]
pub(crate) enum Action {
    Handler(Arc<dyn Handler>),
    Controller(Arc<dyn Controller>),
}

/// A validated, registered route.
pub(crate) struct BootedRoute {
    pub(crate) matched: Arc<MatchedRoute>,
    pub(crate) methods: Vec<Method>,
    pub(crate) chain: MiddlewareChain,
    action: Action,
}

impl BootedRoute {
    /// Runs the route action.
    pub(crate) async fn invoke(&self, ctx: RequestContext) -> ApiResult<Envelope> {
        match &self.action {
            Action::Handler(handler) => handler.call(ctx).await,
            Action::Controller(controller) => controller.handle(&self.matched.action, ctx).await,
        }
    }
}

impl fmt::Debug for BootedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootedRoute")
            .field("route", &self.matched)
            .field("methods", &self.methods)
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}

/// A booted collection, owned by the application.
#[derive(Debug)]
pub(crate) struct BootedCollection {
    pub(crate) id: u32,
    pub(crate) prefix: String,
    pub(crate) routes: IndexMap<u32, Arc<BootedRoute>>,
}

impl BootedCollection {
    pub(crate) fn route(&self, route_id: u32) -> Option<&Arc<BootedRoute>> {
        self.routes.get(&route_id)
    }
}
