//! Router facade.

use http::Method;

use crate::error::RouterResult;
use crate::method_router::MethodRouter;
use crate::node::Node;
use crate::params::Params;
use crate::RouteMatch;

/// Radix tree router mapping `(method, path)` to a route name.
///
/// Lookup is linear in the number of path segments. When several patterns
/// could match, static segments win over parameters and parameters win over
/// catch-alls.
///
/// # Example
///
/// ```rust
/// use mirage_router::Router;
/// use http::Method;
///
/// let mut router = Router::new();
/// router.insert(Method::GET, "/users/:id", "1-_-2").unwrap();
///
/// let found = router.match_route(&Method::GET, "/users/42").unwrap();
/// assert_eq!(found.name, "1-_-2");
/// assert_eq!(found.params.get("id"), Some("42"));
/// ```
#[derive(Debug, Clone)]
pub struct Router {
    root: Node,
    route_count: usize,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::root(),
            route_count: 0,
        }
    }

    /// Registers `name` for `(method, path)`.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed patterns, parameter name conflicts and
    /// duplicate `(method, path)` pairs. A duplicate never replaces the
    /// existing registration.
    pub fn insert(&mut self, method: Method, path: &str, name: &str) -> RouterResult<()> {
        self.root.insert(path, method, name)?;
        self.route_count += 1;
        Ok(())
    }

    /// Finds the route registered for `method` on `path`.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        let (methods, params) = self.root.match_path(path)?;
        let name = methods.get(method)?;
        Some(RouteMatch::new(name, params))
    }

    /// Finds the method table for `path` regardless of method.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(&MethodRouter, Params)> {
        self.root.match_path(path)
    }

    /// Returns the methods registered on the pattern matching `path`.
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        self.match_path(path)
            .map(|(methods, _)| methods.allowed_methods())
            .unwrap_or_default()
    }

    /// Returns the number of registered `(method, path)` pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.route_count
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.route_count == 0
    }
}
