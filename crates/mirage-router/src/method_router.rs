//! Per-path method table.

use http::Method;

use crate::error::{RouterError, RouterResult};

/// Maps HTTP methods to route names for one path pattern.
///
/// Unlike a builder that silently keeps or replaces entries, insertion
/// reports a conflict so duplicate registrations surface at boot.
///
/// # Example
///
/// ```rust
/// use mirage_router::MethodRouter;
/// use http::Method;
///
/// let mut methods = MethodRouter::new();
/// methods.insert(Method::GET, "1-_-2", "/users").unwrap();
///
/// assert_eq!(methods.get(&Method::GET), Some("1-_-2"));
/// assert!(methods.insert(Method::GET, "1-_-3", "/users").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MethodRouter {
    // Few methods per path, so a vector beats a map.
    entries: Vec<(Method, String)>,
}

impl MethodRouter {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` for `method`.
    ///
    /// `path` is only used in the error.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::DuplicateRoute`] if `method` is taken.
    pub fn insert(
        &mut self,
        method: Method,
        name: impl Into<String>,
        path: &str,
    ) -> RouterResult<()> {
        if self.entries.iter().any(|(m, _)| *m == method) {
            return Err(RouterError::DuplicateRoute {
                method: method.to_string(),
                path: path.to_string(),
            });
        }
        self.entries.push((method, name.into()));
        Ok(())
    }

    /// Returns the route name registered for `method`.
    #[must_use]
    pub fn get(&self, method: &Method) -> Option<&str> {
        self.entries
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, name)| name.as_str())
    }

    /// Returns the methods registered on this path, in insertion order.
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<Method> {
        self.entries.iter().map(|(m, _)| m.clone()).collect()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
