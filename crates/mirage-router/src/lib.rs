//! # Mirage Router
//!
//! Radix tree router used by the Mirage dispatcher.
//!
//! Patterns are made of static segments, named parameters written either
//! `{id}` or `:id`, and a trailing catch-all `*rest`. Each `(method, path)`
//! pair maps to a route name; registering the same pair twice is an error
//! rather than a silent overwrite.
//!
//! The crate also owns the HTTP method vocabulary routes are declared with,
//! including the `PURGE` extension method and comma-joined method lists.
//!
//! # Example
//!
//! ```rust
//! use mirage_router::{parse_methods, Router};
//! use http::Method;
//!
//! let mut router = Router::new();
//! for method in parse_methods("get,post").unwrap() {
//!     router.insert(method, "/users", "users").unwrap();
//! }
//! router.insert(Method::GET, "/users/:id", "user").unwrap();
//!
//! let found = router.match_route(&Method::GET, "/users/42").unwrap();
//! assert_eq!(found.name, "user");
//! assert_eq!(found.params.get("id"), Some("42"));
//! ```
//!
//! ```text
//!            (root)
//!              │
//!           "users"  [GET, POST]
//!              │
//!            ":id"   [GET]
//! ```

#![doc(html_root_url = "https://docs.rs/mirage-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod method;
mod method_router;
mod node;
mod params;
mod router;

pub use error::{RouterError, RouterResult};
pub use method::{is_known_method, parse_method, parse_methods, KNOWN_METHODS};
pub use method_router::MethodRouter;
pub use node::{Node, SegmentKind};
pub use params::Params;
pub use router::Router;

/// A successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    /// Name the route was registered under.
    pub name: &'a str,
    /// Captured path parameters.
    pub params: Params,
}

impl<'a> RouteMatch<'a> {
    /// Creates a match.
    #[must_use]
    pub fn new(name: &'a str, params: Params) -> Self {
        Self { name, params }
    }
}
