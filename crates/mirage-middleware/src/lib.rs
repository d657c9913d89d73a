//! # Mirage Middleware
//!
//! Pre-dispatch checks for the Mirage framework.
//!
//! Every route owns an ordered list of middlewares. After a request is
//! matched the dispatcher runs the process-wide [`BeforeHook`], then the
//! route's [`MiddlewareChain`] in insertion order. The first
//! [`Middleware::check`] that fails stops the request; its error becomes the
//! response envelope and the route action never runs.
//!
//! ```text
//! match → BeforeHook → mw[0] → mw[1] → … → action
//!              │          │        │
//!              └──────────┴────────┴──→ error envelope
//! ```
//!
//! ## Built-in middlewares
//!
//! | Middleware | Purpose |
//! |------------|---------|
//! | [`AuthMiddleware`] | Verifies the `m-auth` token and stores its claims |
//! | [`RequestHashMiddleware`] | Verifies the `m-hash` request signature |
//! | [`AclMiddleware`] | Checks the caller's role against route access tags |
//!
//! Ad-hoc checks are written as closures with [`middleware_fn`].

#![doc(html_root_url = "https://docs.rs/mirage-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod acl;
pub mod auth;
mod chain;
pub mod jwt;
mod middleware;
pub mod request_hash;

pub use acl::{Acl, AclError, AclMiddleware};
pub use auth::AuthMiddleware;
pub use chain::{BeforeHook, MiddlewareChain, Rejection};
pub use jwt::{AuthError, AuthResult, Authenticator, Claims, Hs256Authenticator};
pub use middleware::{middleware_fn, FnMiddleware, Middleware, SharedMiddleware};
pub use request_hash::RequestHashMiddleware;
