//! # Mirage Server
//!
//! Routes, collections, the request dispatcher and the HTTP transport for
//! the Mirage framework.
//!
//! - [`Route`] / [`RouteCollection`] - Endpoint declarations grouped by prefix
//! - [`RestApp`] - Boots collections and dispatches requests
//! - [`Lifecycle`] - The states a dispatch went through
//! - [`Server`] - hyper HTTP/1.1 accept loop with graceful shutdown
//!
//! ## Request flow
//!
//! ```text
//! OPTIONS ─────────────────────────────────────────────→ preflight 200
//! request → router → before hook → middlewares → action → Responder
//!              │           └────────────┴──────────┴──→ error envelope
//!              └→ f00103-404
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mirage_core::{handler_fn, Envelope};
//! use mirage_server::{RestApp, Route, RouteCollection, Server};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let users = RouteCollection::new("/users").route(
//!         Route::get("/:id", "getUser").handler(handler_fn(|ctx| async move {
//!             Ok(Envelope::ok(json!({ "id": ctx.path_param("id") })))
//!         })),
//!     );
//!
//!     let app = RestApp::builder().collection(users).build()?;
//!     Server::new(Arc::new(app)).run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/mirage-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
mod collection;
mod error;
pub mod lifecycle;
mod route;
mod server;
pub mod shutdown;

pub use app::{request_hash_middleware, RestApp, RestAppBuilder, PREFLIGHT_ROUTE};
pub use collection::RouteCollection;
pub use error::{ServerError, ServerResult};
pub use lifecycle::{DispatchState, Lifecycle};
pub use route::Route;
pub use server::Server;
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
