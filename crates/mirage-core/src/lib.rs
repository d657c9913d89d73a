//! # Mirage Core
//!
//! Core types and traits for the Mirage REST micro-framework.
//!
//! This crate provides the foundational types used throughout Mirage:
//!
//! - [`DevCode`] - Application result code paired with an HTTP status
//! - [`Envelope`] - The `{status, output}` response contract
//! - [`ApiError`] / [`BootError`] - Request and registration errors
//! - [`RequestContext`] - Per-request state shared by hooks and actions
//! - [`ServiceRegistry`] - Named, lazily-built shared services
//! - [`Responder`] - Serializes envelopes into HTTP responses
//! - [`Handler`] / [`Controller`] - Route action contracts

#![doc(html_root_url = "https://docs.rs/mirage-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cache;
mod context;
pub mod dev_code;
pub mod envelope;
mod error;
mod handler;
mod ids;
pub mod request;
pub mod responder;
pub mod services;
pub mod status;
pub mod translator;

pub use cache::MemoryCache;
pub use context::{MatchedRoute, RequestContext, RequestId};
pub use dev_code::{codes, DevCode, DevCodeError, DevCodeKind};
pub use envelope::{Envelope, WireEnvelope, WireStatus};
pub use error::{ApiError, ApiResult, BootError, BootResult, ErrorKind};
pub use handler::{handler_fn, BoxFuture, Controller, FnHandler, Handler};
pub use ids::{fingerprint, RouteName, ROUTE_NAME_SEPARATOR};
pub use request::{client_ip, is_public_ip};
pub use responder::{CorsPolicy, HttpResponse, LogMode, Rendered, Responder};
pub use services::{names, ServiceError, ServiceRegistry};
pub use status::reason_phrase;
pub use translator::{Translator, TranslatorError};
