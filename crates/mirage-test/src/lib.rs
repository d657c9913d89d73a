//! # Mirage Test
//!
//! In-memory testing for Mirage applications. Requests are handed straight
//! to the dispatcher, so they run through routing, the before hook, route
//! middlewares, the action and the responder without a socket.
//!
//! ## Key Features
//!
//! - **Request Builder**: headers, `m-auth` tokens, JSON bodies, peer address
//! - **Envelope Assertions**: dev code, messages and output of the wire envelope
//! - **Lifecycle Access**: which dispatch states a request went through
//!
//! ## Example
//!
//! ```ignore
//! use mirage_test::TestClient;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_login_rejected() {
//!     let client = TestClient::from_app(build_app());
//!
//!     client
//!         .post("/login")
//!         .json(&json!({ "username": "alice", "password": "wrong" }))
//!         .send()
//!         .await
//!         .assert_status(401)
//!         .assert_dev_code("f00401")
//!         .assert_output(&json!({}));
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/mirage-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use request::{TestRequest, TestRequestBuilder, AUTH_HEADER};
pub use response::TestResponse;
