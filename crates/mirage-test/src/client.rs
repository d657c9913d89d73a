//! Test client for in-memory dispatch.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use mirage_server::RestApp;

use crate::error::TestError;
use crate::request::{TestRequest, TestRequestBuilder};
use crate::response::TestResponse;

/// Sends requests straight into [`RestApp::dispatch_from`].
///
/// Requests go through routing, the before hook, every route middleware,
/// the action and the responder, without binding a port.
///
/// # Example
///
/// ```
/// use mirage_core::{handler_fn, Envelope};
/// use mirage_server::{RestApp, Route, RouteCollection};
/// use mirage_test::TestClient;
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let app = RestApp::builder()
///     .collection(RouteCollection::new("/users").route(Route::get("/:id", "getUser").handler(
///         handler_fn(|ctx| async move { Ok(Envelope::ok(json!({ "id": ctx.path_param("id") }))) }),
///     )))
///     .build()
///     .unwrap();
///
/// let client = TestClient::from_app(app);
/// client
///     .get("/users/7")
///     .send()
///     .await
///     .assert_status(200)
///     .assert_dev_code("s00000")
///     .assert_output(&json!({ "id": "7" }));
/// # }
/// ```
#[must_use]
#[derive(Debug, Clone)]
pub struct TestClient {
    app: Arc<RestApp>,
    default_headers: Vec<(String, String)>,
    remote_addr: Option<SocketAddr>,
}

impl TestClient {
    /// Creates a client for a shared app.
    pub fn new(app: Arc<RestApp>) -> Self {
        Self {
            app,
            default_headers: Vec::new(),
            remote_addr: None,
        }
    }

    /// Creates a client that owns `app`.
    pub fn from_app(app: RestApp) -> Self {
        Self::new(Arc::new(app))
    }

    /// Returns the app under test.
    #[must_use]
    pub const fn app(&self) -> &Arc<RestApp> {
        &self.app
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Sends `token` in the `m-auth` header of every request.
    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.with_default_header(crate::request::AUTH_HEADER, token)
    }

    /// Sets the peer address every request reports.
    pub const fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Creates a GET request builder.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::get(uri))
    }

    /// Creates a POST request builder.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::post(uri))
    }

    /// Creates a PUT request builder.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::put(uri))
    }

    /// Creates a PATCH request builder.
    pub fn patch(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::patch(uri))
    }

    /// Creates a DELETE request builder.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::delete(uri))
    }

    /// Creates an OPTIONS request builder.
    pub fn options(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::options(uri))
    }

    /// Creates a HEAD request builder.
    pub fn head(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::head(uri))
    }

    /// Creates a request builder with a custom method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequestBuilder::new(method, uri))
    }

    async fn send_internal(&self, request: TestRequest) -> Result<TestResponse, TestError> {
        let remote_addr = request.remote_addr.or(self.remote_addr);
        let request = request.into_http_request()?;
        let response = self.app.dispatch_from(request, remote_addr).await;
        TestResponse::from_http(response).await
    }
}

/// A request builder bound to a test client.
#[must_use]
#[derive(Debug)]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl<'a> TestClientRequest<'a> {
    fn new(client: &'a TestClient, builder: TestRequestBuilder) -> Self {
        let builder = client
            .default_headers
            .iter()
            .fold(builder, |builder, (name, value)| builder.header(name, value));
        Self { client, builder }
    }

    /// Sets a header on the request.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets the `m-auth` token header.
    pub fn token(mut self, token: impl AsRef<str>) -> Self {
        self.builder = self.builder.token(token);
        self
    }

    /// Sets the peer address for this request.
    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.builder = self.builder.remote_addr(addr);
        self
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets the request body as JSON.
    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sends the request and returns the response.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built. Use
    /// [`try_send`](Self::try_send) to handle that case.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(e) => panic!("test request failed: {e}"),
        }
    }

    /// Sends the request and returns a Result.
    ///
    /// # Errors
    ///
    /// Returns [`TestError`] if the request cannot be built or the response
    /// body cannot be read.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        self.client.send_internal(request).await
    }
}
