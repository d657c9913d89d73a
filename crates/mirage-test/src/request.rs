//! Test request building.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde::Serialize;

use crate::error::TestError;

/// Header carrying the auth token checked by `AuthMiddleware`.
pub const AUTH_HEADER: &str = "m-auth";

/// A request ready to be dispatched by a [`TestClient`](crate::TestClient).
#[derive(Debug, Clone)]
pub struct TestRequest {
    /// HTTP method
    pub method: Method,
    /// Request URI
    pub uri: Uri,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Bytes,
    /// Peer address reported to the dispatcher
    pub remote_addr: Option<SocketAddr>,
}

impl TestRequest {
    /// Creates a new GET request.
    pub fn get(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET, uri)
    }

    /// Creates a new POST request.
    pub fn post(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST, uri)
    }

    /// Creates a new PUT request.
    pub fn put(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PUT, uri)
    }

    /// Creates a new PATCH request.
    pub fn patch(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PATCH, uri)
    }

    /// Creates a new DELETE request.
    pub fn delete(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::DELETE, uri)
    }

    /// Creates a new OPTIONS request.
    pub fn options(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::OPTIONS, uri)
    }

    /// Creates a new HEAD request.
    pub fn head(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::HEAD, uri)
    }

    /// Converts this request into the form the dispatcher takes.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::RequestBuild`] if `http` rejects the parts.
    pub fn into_http_request(self) -> Result<http::Request<Bytes>, TestError> {
        let mut request = http::Request::builder()
            .method(self.method)
            .uri(self.uri)
            .body(self.body)
            .map_err(|e| TestError::RequestBuild(e.to_string()))?;
        *request.headers_mut() = self.headers;
        Ok(request)
    }
}

/// Builder for constructing test requests.
///
/// Invalid headers do not panic while chaining; the first error is
/// returned from [`build`](Self::build).
#[must_use]
#[derive(Debug)]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    remote_addr: Option<SocketAddr>,
    error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Creates a new request builder.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            method,
            uri: uri.as_ref().to_string(),
            headers: HeaderMap::new(),
            body: None,
            remote_addr: None,
            error: None,
        }
    }

    /// Sets a header, replacing earlier values.
    ///
    /// # Example
    ///
    /// ```
    /// use mirage_test::TestRequest;
    ///
    /// let request = TestRequest::get("/users")
    ///     .header("accept-language", "fa")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(request.headers["accept-language"], "fa");
    /// ```
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let parsed = HeaderName::try_from(name.as_ref())
            .map_err(|e| TestError::InvalidHeader(format!("{}: {e}", name.as_ref())))
            .and_then(|name| {
                HeaderValue::try_from(value.as_ref())
                    .map(|value| (name, value))
                    .map_err(|e| TestError::InvalidHeader(format!("{}: {e}", value.as_ref())))
            });
        match parsed {
            Ok((name, value)) => {
                self.headers.insert(name, value);
            }
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), content_type)
    }

    /// Sets the `m-auth` token header.
    pub fn token(self, token: impl AsRef<str>) -> Self {
        self.header(AUTH_HEADER, token)
    }

    /// Sets the peer address the dispatcher sees.
    pub const fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the request body as JSON.
    ///
    /// This also sets the `Content-Type` header to `application/json`.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.body = Some(Bytes::from(bytes)),
            Err(e) => {
                self.error.get_or_insert(TestError::Json(e));
            }
        }
        self.content_type("application/json")
    }

    /// Builds the test request.
    ///
    /// # Errors
    ///
    /// Returns the first header or body error recorded while chaining, or
    /// [`TestError::RequestBuild`] if the URI does not parse.
    pub fn build(self) -> Result<TestRequest, TestError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let uri: Uri = self
            .uri
            .parse()
            .map_err(|e| TestError::RequestBuild(format!("Invalid URI: {e}")))?;

        Ok(TestRequest {
            method: self.method,
            uri,
            headers: self.headers,
            body: self.body.unwrap_or_default(),
            remote_addr: self.remote_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_methods() {
        assert_eq!(TestRequest::get("/").build().unwrap().method, Method::GET);
        assert_eq!(TestRequest::post("/").build().unwrap().method, Method::POST);
        assert_eq!(TestRequest::put("/").build().unwrap().method, Method::PUT);
        assert_eq!(TestRequest::patch("/").build().unwrap().method, Method::PATCH);
        assert_eq!(TestRequest::delete("/").build().unwrap().method, Method::DELETE);
        assert_eq!(TestRequest::options("/").build().unwrap().method, Method::OPTIONS);
        assert_eq!(TestRequest::head("/").build().unwrap().method, Method::HEAD);
    }

    #[test]
    fn test_json_body() {
        let request = TestRequest::post("/users")
            .json(&json!({"name": "Alice"}))
            .build()
            .unwrap();
        assert_eq!(request.headers["content-type"], "application/json");
        assert_eq!(request.body, Bytes::from_static(br#"{"name":"Alice"}"#));
    }

    #[test]
    fn test_token_header() {
        let request = TestRequest::get("/me").token("abc").build().unwrap();
        assert_eq!(request.headers[AUTH_HEADER], "abc");
    }

    #[test]
    fn test_invalid_header_surfaces_on_build() {
        let err = TestRequest::get("/")
            .header("bad header", "x")
            .header("x-ok", "1")
            .build()
            .unwrap_err();
        assert!(matches!(err, TestError::InvalidHeader(_)));
    }

    #[test]
    fn test_invalid_uri() {
        let err = TestRequest::get("http://[::1").build().unwrap_err();
        assert!(matches!(err, TestError::RequestBuild(_)));
    }

    #[test]
    fn test_into_http_request() {
        let addr: SocketAddr = "203.0.113.5:4000".parse().unwrap();
        let request = TestRequest::put("/items/1?x=2")
            .header("x-forwarded-for", "198.51.100.1")
            .remote_addr(addr)
            .body("raw")
            .build()
            .unwrap();
        assert_eq!(request.remote_addr, Some(addr));

        let http = request.into_http_request().unwrap();
        assert_eq!(http.method(), Method::PUT);
        assert_eq!(http.uri().query(), Some("x=2"));
        assert_eq!(http.headers()["x-forwarded-for"], "198.51.100.1");
        assert_eq!(http.body(), &Bytes::from_static(b"raw"));
    }
}
