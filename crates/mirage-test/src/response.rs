//! Test response wrapper.

use std::fmt;

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde_json::Value;

use mirage_core::{HttpResponse, WireEnvelope};
use mirage_server::{DispatchState, Lifecycle};

use crate::error::TestError;

/// A dispatched response with helpers for envelope assertions.
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    lifecycle: Option<Lifecycle>,
}

impl TestResponse {
    /// Reads a dispatcher response into memory.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::BodyRead`] if the body cannot be collected.
    pub async fn from_http(response: HttpResponse) -> Result<Self, TestError> {
        let (mut parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| TestError::BodyRead(e.to_string()))?
            .to_bytes();

        Ok(Self {
            status: parts.status,
            headers: parts.headers,
            body,
            lifecycle: parts.extensions.remove::<Lifecycle>(),
        })
    }

    /// Creates a test response from raw parts.
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            lifecycle: None,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns a reference to the headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value by name.
    #[must_use]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        self.headers.get(name.as_ref())
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.header(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the Content-Type header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE.as_str())
    }

    /// Returns the `ETag` header value.
    #[must_use]
    pub fn etag(&self) -> Option<&str> {
        self.header_str(header::ETAG.as_str())
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::BodyRead`] if the body is not valid UTF-8.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| TestError::BodyRead(format!("Invalid UTF-8: {e}")))
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::Json`] if the body does not deserialize.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Deserializes the body as a wire envelope.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::Json`] if the body is not an envelope, which is
    /// the case for preflight answers.
    pub fn envelope(&self) -> Result<WireEnvelope, TestError> {
        self.json()
    }

    /// Returns the dispatch lifecycle, if the response came from a
    /// dispatcher.
    #[must_use]
    pub const fn lifecycle(&self) -> Option<&Lifecycle> {
        self.lifecycle.as_ref()
    }

    // Assertion methods

    /// Asserts the HTTP status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status(&self, expected: u16) -> &Self {
        assert_eq!(
            self.status.as_u16(),
            expected,
            "Expected status {expected}, got {}; body: {}",
            self.status.as_u16(),
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts the envelope's dev code and that its `http_code` matches the
    /// response status.
    ///
    /// # Panics
    ///
    /// Panics if the body is not an envelope or the codes don't match.
    pub fn assert_dev_code(&self, expected: &str) -> &Self {
        let envelope = self.expect_envelope();
        assert_eq!(
            envelope.status.dev_code, expected,
            "Dev code: expected '{expected}', got '{}'",
            envelope.status.dev_code
        );
        assert_eq!(
            envelope.status.http_code,
            self.status.as_u16(),
            "Envelope http_code differs from the response status"
        );
        self
    }

    /// Asserts the envelope's translated message.
    ///
    /// # Panics
    ///
    /// Panics if the body is not an envelope or the message doesn't match.
    pub fn assert_message(&self, expected: &str) -> &Self {
        let envelope = self.expect_envelope();
        assert_eq!(envelope.status.message, expected, "Message mismatch");
        self
    }

    /// Asserts the envelope's developer message.
    ///
    /// # Panics
    ///
    /// Panics if the body is not an envelope or the message doesn't match.
    pub fn assert_dev_message(&self, expected: &str) -> &Self {
        let envelope = self.expect_envelope();
        assert_eq!(envelope.status.dev_message, expected, "Dev message mismatch");
        self
    }

    /// Asserts the envelope's output.
    ///
    /// # Panics
    ///
    /// Panics if the body is not an envelope or the output doesn't match.
    pub fn assert_output(&self, expected: &Value) -> &Self {
        let envelope = self.expect_envelope();
        assert_eq!(&envelope.output, expected, "Output mismatch");
        self
    }

    /// Asserts that a header exists with the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the header doesn't exist or doesn't match.
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        let expected = expected.as_ref();
        let actual = self
            .header_str(name)
            .unwrap_or_else(|| panic!("Header '{name}' not found"));
        assert_eq!(
            actual, expected,
            "Header '{name}': expected '{expected}', got '{actual}'"
        );
        self
    }

    /// Asserts that the dispatch went through `state`.
    ///
    /// # Panics
    ///
    /// Panics if there is no lifecycle or `state` is not in it.
    pub fn assert_passed(&self, state: DispatchState) -> &Self {
        let lifecycle = self
            .lifecycle
            .as_ref()
            .unwrap_or_else(|| panic!("Response carries no lifecycle"));
        assert!(
            lifecycle.passed(state),
            "Expected lifecycle to pass {state}, got {lifecycle}"
        );
        self
    }

    /// Asserts that the dispatch never reached `state`.
    ///
    /// # Panics
    ///
    /// Panics if there is no lifecycle or `state` is in it.
    pub fn assert_not_passed(&self, state: DispatchState) -> &Self {
        let lifecycle = self
            .lifecycle
            .as_ref()
            .unwrap_or_else(|| panic!("Response carries no lifecycle"));
        assert!(
            !lifecycle.passed(state),
            "Expected lifecycle to skip {state}, got {lifecycle}"
        );
        self
    }

    fn expect_envelope(&self) -> WireEnvelope {
        self.envelope().unwrap_or_else(|e| {
            panic!(
                "Body is not an envelope ({e}): {}",
                String::from_utf8_lossy(&self.body)
            )
        })
    }
}

impl fmt::Debug for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &String::from_utf8_lossy(&self.body))
            .field("lifecycle", &self.lifecycle.as_ref().map(ToString::to_string))
            .finish()
    }
}
