//! Sending envelopes.
//!
//! [`Responder`] is the single exit point for responses. It logs the
//! outgoing payload, renders the wire envelope, attaches the CORS headers
//! and an `ETag`, and produces the HTTP response. Preflight (`OPTIONS`)
//! responses go through [`Responder::preflight`].

use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, ETAG};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::translator::Translator;

/// HTTP response type produced by the framework.
pub type HttpResponse = http::Response<Full<Bytes>>;

/// Number of characters of the payload logged in [`LogMode::Short`].
pub const TRUNCATED_LOG_CHARS: usize = 500;

/// Content type of every envelope.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// `Access-Control-Allow-Credentials`.
pub const ALLOW_CREDENTIALS: HeaderName =
    HeaderName::from_static("access-control-allow-credentials");
/// `Access-Control-Allow-Origin`.
pub const ALLOW_ORIGIN: HeaderName = HeaderName::from_static("access-control-allow-origin");
/// `Access-Control-Allow-Methods`.
pub const ALLOW_METHODS: HeaderName = HeaderName::from_static("access-control-allow-methods");
/// `Access-Control-Allow-Headers`.
pub const ALLOW_HEADERS: HeaderName = HeaderName::from_static("access-control-allow-headers");

/// How much of each outgoing payload is logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    /// Log the whole payload.
    Complete,
    /// Log the first [`TRUNCATED_LOG_CHARS`] characters.
    #[default]
    Short,
}

impl FromStr for LogMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("complete") {
            Ok(Self::Complete)
        } else {
            Ok(Self::Short)
        }
    }
}

/// Cross-origin headers attached to every response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorsPolicy {
    /// Allowed origins.
    pub allow_origins: Vec<String>,
    /// Allowed methods.
    pub allow_methods: Vec<String>,
    /// Allowed request headers.
    pub allow_headers: Vec<String>,
}

impl CorsPolicy {
    /// Creates a policy from the three allow lists.
    #[must_use]
    pub fn new<O, M, H>(origins: O, methods: M, headers: H) -> Self
    where
        O: IntoIterator,
        O::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
        H: IntoIterator,
        H::Item: Into<String>,
    {
        Self {
            allow_origins: origins.into_iter().map(Into::into).collect(),
            allow_methods: methods.into_iter().map(Into::into).collect(),
            allow_headers: headers.into_iter().map(Into::into).collect(),
        }
    }

    /// Writes the CORS headers into `headers`.
    ///
    /// Each list is comma-joined. Values that are not valid header text
    /// are skipped with a warning.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        for (name, values) in [
            (ALLOW_ORIGIN, &self.allow_origins),
            (ALLOW_METHODS, &self.allow_methods),
            (ALLOW_HEADERS, &self.allow_headers),
        ] {
            let joined = values.join(",");
            match HeaderValue::from_str(&joined) {
                Ok(value) => {
                    headers.insert(name, value);
                }
                Err(_) => tracing::warn!(header = %name, value = %joined, "invalid cors header value"),
            }
        }
    }
}

/// Rendered form of an envelope, before it becomes an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// HTTP status.
    pub http_code: u16,
    /// Serialized wire envelope.
    pub body: Bytes,
    /// Quoted hex MD5 of `body`.
    pub etag: String,
}

/// Renders and sends envelopes.
#[derive(Debug, Clone)]
pub struct Responder {
    translator: Arc<Translator>,
    cors: CorsPolicy,
    show_dev_message: bool,
    log_mode: LogMode,
}

impl Responder {
    /// Creates a responder for a production environment.
    #[must_use]
    pub fn new(translator: Arc<Translator>, cors: CorsPolicy) -> Self {
        Self {
            translator,
            cors,
            show_dev_message: false,
            log_mode: LogMode::default(),
        }
    }

    /// Sets the environment name. Developer messages are only shown in `dev`.
    #[must_use]
    pub fn with_environment(mut self, environment: &str) -> Self {
        self.show_dev_message = environment == "dev";
        self
    }

    /// Sets the payload logging mode.
    #[must_use]
    pub const fn with_log_mode(mut self, log_mode: LogMode) -> Self {
        self.log_mode = log_mode;
        self
    }

    /// Returns the translator.
    #[must_use]
    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Returns the CORS policy.
    #[must_use]
    pub const fn cors(&self) -> &CorsPolicy {
        &self.cors
    }

    /// Returns `true` when developer messages reach clients.
    #[must_use]
    pub const fn shows_dev_message(&self) -> bool {
        self.show_dev_message
    }

    /// Renders the wire envelope and its `ETag`.
    #[must_use]
    pub fn render(&self, envelope: &Envelope) -> Rendered {
        let message = self.translator.get(envelope.dev_code().code());
        let wire = envelope.to_wire(message, self.show_dev_message);
        let body = match serde_json::to_vec(&wire) {
            Ok(body) => Bytes::from(body),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize envelope");
                Bytes::from_static(
                    br#"{"status":{"http_code":500,"dev_code":"f00201","dev_message":"","message":""},"output":{}}"#,
                )
            }
        };
        let etag = format!("\"{}\"", hex::encode(Md5::digest(&body)));

        Rendered {
            http_code: envelope.http_code(),
            body,
            etag,
        }
    }

    /// Sends an envelope.
    ///
    /// Consumes the envelope; a request produces exactly one call.
    #[must_use]
    pub fn send(&self, envelope: Envelope) -> HttpResponse {
        self.log(&envelope);
        let rendered = self.render(&envelope);

        let mut response = http::Response::new(Full::new(rendered.body));
        *response.status_mut() =
            StatusCode::from_u16(rendered.http_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let headers = response.headers_mut();
        self.cors.apply(headers);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        if let Ok(etag) = HeaderValue::from_str(&rendered.etag) {
            headers.insert(ETAG, etag);
        }

        response
    }

    /// Builds the `200 OK` answer to a preflight request.
    #[must_use]
    pub fn preflight(&self) -> HttpResponse {
        let mut response = http::Response::new(Full::new(Bytes::new()));
        self.cors.apply(response.headers_mut());
        response
    }

    fn log(&self, envelope: &Envelope) {
        let payload = envelope.output().to_string();
        let payload = match self.log_mode {
            LogMode::Complete => payload.as_str(),
            LogMode::Short => truncate_chars(&payload, TRUNCATED_LOG_CHARS),
        };

        let http_code = envelope.http_code();
        let dev_code = envelope.dev_code().code();
        let dev_message = envelope.dev_message();
        if envelope.has_error() {
            tracing::error!(http_code, dev_code, dev_message, "[Request Response Info]");
            tracing::error!(output = payload, "[Request Response]");
        } else {
            tracing::info!(http_code, dev_code, dev_message, "[Request Response Info]");
            tracing::info!(output = payload, "[Request Response]");
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
