//! The response envelope.
//!
//! Every response leaving the framework is an [`Envelope`]: the handler's
//! output plus a dev code and a developer message. The [`Responder`]
//! turns it into the wire shape:
//!
//! ```json
//! {
//!   "status": {
//!     "http_code": 200,
//!     "dev_code": "s00000",
//!     "dev_message": "",
//!     "message": "success"
//!   },
//!   "output": {}
//! }
//! ```
//!
//! [`Responder`]: crate::Responder

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dev_code::{DevCode, DevCodeError};

/// Developer message attached when none is given.
pub const DEFAULT_DEV_MESSAGE: &str = "everything is good";

/// A response envelope.
///
/// Envelopes are immutable once created. Sending consumes the envelope,
/// so an envelope value can reach the transport at most once.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    output: Value,
    dev_code: DevCode,
    dev_message: String,
}

impl Envelope {
    /// Creates an envelope from a raw dev code.
    ///
    /// `output` defaults to an empty JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`DevCodeError`] if `dev_code` is malformed.
    ///
    /// # Example
    ///
    /// ```
    /// use mirage_core::Envelope;
    /// use serde_json::json;
    ///
    /// let envelope = Envelope::create(Some(json!({"id": "42"})), "s00000-200", "ok").unwrap();
    /// assert_eq!(envelope.http_code(), 200);
    /// assert!(!envelope.has_error());
    /// ```
    pub fn create(
        output: Option<Value>,
        dev_code: &str,
        dev_message: impl Into<String>,
    ) -> Result<Self, DevCodeError> {
        Ok(Self::from_parts(
            output,
            DevCode::parse(dev_code)?,
            dev_message,
        ))
    }

    /// Creates an envelope from an already parsed dev code.
    #[must_use]
    pub fn from_parts(output: Option<Value>, dev_code: DevCode, dev_message: impl Into<String>) -> Self {
        Self {
            output: output.unwrap_or_else(empty_object),
            dev_code,
            dev_message: dev_message.into(),
        }
    }

    /// Creates a success envelope carrying `output`.
    #[must_use]
    pub fn ok(output: Value) -> Self {
        Self::from_parts(Some(output), DevCode::success(), DEFAULT_DEV_MESSAGE)
    }

    /// Creates a success envelope with an empty output.
    #[must_use]
    pub fn success() -> Self {
        Self::from_parts(None, DevCode::success(), DEFAULT_DEV_MESSAGE)
    }

    /// Returns the output payload.
    #[must_use]
    pub const fn output(&self) -> &Value {
        &self.output
    }

    /// Returns the dev code.
    #[must_use]
    pub const fn dev_code(&self) -> &DevCode {
        &self.dev_code
    }

    /// Returns the developer message.
    #[must_use]
    pub fn dev_message(&self) -> &str {
        &self.dev_message
    }

    /// Returns the HTTP status derived from the dev code.
    #[must_use]
    pub const fn http_code(&self) -> u16 {
        self.dev_code.http_code()
    }

    /// Returns `true` for failure dev codes.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.dev_code.is_failure()
    }

    /// Builds the wire representation.
    ///
    /// `message` is the translated text for the dev code. The developer
    /// message is only included when `show_dev_message` is set.
    #[must_use]
    pub fn to_wire(&self, message: String, show_dev_message: bool) -> WireEnvelope {
        WireEnvelope {
            status: WireStatus {
                http_code: self.http_code(),
                dev_code: self.dev_code.code().to_string(),
                dev_message: if show_dev_message {
                    self.dev_message.clone()
                } else {
                    String::new()
                },
                message,
            },
            output: self.output.clone(),
        }
    }
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Wire form of an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEnvelope {
    /// Status block.
    pub status: WireStatus,
    /// Handler output.
    pub output: Value,
}

/// The `status` block of a [`WireEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireStatus {
    /// HTTP status code.
    pub http_code: u16,
    /// Dev code without the HTTP suffix.
    pub dev_code: String,
    /// Developer message, blank outside development.
    pub dev_message: String,
    /// Translated client-facing message.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev_code::codes;
    use serde_json::json;

    #[test]
    fn test_create_defaults_output_to_empty_object() {
        let envelope = Envelope::create(None, codes::SUCCESS, "fine").unwrap();
        assert_eq!(envelope.output(), &json!({}));
        assert_eq!(envelope.dev_message(), "fine");
    }

    #[test]
    fn test_has_error_follows_prefix() {
        let failure = Envelope::create(None, codes::REQUEST_NOT_FOUND, "missing").unwrap();
        assert!(failure.has_error());
        assert_eq!(failure.http_code(), 404);

        let message = Envelope::create(None, codes::MESSAGE, "note").unwrap();
        assert!(!message.has_error());
    }

    #[test]
    fn test_create_rejects_malformed_code() {
        assert!(Envelope::create(None, "f00103", "x").is_err());
        assert!(Envelope::create(None, "f00103-40x", "x").is_err());
    }

    #[test]
    fn test_ok_uses_default_message() {
        let envelope = Envelope::ok(json!([1, 2]));
        assert_eq!(envelope.dev_code().to_string(), codes::SUCCESS);
        assert_eq!(envelope.dev_message(), DEFAULT_DEV_MESSAGE);
    }

    #[test]
    fn test_wire_hides_dev_message_outside_dev() {
        let envelope = Envelope::create(Some(json!({"id": "42"})), "s00000-200", "ok").unwrap();

        let hidden = envelope.to_wire("success".into(), false);
        assert_eq!(hidden.status.dev_message, "");

        let shown = envelope.to_wire("success".into(), true);
        assert_eq!(shown.status.dev_message, "ok");
        assert_eq!(shown.status.dev_code, "s00000");
        assert_eq!(shown.output, json!({"id": "42"}));
    }

    #[test]
    fn test_wire_serializes_expected_keys() {
        let envelope = Envelope::success();
        let value = serde_json::to_value(envelope.to_wire("m".into(), false)).unwrap();
        assert!(value["status"]["http_code"].is_number());
        assert!(value["status"]["dev_code"].is_string());
        assert!(value["status"]["dev_message"].is_string());
        assert!(value["status"]["message"].is_string());
        assert!(value["output"].is_object());
    }
}
