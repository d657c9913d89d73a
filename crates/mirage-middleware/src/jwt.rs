//! HS256 JSON Web Tokens.
//!
//! Only the compact `header.payload.signature` form signed with
//! HMAC-SHA256 is supported. Registered time claims (`exp`, `nbf`, `iat`)
//! are checked with a configurable leeway; every other claim is passed
//! through untouched.

use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::{json, Map, Value};
use sha2::Sha256;
use thiserror::Error;

use mirage_core::{codes, ApiError};

type HmacSha256 = Hmac<Sha256>;

/// Decoded token claims.
pub type Claims = Map<String, Value>;

/// Result alias for token operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Token verification and signing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The token could not be decoded.
    #[error("Auth error: malformed token: {message}")]
    Malformed {
        /// What was wrong.
        message: String,
    },

    /// The signature does not match.
    #[error("Auth error: signature verification failed")]
    BadSignature,

    /// `exp` is in the past.
    #[error("Auth error: token expired at {exp}")]
    Expired {
        /// Expiry timestamp.
        exp: i64,
    },

    /// `nbf` or `iat` is in the future.
    #[error("Auth error: token not valid before {at}")]
    NotYetValid {
        /// The timestamp that has not been reached.
        at: i64,
    },

    /// The payload is not a JSON object.
    #[error("Auth error: token payload is not a claims object")]
    InvalidPayload,

    /// No signing key is configured.
    #[error("Auth error: signing key is not configured")]
    MissingKey,
}

impl AuthError {
    fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Returns the dev code reported for this error.
    #[must_use]
    pub const fn dev_code(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => codes::AUTH_JWT_INVALID,
            Self::BadSignature => codes::AUTH_JWT_SIGNATURE_INVALID,
            Self::Expired { .. } => codes::AUTH_JWT_EXPIRED,
            Self::NotYetValid { .. } => codes::AUTH_JWT_BEFORE_VALID,
            Self::InvalidPayload => codes::AUTH_JWT_INVALID_PAYLOAD,
            Self::MissingKey => codes::AUTH_JWT_HASH_KEY_NOT_EXIST,
        }
    }

    /// Converts into a request rejection.
    #[must_use]
    pub fn to_api_error(&self) -> ApiError {
        ApiError::reject(self.dev_code(), self.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        err.to_api_error()
    }
}

/// Verifies bearer tokens.
pub trait Authenticator: Send + Sync + 'static {
    /// Verifies `token` and returns its claims.
    fn verify(&self, token: &str) -> AuthResult<Claims>;
}

/// HMAC-SHA256 token issuer and verifier.
///
/// # Example
///
/// ```
/// use mirage_middleware::{Authenticator, Hs256Authenticator};
/// use serde_json::json;
///
/// let auth = Hs256Authenticator::new("secret").unwrap();
/// let claims = json!({"sub": "42", "rn": "admin"});
/// let token = auth.issue(claims.as_object().unwrap()).unwrap();
///
/// let decoded = auth.verify(&token).unwrap();
/// assert_eq!(decoded["rn"], "admin");
/// ```
#[derive(Clone)]
pub struct Hs256Authenticator {
    key: Vec<u8>,
    leeway: Duration,
}

impl Hs256Authenticator {
    /// Creates an authenticator with the given signing key and no leeway.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingKey`] for an empty key.
    pub fn new(key: impl AsRef<[u8]>) -> AuthResult<Self> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(AuthError::MissingKey);
        }
        Ok(Self {
            key: key.to_vec(),
            leeway: Duration::ZERO,
        })
    }

    /// Sets the clock leeway applied to time claims.
    #[must_use]
    pub const fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Returns the configured leeway.
    #[must_use]
    pub const fn leeway(&self) -> Duration {
        self.leeway
    }

    /// Signs `claims` into a compact token.
    pub fn issue(&self, claims: &Claims) -> AuthResult<String> {
        let header = json!({"typ": "JWT", "alg": "HS256"});
        let header = encode_json(&header)?;
        let payload = encode_json(&Value::Object(claims.clone()))?;
        let signing_input = format!("{header}.{payload}");
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes())?);
        tracing::debug!(claims = claims.len(), "issued token");
        Ok(format!("{signing_input}.{signature}"))
    }

    fn sign(&self, input: &[u8]) -> AuthResult<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|_| AuthError::MissingKey)?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    pub(crate) fn verify_at(&self, token: &str, now: i64) -> AuthResult<Claims> {
        let segments = || AuthError::malformed("wrong number of segments");
        let (signing_input, signature) = token.rsplit_once('.').ok_or_else(segments)?;
        let (header, payload) = signing_input.split_once('.').ok_or_else(segments)?;
        if payload.contains('.') {
            return Err(segments());
        }

        let header = decode_json(header)?;
        if header.get("alg").and_then(Value::as_str) != Some("HS256") {
            return Err(AuthError::malformed("algorithm not supported"));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| AuthError::malformed(format!("signature encoding: {e}")))?;
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|_| AuthError::MissingKey)?;
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::BadSignature)?;

        let Value::Object(claims) = decode_json(payload)? else {
            return Err(AuthError::InvalidPayload);
        };

        let leeway = i64::try_from(self.leeway.as_secs()).unwrap_or(i64::MAX);
        for name in ["nbf", "iat"] {
            if let Some(at) = claims.get(name).and_then(Value::as_i64) {
                if at > now.saturating_add(leeway) {
                    return Err(AuthError::NotYetValid { at });
                }
            }
        }
        if let Some(exp) = claims.get("exp").and_then(Value::as_i64) {
            if now.saturating_sub(leeway) >= exp {
                return Err(AuthError::Expired { exp });
            }
        }

        Ok(claims)
    }
}

impl Authenticator for Hs256Authenticator {
    fn verify(&self, token: &str) -> AuthResult<Claims> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }
}

impl fmt::Debug for Hs256Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hs256Authenticator")
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}

fn encode_json(value: &Value) -> AuthResult<String> {
    let bytes = serde_json::to_vec(value).map_err(|e| AuthError::malformed(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

fn decode_json(segment: &str) -> AuthResult<Value> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::malformed(format!("segment encoding: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::malformed(format!("segment json: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn auth() -> Hs256Authenticator {
        Hs256Authenticator::new("top-secret").unwrap()
    }

    fn claims(value: Value) -> Claims {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_round_trip_keeps_custom_claims() {
        let token = auth().issue(&claims(json!({"rn": "admin", "uid": 7}))).unwrap();
        assert_eq!(token.split('.').count(), 3);
        let decoded = auth().verify_at(&token, NOW).unwrap();
        assert_eq!(decoded["rn"], "admin");
        assert_eq!(decoded["uid"], 7);
    }

    #[test]
    fn test_empty_key_is_rejected() {
        assert_eq!(Hs256Authenticator::new("").unwrap_err(), AuthError::MissingKey);
    }

    #[test]
    fn test_wrong_key_fails_signature() {
        let token = auth().issue(&claims(json!({"a": 1}))).unwrap();
        let other = Hs256Authenticator::new("other").unwrap();
        assert_eq!(other.verify_at(&token, NOW), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_tampered_payload_fails_signature() {
        let token = auth().issue(&claims(json!({"rn": "user"}))).unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(br#"{"rn":"admin"}"#);
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        assert_eq!(auth().verify_at(&forged, NOW), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_expiry_and_leeway() {
        let token = auth().issue(&claims(json!({"exp": NOW - 10}))).unwrap();
        assert_eq!(
            auth().verify_at(&token, NOW),
            Err(AuthError::Expired { exp: NOW - 10 })
        );
        let lenient = auth().with_leeway(Duration::from_secs(60));
        assert!(lenient.verify_at(&token, NOW).is_ok());
    }

    #[test]
    fn test_not_before() {
        let token = auth().issue(&claims(json!({"nbf": NOW + 100}))).unwrap();
        assert_eq!(
            auth().verify_at(&token, NOW),
            Err(AuthError::NotYetValid { at: NOW + 100 })
        );
        assert!(auth().verify_at(&token, NOW + 100).is_ok());
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(matches!(auth().verify_at("abc", NOW), Err(AuthError::Malformed { .. })));
        assert!(matches!(auth().verify_at("a.b.c.d", NOW), Err(AuthError::Malformed { .. })));
        assert!(matches!(auth().verify_at("!!.b.c", NOW), Err(AuthError::Malformed { .. })));
    }

    #[test]
    fn test_unsupported_algorithm() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"rn":"admin"}"#);
        let token = format!("{header}.{payload}.");
        assert!(matches!(auth().verify_at(&token, NOW), Err(AuthError::Malformed { .. })));
    }

    #[test]
    fn test_non_object_payload() {
        let a = auth();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(b"[1,2]");
        let input = format!("{header}.{payload}");
        let signature = URL_SAFE_NO_PAD.encode(a.sign(input.as_bytes()).unwrap());
        let token = format!("{input}.{signature}");
        assert_eq!(a.verify_at(&token, NOW), Err(AuthError::InvalidPayload));
    }

    #[test]
    fn test_dev_codes() {
        assert_eq!(AuthError::BadSignature.dev_code(), "f00407-401");
        assert_eq!(AuthError::Expired { exp: 0 }.dev_code(), "f00406-401");
        assert_eq!(AuthError::InvalidPayload.to_api_error().http_code(), 401);
        assert_eq!(AuthError::MissingKey.to_api_error().http_code(), 500);
    }
}
